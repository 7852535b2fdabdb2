//! Device type -> sink names lookup
//!
//! The table is resolved once from the canonical `routing` section and never
//! changes while the proxy runs. A device type maps to an ordered list of
//! output names; the order is the fan-out order in `OutputManager::deliver`.
//!
//! ```text
//! ph -> [hue, mqtt, telegraf]
//! pm -> [mqtt, telegraf]
//! ```
//!
//! Names are not checked against running sinks here. A name with no sink is
//! counted as `missing` at delivery time, which keeps an output that failed
//! to start from invalidating the whole table.

use std::collections::HashMap;

use contracts::RouteConfig;

/// Routing table resolved once at startup
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<String, Vec<String>>,
}

impl RoutingTable {
    /// Build from canonical routes; a repeated device type keeps its last entry
    pub fn new(routes: &[RouteConfig]) -> Self {
        let routes = routes
            .iter()
            .map(|route| (route.device_type.clone(), route.outputs.clone()))
            .collect();
        Self { routes }
    }

    /// Sink names for a device type, empty when unrouted
    pub fn sinks_for(&self, device_type: &str) -> &[String] {
        self.routes
            .get(device_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_routed(&self, device_type: &str) -> bool {
        self.routes.contains_key(device_type)
    }

    /// Routed device types, sorted
    pub fn device_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
