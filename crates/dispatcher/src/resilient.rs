//! Reconnecting transport supervision
//!
//! ```text
//!   Disconnected --begin_connect--> Connecting --on_connected--> Connected
//!        ^                            |    ^                        |
//!        |                 on_connect_failed |                      |
//!        |                            v    | on_backoff_elapsed     |
//!        |                          Backoff                         |
//!        +----------------------on_transport_lost-------------------+
//! ```
//!
//! [`ResilientConnection`] is the pure state machine. [`drive`] runs it
//! against a [`BrokerTransport`] on its own task and publishes every state
//! change on a `watch` channel, so senders only ever read the current state
//! and never wait on the connection.

use std::fmt;
use std::time::Duration;

use contracts::RetrySettings;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting before the next attempt
    Backoff,
}

impl ConnectionState {
    /// Gauge value
    pub fn code(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Backoff => 3,
        }
    }

    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Backoff => "backoff",
        };
        f.write_str(s)
    }
}

/// Two-speed backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub short: Duration,
    pub long: Duration,
    /// Consecutive failures served with `short`
    pub fast_attempts: u32,
}

impl BackoffPolicy {
    /// Delay after `failures` consecutive failed attempts
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures < self.fast_attempts {
            self.short
        } else {
            self.long
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(RetrySettings::default())
    }
}

impl From<RetrySettings> for BackoffPolicy {
    fn from(retry: RetrySettings) -> Self {
        Self {
            short: Duration::from_secs(retry.short_interval_secs),
            long: Duration::from_secs(retry.long_interval_secs),
            fast_attempts: retry.fast_attempts,
        }
    }
}

/// Connection state machine
///
/// Transitions not listed in the module diagram are ignored and leave the
/// state unchanged; each method returns whether it applied.
#[derive(Debug, Clone)]
pub struct ResilientConnection {
    state: ConnectionState,
    failures: u32,
    policy: BackoffPolicy,
}

impl ResilientConnection {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            failures: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failed attempts since the last successful connect
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// `Disconnected -> Connecting`
    pub fn begin_connect(&mut self) -> bool {
        self.transition(ConnectionState::Disconnected, ConnectionState::Connecting)
    }

    /// `Connecting -> Connected`, resets the failure counter
    pub fn on_connected(&mut self) -> bool {
        let applied = self.transition(ConnectionState::Connecting, ConnectionState::Connected);
        if applied {
            self.failures = 0;
        }
        applied
    }

    /// `Connecting -> Backoff`
    ///
    /// Returns how long to wait before the next attempt, or `None` when no
    /// attempt was in progress.
    pub fn on_connect_failed(&mut self) -> Option<Duration> {
        if !self.transition(ConnectionState::Connecting, ConnectionState::Backoff) {
            return None;
        }
        self.failures = self.failures.saturating_add(1);
        Some(self.policy.delay_for(self.failures))
    }

    /// `Backoff -> Connecting`
    pub fn on_backoff_elapsed(&mut self) -> bool {
        self.transition(ConnectionState::Backoff, ConnectionState::Connecting)
    }

    /// `Connected -> Disconnected`
    pub fn on_transport_lost(&mut self) -> bool {
        self.transition(ConnectionState::Connected, ConnectionState::Disconnected)
    }

    fn transition(&mut self, from: ConnectionState, to: ConnectionState) -> bool {
        if self.state != from {
            debug!(state = %self.state, expected = %from, target = %to, "transition ignored");
            return false;
        }
        self.state = to;
        true
    }
}

/// Broker client identity: `{base}-{hostname}`
///
/// Stable per host so redundant daemons never steal each other's session.
pub fn client_identity(base: &str) -> String {
    format!("{base}-{}", hostname())
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// What one transport poll produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// Session established
    Connected,
    /// Any other traffic
    Activity,
}

/// Event-driven transport supervised by [`drive`]
///
/// A poll after an error starts a fresh connection attempt.
#[trait_variant::make(BrokerTransport: Send)]
pub trait LocalBrokerTransport {
    async fn poll(&mut self) -> Result<TransportEvent, String>;

    /// Disconnect an established session
    async fn disconnect(&mut self);
}

/// Run the reconnect loop until `shutdown` fires or its sender is dropped
#[instrument(
    name = "resilient_connection_drive",
    skip(transport, policy, state_tx, shutdown),
    fields(sink = %name)
)]
pub async fn drive<T: BrokerTransport>(
    name: String,
    mut transport: T,
    policy: BackoffPolicy,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut conn = ResilientConnection::new(policy);
    publish(&name, &state_tx, conn.state());

    loop {
        if conn.begin_connect() {
            observability::record_reconnect_attempt(&name);
            publish(&name, &state_tx, conn.state());
        }

        let polled = tokio::select! {
            _ = shutdown.changed() => break,
            polled = transport.poll() => polled,
        };

        match polled {
            Ok(TransportEvent::Connected) => {
                if conn.on_connected() {
                    info!(sink = %name, "Broker connected");
                    publish(&name, &state_tx, conn.state());
                }
            }
            Ok(TransportEvent::Activity) => {}
            Err(e) if conn.is_connected() => {
                conn.on_transport_lost();
                warn!(sink = %name, error = %e, "Broker connection lost");
                publish(&name, &state_tx, conn.state());
            }
            Err(e) => {
                let Some(delay) = conn.on_connect_failed() else {
                    continue;
                };
                warn!(
                    sink = %name,
                    error = %e,
                    failures = conn.failures(),
                    retry_in_secs = delay.as_secs(),
                    "Broker connect failed"
                );
                publish(&name, &state_tx, conn.state());

                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                conn.on_backoff_elapsed();
                observability::record_reconnect_attempt(&name);
                publish(&name, &state_tx, conn.state());
            }
        }
    }

    if conn.is_connected() {
        transport.disconnect().await;
    }
    publish(&name, &state_tx, ConnectionState::Disconnected);
    debug!(sink = %name, "Broker driver stopped");
}

fn publish(name: &str, state_tx: &watch::Sender<ConnectionState>, state: ConnectionState) {
    observability::record_connection_state(name, state.code());
    state_tx.send_replace(state);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            short: Duration::from_secs(60),
            long: Duration::from_secs(1800),
            fast_attempts: 15,
        }
    }

    /// Scripted transport; pends forever once the script runs out
    pub(crate) struct ScriptedTransport {
        pub script: VecDeque<Result<TransportEvent, String>>,
        pub polls: Arc<AtomicU32>,
        pub disconnects: Arc<AtomicU32>,
    }

    impl ScriptedTransport {
        pub fn new(script: Vec<Result<TransportEvent, String>>) -> Self {
            Self {
                script: script.into(),
                polls: Arc::new(AtomicU32::new(0)),
                disconnects: Arc::new(AtomicU32::new(0)),
            }
        }

        pub fn refusing() -> Self {
            Self::new(vec![Err("connection refused".to_string()); 3])
        }
    }

    impl BrokerTransport for ScriptedTransport {
        async fn poll(&mut self) -> Result<TransportEvent, String> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            match self.script.pop_front() {
                Some(next) => next,
                None => std::future::pending().await,
            }
        }

        async fn disconnect(&mut self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_happy_path() {
        let mut conn = ResilientConnection::new(policy());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.begin_connect());
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert!(conn.on_connected());
        assert!(conn.is_connected());
        assert!(conn.on_transport_lost());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_long_backoff_after_fifteen_failures() {
        let mut conn = ResilientConnection::new(policy());
        conn.begin_connect();

        for attempt in 1..=14 {
            assert_eq!(
                conn.on_connect_failed(),
                Some(Duration::from_secs(60)),
                "attempt {attempt}"
            );
            assert!(conn.on_backoff_elapsed());
        }
        assert_eq!(conn.on_connect_failed(), Some(Duration::from_secs(1800)));
        assert_eq!(conn.failures(), 15);
        conn.on_backoff_elapsed();
        assert_eq!(conn.on_connect_failed(), Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_connect_resets_failures() {
        let mut conn = ResilientConnection::new(policy());
        conn.begin_connect();
        for _ in 0..20 {
            conn.on_connect_failed();
            conn.on_backoff_elapsed();
        }
        assert!(conn.on_connected());
        assert_eq!(conn.failures(), 0);

        conn.on_transport_lost();
        conn.begin_connect();
        assert_eq!(conn.on_connect_failed(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_invalid_transitions_ignored() {
        let mut conn = ResilientConnection::new(policy());
        assert!(!conn.on_connected());
        assert_eq!(conn.on_connect_failed(), None);
        assert!(!conn.on_backoff_elapsed());
        assert!(!conn.on_transport_lost());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.failures(), 0);
    }

    #[test]
    fn test_client_identity_has_host_suffix() {
        let id = client_identity("loxprox");
        assert!(id.starts_with("loxprox-"));
        assert!(id.len() > "loxprox-".len());
        assert_eq!(id, client_identity("loxprox"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_backs_off_and_recovers() {
        let transport = ScriptedTransport::new(vec![
            Err("refused".into()),
            Err("refused".into()),
            Ok(TransportEvent::Connected),
        ]);
        let polls = Arc::clone(&transport.polls);
        let disconnects = Arc::clone(&transport.disconnects);
        let (state_tx, mut state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let started = tokio::time::Instant::now();
        let task = tokio::spawn(drive(
            "mqtt".into(),
            transport,
            policy(),
            state_tx,
            shutdown_rx,
        ));

        state_rx
            .wait_for(|state| state.is_connected())
            .await
            .unwrap();
        // Two short backoffs elapsed on the virtual clock
        assert!(started.elapsed() >= Duration::from_secs(120));
        assert!(polls.load(Ordering::SeqCst) >= 3);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(*state_rx.borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_stops_during_backoff() {
        let (state_tx, mut state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let transport = ScriptedTransport::refusing();
        let disconnects = Arc::clone(&transport.disconnects);

        let task = tokio::spawn(drive(
            "mqtt".into(),
            transport,
            policy(),
            state_tx,
            shutdown_rx,
        ));

        state_rx
            .wait_for(|state| *state == ConnectionState::Backoff)
            .await
            .unwrap();
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(disconnects.load(Ordering::SeqCst), 0);
        assert_eq!(*state_rx.borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_reconnects_after_loss() {
        let transport = ScriptedTransport::new(vec![
            Ok(TransportEvent::Connected),
            Ok(TransportEvent::Activity),
            Err("broken pipe".into()),
            Ok(TransportEvent::Connected),
        ]);
        let polls = Arc::clone(&transport.polls);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let started = tokio::time::Instant::now();
        let task = tokio::spawn(drive(
            "mqtt".into(),
            transport,
            policy(),
            state_tx,
            shutdown_rx,
        ));

        // The fifth poll pends, so four polls means the script ran out
        while polls.load(Ordering::SeqCst) < 5 {
            tokio::task::yield_now().await;
        }
        assert!(state_rx.borrow().is_connected());
        // A lost session reconnects without backoff
        assert!(started.elapsed() < Duration::from_secs(60));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
