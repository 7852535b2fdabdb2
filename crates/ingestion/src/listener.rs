//! UDP listener
//!
//! One receive task per configured port. All tasks feed a single bounded
//! channel drained by the sequential processing loop, so decode order is
//! arrival order.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::{IngestionMetrics, ListenerConfig};
use crate::error::{IngestionError, Result};

/// Largest payload a UDP datagram can carry
const MAX_DATAGRAM: usize = 65_535;

/// One received datagram
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Raw payload
    pub payload: Bytes,

    /// Sender address
    pub peer: SocketAddr,

    /// Local port it arrived on
    pub port: u16,

    /// Local receive time
    pub received_at: DateTime<Utc>,
}

/// Bound, not yet running UDP listener
pub struct UdpListener {
    sockets: Vec<(u16, Arc<UdpSocket>)>,
    config: ListenerConfig,
    metrics: Arc<IngestionMetrics>,
}

impl UdpListener {
    /// Bind one socket per configured port
    ///
    /// # Errors
    /// Unparseable ip, no ports, or any bind failure.
    #[instrument(
        name = "udp_listener_bind",
        skip(config),
        fields(ip = %config.ip, ports = ?config.ports)
    )]
    pub async fn bind(config: ListenerConfig) -> Result<Self> {
        if config.ports.is_empty() {
            return Err(IngestionError::NoPorts);
        }

        let mut sockets = Vec::with_capacity(config.ports.len());
        for &port in &config.ports {
            let ip: IpAddr = config
                .ip
                .parse()
                .map_err(|_| IngestionError::InvalidAddress {
                    ip: config.ip.clone(),
                    port,
                })?;
            let addr = SocketAddr::new(ip, port);
            let socket = UdpSocket::bind(addr)
                .await
                .map_err(|source| IngestionError::Bind { addr, source })?;
            let local = socket
                .local_addr()
                .map_err(|source| IngestionError::Bind { addr, source })?;

            info!(addr = %local, "udp listener bound");
            sockets.push((local.port(), Arc::new(socket)));
        }

        Ok(Self {
            sockets,
            config,
            metrics: Arc::new(IngestionMetrics::new()),
        })
    }

    /// Share an existing metrics instance
    pub fn with_metrics(mut self, metrics: Arc<IngestionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Actual bound addresses (port 0 resolves here)
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.sockets
            .iter()
            .filter_map(|(_, socket)| socket.local_addr().ok())
            .collect()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Spawn the receive tasks
    #[instrument(name = "udp_listener_start", skip(self))]
    pub fn start(self) -> ListenerHandle {
        let local_addrs = self.local_addrs();
        let (tx, rx) = bounded(self.config.channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = self
            .sockets
            .into_iter()
            .map(|(port, socket)| {
                tokio::spawn(receive_loop(
                    socket,
                    port,
                    self.config.echo,
                    tx.clone(),
                    self.metrics.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        info!(
            ports = local_addrs.len(),
            echo = self.config.echo,
            "udp listener started"
        );

        ListenerHandle {
            receiver: rx,
            shutdown_tx,
            tasks,
            local_addrs,
        }
    }
}

/// Running listener
///
/// Dropping every receive task closes the channel, which ends the
/// processing loop once it has drained.
pub struct ListenerHandle {
    receiver: Receiver<Datagram>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    local_addrs: Vec<SocketAddr>,
}

impl ListenerHandle {
    /// Datagram stream
    pub fn receiver(&self) -> Receiver<Datagram> {
        self.receiver.clone()
    }

    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Stop receiving and release the sockets
    #[instrument(name = "udp_listener_shutdown", skip(self))]
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "udp receive task panicked");
            }
        }
        info!("udp listener stopped");
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    port: u16,
    echo: bool,
    tx: Sender<Datagram>,
    metrics: Arc<IngestionMetrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let (len, peer) = tokio::select! {
            _ = shutdown.changed() => break,
            result = socket.recv_from(&mut buf) => match result {
                Ok(received) => received,
                Err(e) => {
                    warn!(port, error = %e, "udp receive failed");
                    continue;
                }
            },
        };

        let received_at = Utc::now();
        metrics.record_received();
        observability::record_packet_received(port);

        let payload = Bytes::copy_from_slice(&buf[..len]);
        trace!(port, peer = %peer, len, "datagram received");

        if echo {
            match socket.send_to(&payload, peer).await {
                Ok(_) => metrics.record_echoed(),
                Err(e) => debug!(port, peer = %peer, error = %e, "echo failed"),
            }
        }

        let datagram = Datagram {
            payload,
            peer,
            port,
            received_at,
        };
        match tx.try_send(datagram) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                metrics.record_dropped();
                observability::record_packet_dropped(port);
                warn!(port, "processing queue full, datagram dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(port, "processing loop gone");
                break;
            }
        }
    }

    debug!(port, "udp receiver stopped");
}
