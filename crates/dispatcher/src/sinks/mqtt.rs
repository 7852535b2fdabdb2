//! BrokerSink - MQTT output
//!
//! Publishes the raw `data` field of each event to
//! `{topic_prefix}/type/{topic_name}` at QoS 0, not retained. The session is
//! owned by a driver task running [`crate::resilient::drive`]; `send` only
//! reads the published connection state and never waits for a reconnect.

use std::time::Duration;

use contracts::{Ack, DeviceEvent, MqttSettings, Sink, SinkError};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace};

use crate::resilient::{
    client_identity, drive, BackoffPolicy, BrokerTransport, ConnectionState, TransportEvent,
};

/// Client request queue between the sink and the event loop
const REQUEST_CAPACITY: usize = 64;
/// Upper bound for flushing DISCONNECT on shutdown
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// rumqttc event loop as a supervised transport
pub struct RumqttTransport {
    eventloop: EventLoop,
    client: AsyncClient,
}

impl RumqttTransport {
    pub fn new(eventloop: EventLoop, client: AsyncClient) -> Self {
        Self { eventloop, client }
    }
}

impl BrokerTransport for RumqttTransport {
    async fn poll(&mut self) -> Result<TransportEvent, String> {
        match self.eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => Ok(TransportEvent::Connected),
            Ok(event) => {
                trace!(?event, "mqtt event");
                Ok(TransportEvent::Activity)
            }
            Err(e) => Err(e.to_string()),
        }
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "mqtt disconnect request rejected");
            return;
        }
        let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
        if flushed.is_err() {
            debug!("mqtt disconnect not flushed before timeout");
        }
    }
}

struct Driver {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Sink that publishes events to an MQTT broker
pub struct BrokerSink {
    name: String,
    settings: MqttSettings,
    client: AsyncClient,
    state: watch::Receiver<ConnectionState>,
    driver: Option<Driver>,
}

impl BrokerSink {
    /// Build the client and start the connection driver
    ///
    /// Must be called inside a tokio runtime.
    #[instrument(
        name = "broker_sink_connect",
        skip(name, settings),
        fields(host = %settings.host, port = settings.port)
    )]
    pub fn connect(name: impl Into<String>, settings: &MqttSettings) -> Self {
        let client_id = client_identity(&settings.client_id);
        let mut options = MqttOptions::new(client_id.clone(), settings.host.clone(), settings.port);
        options.set_keep_alive(Duration::from_secs(settings.keepalive_secs));
        options.set_clean_session(true);
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let transport = RumqttTransport::new(eventloop, client.clone());

        let name = name.into();
        info!(sink = %name, client_id = %client_id, "BrokerSink starting");
        Self::with_transport(name, settings, client, transport)
    }

    /// Start with a caller-provided transport
    pub fn with_transport<T: BrokerTransport + 'static>(
        name: impl Into<String>,
        settings: &MqttSettings,
        client: AsyncClient,
        transport: T,
    ) -> Self {
        let name = name.into();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let policy = BackoffPolicy::from(settings.retry);

        let task = tokio::spawn(drive(
            name.clone(),
            transport,
            policy,
            state_tx,
            shutdown_rx,
        ));

        Self {
            name,
            settings: settings.clone(),
            client,
            state,
            driver: Some(Driver { shutdown_tx, task }),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn topic_for(&self, device_type: &str) -> String {
        self.settings.topic_for(device_type)
    }
}

impl Sink for BrokerSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&mut self, event: &DeviceEvent) -> Result<Ack, SinkError> {
        if !self.state().is_connected() {
            return Err(SinkError::not_connected(&self.name));
        }

        let topic = self.topic_for(&event.device_type);
        self.client
            .try_publish(topic.as_str(), QoS::AtMostOnce, false, event.raw.as_bytes().to_vec())
            .map_err(|e| SinkError::delivery_failed(&self.name, e.to_string()))?;

        trace!(sink = %self.name, topic = %topic, "Published");
        Ok(Ack::Delivered)
    }

    #[instrument(name = "broker_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), SinkError> {
        let Some(driver) = self.driver.take() else {
            return Ok(());
        };
        let _ = driver.shutdown_tx.send(true);
        if let Err(e) = driver.task.await {
            error!(sink = %self.name, error = ?e, "Broker driver panicked");
        }
        debug!(sink = %self.name, "BrokerSink closed");
        Ok(())
    }
}
