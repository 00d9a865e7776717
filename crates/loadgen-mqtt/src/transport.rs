//! `rumqttc`-backed transport.

use async_trait::async_trait;
use loadgen_engine::{ConnectOptions, Transport, TransportError, TransportEvent};
use rumqttc::{
    AsyncClient, ClientError, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions,
    Outgoing, Packet, QoS,
};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default capacity of the client's outgoing request queue.
pub const DEFAULT_REQUEST_CAPACITY: usize = 1024;

/// Largest packet accepted or sent. A full record is a few KiB.
const MAX_PACKET_SIZE: usize = 256 * 1024;

/// How long `disconnect` waits for the event loop to flush the DISCONNECT.
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// MQTT client wrapper implementing the engine's `Transport`.
pub struct MqttTransport {
    session: Mutex<Option<MqttSession>>,
    request_capacity: usize,
}

struct MqttSession {
    client: AsyncClient,
    event_loop: JoinHandle<()>,
}

impl MqttTransport {
    pub fn new() -> Self {
        Self::with_request_capacity(DEFAULT_REQUEST_CAPACITY)
    }

    /// Create a transport whose request queue holds `capacity` publishes.
    pub fn with_request_capacity(capacity: usize) -> Self {
        Self {
            session: Mutex::new(None),
            request_capacity: capacity.max(1),
        }
    }

    fn take_session(&self) -> Option<MqttSession> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

impl Default for MqttTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(
        &self,
        options: &ConnectOptions,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError> {
        let mqtt_options = build_mqtt_options(options)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, self.request_capacity);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        debug!(
            "Starting MQTT event loop for {}:{} (client '{}')",
            options.address, options.port, options.client_id
        );
        let event_loop = tokio::spawn(drive_event_loop(event_loop, events_tx));

        let previous = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(MqttSession { client, event_loop });

        if let Some(previous) = previous {
            debug!("Replacing previous MQTT session");
            previous.event_loop.abort();
        }

        Ok(events_rx)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let client = {
            let session = self
                .session
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match session.as_ref() {
                Some(session) if !session.event_loop.is_finished() => session.client.clone(),
                _ => return Err(TransportError::NotConnected),
            }
        };

        client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| match e {
                ClientError::TryRequest(_) => TransportError::QueueFull,
                other => TransportError::Other(other.to_string()),
            })
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(session) = self.take_session() else {
            return Ok(());
        };

        let MqttSession {
            client,
            mut event_loop,
        } = session;

        if !event_loop.is_finished() {
            if let Err(e) = client.try_disconnect() {
                debug!("DISCONNECT could not be queued: {}", e);
            }
        }

        if tokio::time::timeout(DISCONNECT_GRACE, &mut event_loop)
            .await
            .is_err()
        {
            warn!("MQTT event loop did not finish within {:?}; aborting", DISCONNECT_GRACE);
            event_loop.abort();
        }

        Ok(())
    }
}

/// Translate engine connect options into `rumqttc` options.
pub fn build_mqtt_options(options: &ConnectOptions) -> Result<MqttOptions, TransportError> {
    if options.keep_alive < Duration::from_secs(1) {
        return Err(TransportError::Other(format!(
            "keep-alive must be at least one second, got {:?}",
            options.keep_alive
        )));
    }

    let mut mqtt_options = MqttOptions::new(&options.client_id, &options.address, options.port);
    mqtt_options.set_keep_alive(options.keep_alive);
    mqtt_options.set_clean_session(true);
    mqtt_options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);

    if let Some(username) = options.username.as_deref().filter(|u| !u.is_empty()) {
        let password = options.password.clone().unwrap_or_default();
        mqtt_options.set_credentials(username, password);
    }

    Ok(mqtt_options)
}

/// Numeric MQTT 3.1.1 return code of a CONNACK.
pub fn return_code(code: ConnectReturnCode) -> u8 {
    match code {
        ConnectReturnCode::Success => 0,
        ConnectReturnCode::RefusedProtocolVersion => 1,
        ConnectReturnCode::BadClientId => 2,
        ConnectReturnCode::ServiceUnavailable => 3,
        ConnectReturnCode::BadUserNamePassword => 4,
        ConnectReturnCode::NotAuthorized => 5,
    }
}

/// Poll the event loop until the session ends, reporting CONNACKs and the
/// final disconnect.
async fn drive_event_loop(mut event_loop: EventLoop, events: mpsc::UnboundedSender<TransportEvent>) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                let code = return_code(ack.code);
                info!("Broker acknowledged connection (return code {})", code);
                let _ = events.send(TransportEvent::ConnAck { code });
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                let _ = events.send(TransportEvent::Disconnected {
                    reason: "disconnect requested".to_string(),
                });
                return;
            }
            Ok(_) => {}
            Err(ConnectionError::ConnectionRefused(code)) => {
                let _ = events.send(TransportEvent::ConnAck {
                    code: return_code(code),
                });
                return;
            }
            Err(e) => {
                debug!("MQTT event loop stopped: {}", e);
                let _ = events.send(TransportEvent::Disconnected {
                    reason: e.to_string(),
                });
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(port: u16) -> ConnectOptions {
        ConnectOptions {
            address: "127.0.0.1".to_string(),
            port,
            client_id: "client_4242".to_string(),
            username: Some("loader".to_string()),
            password: None,
            keep_alive: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_build_mqtt_options() {
        let mqtt_options = build_mqtt_options(&options(1883)).unwrap();

        assert_eq!(
            mqtt_options.broker_address(),
            ("127.0.0.1".to_string(), 1883)
        );
        assert_eq!(mqtt_options.client_id(), "client_4242");
        assert_eq!(mqtt_options.keep_alive(), Duration::from_secs(120));
    }

    #[test]
    fn test_build_mqtt_options_rejects_short_keep_alive() {
        let mut opts = options(1883);
        opts.keep_alive = Duration::from_millis(10);

        assert!(build_mqtt_options(&opts).is_err());
    }

    #[test]
    fn test_return_codes() {
        assert_eq!(return_code(ConnectReturnCode::Success), 0);
        assert_eq!(return_code(ConnectReturnCode::BadUserNamePassword), 4);
        assert_eq!(return_code(ConnectReturnCode::NotAuthorized), 5);
    }

    #[tokio::test]
    async fn test_publish_without_session() {
        let transport = MqttTransport::new();

        let result = transport.publish("t", b"{}".to_vec()).await;
        assert_eq!(result, Err(TransportError::NotConnected));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let transport = MqttTransport::new();

        assert!(transport.disconnect().await.is_ok());
        assert!(transport.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_broker_reports_disconnect() {
        let transport = MqttTransport::new();

        // Nothing listens on port 1.
        let mut events = transport.connect(&options(1)).await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .unwrap();

        assert!(matches!(event, Some(TransportEvent::Disconnected { .. })));
        assert!(transport.disconnect().await.is_ok());
    }
}
