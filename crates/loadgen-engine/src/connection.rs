//! Ownership of the shared broker session and its reconnect policy.

use crate::error::{ConnectError, TransportError};
use crate::transport::{ConnectOptions, Transport, TransportEvent, CONNACK_ACCEPTED};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// State of the broker session as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The session was lost while reconnect was armed.
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// Owns the single broker session used by every worker of a run.
///
/// After `connect` succeeds a monitor task consumes the transport's events.
/// When the session drops unexpectedly while reconnect is armed, the monitor
/// re-establishes it with the same options until it succeeds or the manager
/// is disconnected. Workers are never stopped by a lost session; their
/// publishes simply fail until it is back.
pub struct ConnectionManager {
    inner: Arc<Inner>,
    session: Mutex<Option<Session>>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    options: ConnectOptions,
    reconnect_delay: Duration,
    reconnect_armed: AtomicBool,
    state_tx: watch::Sender<ConnectionState>,
}

/// Monitor task of an established session.
struct Session {
    cancel: CancellationToken,
    monitor: JoinHandle<()>,
}

impl ConnectionManager {
    /// Create a manager for one session with the given options.
    pub fn new(transport: Arc<dyn Transport>, options: ConnectOptions, reconnect_delay: Duration) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                transport,
                options,
                reconnect_delay,
                reconnect_armed: AtomicBool::new(false),
                state_tx,
            }),
            session: Mutex::new(None),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to connection state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Enable or disable automatic reconnect after an unexpected disconnect.
    pub fn set_reconnect_armed(&self, armed: bool) {
        self.inner.reconnect_armed.store(armed, Ordering::SeqCst);
    }

    /// Establish the session and wait for the broker's acknowledgement.
    ///
    /// Returns immediately if a session is already established.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Ok(());
        }

        info!(
            "Connecting to broker {}:{} as '{}'",
            self.inner.options.address, self.inner.options.port, self.inner.options.client_id
        );
        self.inner.set_state(ConnectionState::Connecting);

        match self.inner.establish().await {
            Ok(events) => {
                self.inner.set_state(ConnectionState::Connected);
                let cancel = CancellationToken::new();
                let monitor = tokio::spawn(monitor(self.inner.clone(), events, cancel.clone()));
                *session = Some(Session { cancel, monitor });
                info!("Connected to broker");
                Ok(())
            }
            Err(e) => {
                self.inner.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Publish through the shared session.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.inner.transport.publish(topic, payload).await
    }

    /// Tear down the session. Never triggers a reconnect; safe to call when
    /// not connected.
    pub async fn disconnect(&self) {
        self.set_reconnect_armed(false);

        let session = self.session.lock().await.take();
        let was_active = session.is_some() || self.state() != ConnectionState::Disconnected;

        if let Some(session) = session {
            session.cancel.cancel();
            if let Err(e) = session.monitor.await {
                warn!("Connection monitor ended abnormally: {}", e);
            }
        }

        if !was_active {
            debug!("Disconnect requested while not connected");
            return;
        }

        if let Err(e) = self.inner.transport.disconnect().await {
            warn!("Error while disconnecting from broker: {}", e);
        }
        self.inner.set_state(ConnectionState::Disconnected);
        info!("Disconnected from broker");
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("Connection state: {} -> {}", previous, state);
        }
    }

    /// Initiate a session and wait (bounded) for its acknowledgement.
    async fn establish(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>, ConnectError> {
        let mut events = self
            .transport
            .connect(&self.options)
            .await
            .map_err(|source| ConnectError::Initiate {
                address: self.options.address.clone(),
                port: self.options.port,
                source,
            })?;

        let timeout = self.options.connect_timeout;
        let result = match tokio::time::timeout(timeout, events.recv()).await {
            Ok(Some(TransportEvent::ConnAck { code })) if code == CONNACK_ACCEPTED => {
                return Ok(events)
            }
            Ok(Some(TransportEvent::ConnAck { code })) => ConnectError::Refused(code),
            Ok(Some(TransportEvent::Disconnected { reason })) => ConnectError::Lost(reason),
            Ok(None) => ConnectError::Lost("event channel closed".to_string()),
            Err(_) => ConnectError::Timeout(timeout),
        };

        // Release whatever the transport set up for the failed attempt.
        if let Err(e) = self.transport.disconnect().await {
            debug!("Cleanup after failed connect returned: {}", e);
        }
        Err(result)
    }

    /// Retry `establish` until it succeeds, reconnect is disarmed, or the
    /// session is cancelled.
    async fn reconnect(
        &self,
        cancel: &CancellationToken,
    ) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        let mut attempt: u32 = 0;
        loop {
            if !self.reconnect_armed.load(Ordering::SeqCst) {
                self.set_state(ConnectionState::Disconnected);
                return None;
            }

            attempt += 1;
            self.set_state(ConnectionState::Reconnecting);

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                result = self.establish() => result,
            };

            match result {
                Ok(events) => {
                    self.set_state(ConnectionState::Connected);
                    info!("Reconnected to broker after {} attempt(s)", attempt);
                    return Some(events);
                }
                Err(e) => warn!("Reconnect attempt {} failed: {}", attempt, e),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }
}

/// Consume transport events for an established session.
async fn monitor(
    inner: Arc<Inner>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            event = events.recv() => event,
        };

        let reason = match event {
            Some(TransportEvent::ConnAck { code }) if code == CONNACK_ACCEPTED => {
                inner.set_state(ConnectionState::Connected);
                continue;
            }
            Some(TransportEvent::ConnAck { code }) => {
                warn!("Unexpected refused acknowledgement (return code {})", code);
                continue;
            }
            Some(TransportEvent::Disconnected { reason }) => reason,
            None => "event channel closed".to_string(),
        };

        inner.set_state(ConnectionState::Disconnected);

        if !inner.reconnect_armed.load(Ordering::SeqCst) {
            info!("Connection closed: {}", reason);
            return;
        }

        warn!("Connection lost: {}; reconnecting", reason);
        match inner.reconnect(&cancel).await {
            Some(next) => events = next,
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }
}
