//! The broker connection capability consumed by the engine.

use crate::error::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Return code of an accepted connect acknowledgement.
pub const CONNACK_ACCEPTED: u8 = 0;

/// Parameters for establishing a broker session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Broker host name or IP address.
    pub address: String,
    /// Broker port.
    pub port: u16,
    /// Client identifier presented to the broker.
    pub client_id: String,
    /// Username (optional).
    pub username: Option<String>,
    /// Password (optional, only sent together with a username).
    pub password: Option<String>,
    /// Keep-alive interval negotiated with the broker.
    pub keep_alive: Duration,
    /// Upper bound on the wait for the connect acknowledgement.
    pub connect_timeout: Duration,
}

/// Connection-state notification emitted by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The broker acknowledged a connect; `code` is [`CONNACK_ACCEPTED`] on success.
    ConnAck { code: u8 },
    /// The session was lost or closed.
    Disconnected { reason: String },
}

/// A publish/subscribe client as seen by the engine.
///
/// The protocol separates "connect initiated" from "connect acknowledged", so
/// `connect` only starts the session and hands back the channel on which the
/// acknowledgement (and any later disconnect) is reported. Implementations
/// must allow `publish` to be called concurrently and `disconnect` to be
/// called when no session exists.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Initiate a new session, replacing any previous one.
    async fn connect(
        &self,
        options: &ConnectOptions,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError>;

    /// Fire-and-forget publish of `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Tear down the current session, if any.
    async fn disconnect(&self) -> Result<(), TransportError>;
}
