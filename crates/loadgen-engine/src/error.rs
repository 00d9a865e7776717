//! Error types for the publishing engine.

use crate::controller::RunState;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a [`Transport`](crate::Transport) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No session is currently established.
    #[error("Not connected")]
    NotConnected,

    /// The client's outgoing request queue is full.
    #[error("Request queue full")]
    QueueFull,

    /// Any other client or I/O failure.
    #[error("Transport error: {0}")]
    Other(String),
}

/// Errors that can occur while establishing the broker session.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The transport could not even initiate the connection.
    #[error("Failed to initiate connection to {address}:{port}: {source}")]
    Initiate {
        address: String,
        port: u16,
        #[source]
        source: TransportError,
    },

    /// The broker answered the connect with a non-zero return code.
    #[error("Connection refused by broker (return code {0})")]
    Refused(u8),

    /// No acknowledgement arrived within the connect timeout.
    #[error("No connection acknowledgement within {0:?}")]
    Timeout(Duration),

    /// The session dropped before it was acknowledged.
    #[error("Connection lost before acknowledgement: {0}")]
    Lost(String),
}

/// Errors returned by [`RunController`](crate::RunController) operations.
#[derive(Error, Debug)]
pub enum RunError {
    /// Invalid run configuration or point set.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A run is already connecting or running.
    #[error("A run is already active (state: {0})")]
    AlreadyActive(RunState),

    /// The broker session could not be established.
    #[error("Connection error: {0}")]
    Connect(#[from] ConnectError),

    /// The task establishing the run ended abnormally.
    #[error("Run launch failed: {0}")]
    Launch(String),
}
