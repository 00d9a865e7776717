//! MQTT transport for mqtt-loadgen.
//!
//! This crate provides `MqttTransport`, the `loadgen_engine::Transport`
//! implementation over `rumqttc`. Each `connect` creates a fresh client and
//! event loop; the event loop runs in a background task that reports the
//! broker's CONNACK and any loss of the session on the channel handed back to
//! the engine. Reconnecting is left to the engine's `ConnectionManager`, so the
//! event loop stops at the first connection error instead of retrying on its
//! own.
//!
//! # Architecture
//!
//! ```text
//!  ConnectionManager ──connect()──▶ MqttTransport ──▶ AsyncClient
//!          ▲                              │
//!          │ TransportEvent               ▼
//!          └────────────────────── EventLoop task (poll)
//!                                         │
//!                                         ▼
//!                                   MQTT broker
//! ```
//!
//! Publishing uses QoS 0 and `try_publish`, so a worker never blocks on a full
//! request queue or a lost session.

pub mod args;
pub mod transport;

// Re-exports for convenience
pub use args::MqttArgs;
pub use transport::{MqttTransport, DEFAULT_REQUEST_CAPACITY};
