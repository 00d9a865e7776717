//! Concurrent publishing engine for mqtt-loadgen.
//!
//! This crate runs one periodic publisher per configured point over a single
//! shared broker connection, bounded by a maximum run duration:
//!
//! 1. `ConnectionManager` establishes the session and keeps it alive while a
//!    run is active
//! 2. `RunController` spawns one `PublishWorker` per point and supervises the
//!    run until the duration elapses, `stop_run` is called, or the process is
//!    interrupted
//! 3. `StatsCollector` turns the per-point counters into a `RunReport` once
//!    every worker has been joined
//!
//! The broker itself is reached through the [`Transport`] trait, so the engine
//! can be driven by any client library (or an in-memory fake in tests).
//!
//! # Example
//!
//! ```ignore
//! use loadgen_engine::{Point, RunConfig, RunController};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let transport = Arc::new(loadgen_mqtt::MqttTransport::new());
//! let controller = RunController::new(transport);
//!
//! let config = RunConfig::new("localhost", 1883, "loadtest/points")
//!     .with_max_duration(Duration::from_secs(3600));
//! let points = vec![Point::new("P1"), Point::new("P2")];
//!
//! controller.start_run(config, points).await?;
//! let report = controller.wait().await;
//! ```

pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod point;
pub mod stats;
pub mod transport;
pub mod worker;

pub use config::RunConfig;
pub use connection::{ConnectionManager, ConnectionState};
pub use controller::{RunController, RunState};
pub use error::{ConnectError, RunError, TransportError};
pub use point::Point;
pub use stats::{PointCount, RunReport, RunStatus, SentCounters, StatsCollector, StopReason};
pub use transport::{ConnectOptions, Transport, TransportEvent, CONNACK_ACCEPTED};
pub use worker::PublishWorker;
