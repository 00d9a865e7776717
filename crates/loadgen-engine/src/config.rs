//! Configuration types for a publishing run.

use crate::error::RunError;
use crate::transport::ConnectOptions;
use rand::Rng;
use std::time::Duration;

/// Default publish cadence per point.
pub const DEFAULT_CADENCE: Duration = Duration::from_secs(1);

/// Default maximum run duration.
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(3600);

/// Default MQTT keep-alive.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(120);

/// Default bound on the wait for a connect acknowledgement.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default overall bound on joining all workers at shutdown.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pause between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Configuration for a single run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Broker host name or IP address.
    pub broker_address: String,
    /// Broker port.
    pub broker_port: u16,
    /// Username (optional).
    pub username: Option<String>,
    /// Password (optional).
    pub password: Option<String>,
    /// Topic shared by all points.
    pub topic: String,
    /// Client identifier presented to the broker.
    pub client_id: String,
    /// Maximum wall-clock duration of the run.
    pub max_duration: Duration,
    /// Period between publish attempts for each point.
    pub cadence: Duration,
    /// Keep-alive negotiated with the broker.
    pub keep_alive: Duration,
    /// Upper bound on the wait for the connect acknowledgement.
    pub connect_timeout: Duration,
    /// Overall upper bound on joining the workers at shutdown.
    pub join_timeout: Duration,
    /// Pause between reconnect attempts after an unexpected disconnect.
    pub reconnect_delay: Duration,
    /// Random seed for reproducible payloads (entropy if unset).
    pub seed: Option<u64>,
}

impl RunConfig {
    /// Create a configuration with defaults and a random client identifier.
    pub fn new(broker_address: impl Into<String>, broker_port: u16, topic: impl Into<String>) -> Self {
        Self {
            broker_address: broker_address.into(),
            broker_port,
            username: None,
            password: None,
            topic: topic.into(),
            client_id: random_client_id(),
            max_duration: DEFAULT_MAX_DURATION,
            cadence: DEFAULT_CADENCE,
            keep_alive: DEFAULT_KEEP_ALIVE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            seed: None,
        }
    }

    /// Set the broker credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    /// Set the client identifier.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Set the maximum run duration.
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Set the publish cadence.
    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    /// Set the keep-alive.
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set the connect acknowledgement timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the worker join timeout.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Set the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the payload seed.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Connection parameters derived from this configuration.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            address: self.broker_address.clone(),
            port: self.broker_port,
            client_id: self.client_id.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            keep_alive: self.keep_alive,
            connect_timeout: self.connect_timeout,
        }
    }

    /// Check the values the engine cannot run with.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.broker_address.trim().is_empty() {
            return Err(RunError::Config("broker address is empty".to_string()));
        }
        if self.topic.trim().is_empty() {
            return Err(RunError::Config("topic is empty".to_string()));
        }
        if self.client_id.is_empty() {
            return Err(RunError::Config("client identifier is empty".to_string()));
        }
        if self.cadence.is_zero() {
            return Err(RunError::Config("publish cadence must be non-zero".to_string()));
        }
        if self.max_duration.is_zero() {
            return Err(RunError::Config("maximum duration must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Generate a client identifier of the form `client_NNNN`.
pub fn random_client_id() -> String {
    format!("client_{}", rand::thread_rng().gen_range(1000..=9999))
}
