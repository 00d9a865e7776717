//! mqtt-loadgen library
//!
//! Synthetic load generator for MQTT brokers: every configured point publishes
//! one JSON record of 200 random readings per period over a shared broker
//! session, for a bounded duration or until stopped.
//!
//! # Crates
//!
//! - `loadgen_payload` - record generation and JSON encoding
//! - `loadgen_engine` - run controller, workers, connection manager, stats
//! - `loadgen_mqtt` - `rumqttc` transport and broker CLI arguments
//!
//! # CLI Usage
//!
//! ```bash
//! # Run with the classic config files in the working directory
//! mqtt-loadgen run --config mqtt_config.txt --points-file points.txt
//!
//! # Everything on the command line, ten minutes, reproducible payloads
//! mqtt-loadgen run --broker 10.0.0.5 --topic plant/points \
//!   --points P1,P2,P3 --duration 10m --seed 42
//!
//! # Print one sample record
//! mqtt-loadgen generate --point P1
//! ```

use clap::Args;
use loadgen_mqtt::MqttArgs;
use std::path::PathBuf;
use std::time::Duration;

pub mod config;

pub use config::{ConfigError, FileConfig};

use config::parse_duration_arg;

#[derive(Args, Clone, Debug)]
pub struct RunOpts {
    /// Configuration file (key=value or JSON); defaults to ./mqtt_config.txt if present
    #[arg(long, env = "MQTT_LOADGEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Comma-separated point list file (default: ./points.txt)
    #[arg(long, env = "MQTT_LOADGEN_POINTS_FILE")]
    pub points_file: Option<PathBuf>,

    /// Points to publish for, comma-separated; overrides --points-file
    #[arg(long, value_delimiter = ',')]
    pub points: Vec<String>,

    /// Topic every record is published to
    #[arg(long, env = "MQTT_LOADGEN_TOPIC")]
    pub topic: Option<String>,

    /// Maximum run duration (e.g. "90s", "30m", "2h")
    #[arg(long, env = "MQTT_LOADGEN_DURATION", value_parser = parse_duration_arg)]
    pub duration: Option<Duration>,

    /// Publish period per point (e.g. "1s", "5s")
    #[arg(long, env = "MQTT_LOADGEN_INTERVAL", value_parser = parse_duration_arg)]
    pub interval: Option<Duration>,

    /// Seed for reproducible payloads
    #[arg(long, env = "MQTT_LOADGEN_SEED")]
    pub seed: Option<u64>,

    /// How long shutdown waits for workers before abandoning them
    #[arg(long, default_value = "30s", value_parser = parse_duration_arg)]
    pub join_timeout: Duration,

    /// Pause between reconnect attempts after the session drops
    #[arg(long, default_value = "1s", value_parser = parse_duration_arg)]
    pub reconnect_delay: Duration,

    /// How often to log live status; "0" disables it
    #[arg(long, default_value = "10s", value_parser = parse_duration_arg)]
    pub status_interval: Duration,

    #[command(flatten)]
    pub mqtt: MqttArgs,
}

#[derive(Args, Clone, Debug)]
pub struct GenerateOpts {
    /// Point identifier to generate a record for
    #[arg(long, default_value = "P1")]
    pub point: String,

    /// Number of records to print, one per line
    #[arg(long, default_value_t = 1)]
    pub count: usize,

    /// Seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,

    /// Pretty-print the JSON
    #[arg(long)]
    pub pretty: bool,
}
