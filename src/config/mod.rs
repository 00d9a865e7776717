//! Run configuration: configuration file, point list and command-line
//! overrides merged into a `RunConfig`.
//!
//! Precedence is command line (and `MQTT_LOADGEN_*` environment variables)
//! over the configuration file over built-in defaults.

pub mod duration;
pub mod file;
pub mod points;

pub use duration::{parse_duration, parse_duration_arg};
pub use file::FileConfig;
pub use points::{load_points, parse_points};

use crate::RunOpts;
use loadgen_engine::{config::random_client_id, Point, RunConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Configuration file read when `--config` is not given, if present.
pub const DEFAULT_CONFIG_FILE: &str = "mqtt_config.txt";

/// Point list read when neither `--points` nor `--points-file` is given.
pub const DEFAULT_POINTS_FILE: &str = "points.txt";

/// Broker port used when neither the file nor the command line sets one.
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Errors raised while assembling the run configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration line {line}: '{content}' (expected key=value)")]
    Malformed { line: usize, content: String },

    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("Missing {0}")]
    Missing(&'static str),

    #[error("No points configured in {0}")]
    NoPoints(String),
}

/// Load the configuration file named by `--config`, or the default file if
/// it exists. `None` when no file is in play.
pub fn load_file_config(opts: &RunOpts) -> Result<Option<FileConfig>, ConfigError> {
    match &opts.config {
        Some(path) => FileConfig::load(path).map(Some),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                debug!("Using default configuration file {:?}", default);
                FileConfig::load(default).map(Some)
            } else {
                Ok(None)
            }
        }
    }
}

/// Merge command-line options over the file settings.
pub fn resolve_run_config(file: Option<FileConfig>, opts: &RunOpts) -> Result<RunConfig, ConfigError> {
    let file = file.unwrap_or_default();
    let mqtt = &opts.mqtt;

    let broker_address = mqtt
        .broker_address
        .clone()
        .or(file.mqtt_ip.clone())
        .filter(|address| !address.trim().is_empty())
        .ok_or(ConfigError::Missing("broker address (--broker or mqtt_ip)"))?;
    let broker_port = mqtt
        .broker_port
        .or(file.mqtt_port)
        .unwrap_or(DEFAULT_BROKER_PORT);
    let topic = opts
        .topic
        .clone()
        .or(file.topic.clone())
        .filter(|topic| !topic.trim().is_empty())
        .ok_or(ConfigError::Missing("topic (--topic or the topic key)"))?;

    let mut config = RunConfig::new(broker_address, broker_port, topic)
        .with_client_id(
            mqtt.client_id
                .clone()
                .or(file.client_id.clone())
                .unwrap_or_else(random_client_id),
        )
        .with_seed(opts.seed)
        .with_join_timeout(opts.join_timeout)
        .with_reconnect_delay(opts.reconnect_delay);

    if let Some(username) = mqtt.username.clone().or(file.mqtt_username.clone()) {
        config = config.with_credentials(username, mqtt.password.clone().or(file.mqtt_password.clone()));
    }

    match opts.duration {
        Some(duration) => config = config.with_max_duration(duration),
        None => {
            if let Some(duration) = file.max_duration()? {
                config = config.with_max_duration(duration);
            }
        }
    }

    if let Some(cadence) = opts
        .interval
        .or(file.interval_secs.map(Duration::from_secs))
    {
        config = config.with_cadence(cadence);
    }
    if let Some(secs) = mqtt.keep_alive_secs {
        config = config.with_keep_alive(Duration::from_secs(secs));
    }
    if let Some(secs) = mqtt.connect_timeout_secs {
        config = config.with_connect_timeout(Duration::from_secs(secs));
    }

    Ok(config)
}

/// Points from `--points`, else `--points-file`, else the default file.
pub fn resolve_points(opts: &RunOpts) -> Result<Vec<Point>, ConfigError> {
    if !opts.points.is_empty() {
        let points = parse_points(&opts.points.join(","));
        if points.is_empty() {
            return Err(ConfigError::NoPoints("--points".to_string()));
        }
        return Ok(points);
    }

    let path = opts
        .points_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_POINTS_FILE));
    load_points(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunOpts,
    }

    fn opts(args: &[&str]) -> RunOpts {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).run
    }

    fn file_config() -> FileConfig {
        FileConfig {
            mqtt_ip: Some("192.168.1.20".to_string()),
            mqtt_port: Some(1884),
            mqtt_username: Some("loader".to_string()),
            topic: Some("plant/points".to_string()),
            hours: Some(2),
            ..FileConfig::default()
        }
    }

    #[test]
    fn test_file_values_are_used() {
        let config = resolve_run_config(Some(file_config()), &opts(&[])).unwrap();

        assert_eq!(config.broker_address, "192.168.1.20");
        assert_eq!(config.broker_port, 1884);
        assert_eq!(config.topic, "plant/points");
        assert_eq!(config.username.as_deref(), Some("loader"));
        assert!(config.password.is_none());
        assert_eq!(config.max_duration, Duration::from_secs(7200));
        assert_eq!(config.cadence, Duration::from_secs(1));
        assert!(config.client_id.starts_with("client_"));
    }

    #[test]
    fn test_command_line_overrides_file() {
        let config = resolve_run_config(
            Some(file_config()),
            &opts(&[
                "--broker",
                "10.0.0.9",
                "--topic",
                "other",
                "--duration",
                "30m",
                "--interval",
                "5s",
                "--seed",
                "7",
                "--client-id",
                "client_1111",
            ]),
        )
        .unwrap();

        assert_eq!(config.broker_address, "10.0.0.9");
        assert_eq!(config.broker_port, 1884);
        assert_eq!(config.topic, "other");
        assert_eq!(config.max_duration, Duration::from_secs(1800));
        assert_eq!(config.cadence, Duration::from_secs(5));
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.client_id, "client_1111");
    }

    #[test]
    fn test_defaults_without_file() {
        let config =
            resolve_run_config(None, &opts(&["--broker", "localhost", "--topic", "t"])).unwrap();

        assert_eq!(config.broker_port, DEFAULT_BROKER_PORT);
        assert_eq!(config.max_duration, Duration::from_secs(3600));
        assert!(config.username.is_none());
    }

    #[test]
    fn test_missing_broker_is_rejected() {
        let err = resolve_run_config(None, &opts(&["--topic", "t"])).unwrap_err();

        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_missing_topic_is_rejected() {
        let err = resolve_run_config(None, &opts(&["--broker", "localhost"])).unwrap_err();

        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_points_from_command_line() {
        let points = resolve_points(&opts(&["--points", "P1,P2", "--points", "P3"])).unwrap();

        assert_eq!(
            points,
            vec![Point::new("P1"), Point::new("P2"), Point::new("P3")]
        );
    }

    #[test]
    fn test_points_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "A,B,C").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let points = resolve_points(&opts(&["--points-file", &path])).unwrap();

        assert_eq!(points.len(), 3);
    }

    #[test]
    fn test_blank_points_are_rejected() {
        let err = resolve_points(&opts(&["--points", " , "])).unwrap_err();

        assert!(matches!(err, ConfigError::NoPoints(_)));
    }
}
