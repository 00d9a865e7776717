//! Broker and run settings read from a configuration file.
//!
//! Two formats are accepted. The plain format has one `key=value` pair per
//! line:
//!
//! ```text
//! mqtt_ip=192.168.1.20
//! mqtt_port=1883
//! mqtt_username=loader
//! topic=plant/points
//! hours=2
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. A file ending in
//! `.json`, or whose first non-blank character is `{`, is read as a JSON
//! object with the same keys.

use super::duration::parse_duration;
use super::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Settings from a configuration file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    pub mqtt_ip: Option<String>,
    pub mqtt_port: Option<u16>,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub topic: Option<String>,
    /// Maximum run duration in whole hours.
    pub hours: Option<u64>,
    /// Maximum run duration as a duration string; wins over `hours`.
    pub duration: Option<String>,
    pub client_id: Option<String>,
    /// Publish cadence in seconds.
    pub interval_secs: Option<u64>,
}

impl FileConfig {
    /// Read and parse the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path.extension().is_some_and(|ext| ext == "json")
            || text.trim_start().starts_with('{');

        debug!(
            "Loading {} configuration from {:?}",
            if is_json { "JSON" } else { "key=value" },
            path
        );

        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_key_value(&text)
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse the `key=value` format. Unknown keys are ignored with a warning;
    /// empty values count as unset.
    pub fn from_key_value(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Malformed {
                line: index + 1,
                content: line.to_string(),
            })?;
            let key = key.trim();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match key {
                "mqtt_ip" => config.mqtt_ip = Some(value.to_string()),
                "mqtt_port" => config.mqtt_port = Some(parse_number(key, value)?),
                "mqtt_username" => config.mqtt_username = Some(value.to_string()),
                "mqtt_password" => config.mqtt_password = Some(value.to_string()),
                "topic" => config.topic = Some(value.to_string()),
                "hours" => config.hours = Some(parse_number(key, value)?),
                "duration" => config.duration = Some(value.to_string()),
                "client_id" => config.client_id = Some(value.to_string()),
                "interval_secs" => config.interval_secs = Some(parse_number(key, value)?),
                other => warn!("Ignoring unknown configuration key '{}' on line {}", other, index + 1),
            }
        }

        Ok(config)
    }

    /// Maximum run duration, if the file sets one.
    pub fn max_duration(&self) -> Result<Option<Duration>, ConfigError> {
        if let Some(duration) = &self.duration {
            return parse_duration(duration).map(Some);
        }
        self.hours
            .map(|hours| {
                hours
                    .checked_mul(3600)
                    .map(Duration::from_secs)
                    .ok_or_else(|| ConfigError::InvalidValue {
                        key: "hours".to_string(),
                        value: hours.to_string(),
                        reason: "value too large".to_string(),
                    })
            })
            .transpose()
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_key_value() {
        let config = FileConfig::from_key_value(
            "mqtt_ip = 10.0.0.5\n\
             mqtt_port=1884\n\
             # comment\n\
             \n\
             mqtt_username=loader\n\
             topic=plant/points\n\
             hours=2\n",
        )
        .unwrap();

        assert_eq!(config.mqtt_ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.mqtt_port, Some(1884));
        assert_eq!(config.mqtt_username.as_deref(), Some("loader"));
        assert_eq!(config.topic.as_deref(), Some("plant/points"));
        assert_eq!(config.hours, Some(2));
        assert_eq!(
            config.max_duration().unwrap(),
            Some(Duration::from_secs(7200))
        );
    }

    #[test]
    fn test_empty_value_is_unset() {
        let config = FileConfig::from_key_value("mqtt_username=\ntopic=t\n").unwrap();

        assert!(config.mqtt_username.is_none());
        assert_eq!(config.topic.as_deref(), Some("t"));
    }

    #[test]
    fn test_line_without_separator_is_rejected() {
        let err = FileConfig::from_key_value("mqtt_ip=1.2.3.4\nnonsense\n").unwrap_err();

        assert!(matches!(err, ConfigError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let err = FileConfig::from_key_value("mqtt_port=70000\n").unwrap_err();

        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "mqtt_port"));
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let config = FileConfig::from_key_value("colour=blue\ntopic=t\n").unwrap();

        assert_eq!(config.topic.as_deref(), Some("t"));
    }

    #[test]
    fn test_duration_wins_over_hours() {
        let config = FileConfig::from_key_value("hours=3\nduration=90s\n").unwrap();

        assert_eq!(
            config.max_duration().unwrap(),
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"mqtt_ip": "broker.local", "mqtt_port": 8883, "topic": "t", "interval_secs": 5}}"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();

        assert_eq!(config.mqtt_ip.as_deref(), Some("broker.local"));
        assert_eq!(config.mqtt_port, Some(8883));
        assert_eq!(config.interval_secs, Some(5));
        assert!(config.max_duration().unwrap().is_none());
    }

    #[test]
    fn test_load_json_with_wrong_type_fails() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"mqtt_port": "not a port"}}"#).unwrap();

        assert!(matches!(
            FileConfig::load(file.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_load_key_value_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mqtt_ip=127.0.0.1").unwrap();
        writeln!(file, "topic=loadtest").unwrap();

        let config = FileConfig::load(file.path()).unwrap();

        assert_eq!(config.mqtt_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.topic.as_deref(), Some("loadtest"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(&dir.path().join("mqtt_config.txt")).unwrap_err();

        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
