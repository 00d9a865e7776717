//! CLI argument definitions for the MQTT connection.

use clap::Args;

/// Broker connection arguments.
///
/// Every value is optional so that a configuration file can supply it;
/// command-line (and environment) values take precedence over the file.
#[derive(Args, Clone, Debug, Default)]
pub struct MqttArgs {
    /// Broker host name or IP address
    #[arg(long = "broker", env = "MQTT_LOADGEN_BROKER")]
    pub broker_address: Option<String>,

    /// Broker port
    #[arg(long = "port", env = "MQTT_LOADGEN_PORT")]
    pub broker_port: Option<u16>,

    /// Username
    #[arg(long, env = "MQTT_LOADGEN_USERNAME")]
    pub username: Option<String>,

    /// Password
    #[arg(long, env = "MQTT_LOADGEN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Client identifier (default: random `client_NNNN`)
    #[arg(long, env = "MQTT_LOADGEN_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Keep-alive in seconds
    #[arg(long)]
    pub keep_alive_secs: Option<u64>,

    /// Seconds to wait for the broker's connect acknowledgement
    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        mqtt: MqttArgs,
    }

    #[test]
    fn test_parse_mqtt_args() {
        let cli = TestCli::parse_from([
            "test",
            "--broker",
            "10.1.2.3",
            "--port",
            "1884",
            "--username",
            "loader",
            "--keep-alive-secs",
            "30",
        ]);

        assert_eq!(cli.mqtt.broker_address.as_deref(), Some("10.1.2.3"));
        assert_eq!(cli.mqtt.broker_port, Some(1884));
        assert_eq!(cli.mqtt.username.as_deref(), Some("loader"));
        assert_eq!(cli.mqtt.keep_alive_secs, Some(30));
        assert!(cli.mqtt.connect_timeout_secs.is_none());
    }
}
