use clap::{Args, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Fixed period of the active-sensor reset check.
pub const RESET_PERIOD: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "home-alarm", version, about)]
pub struct Config {
    #[command(flatten)]
    pub mqtt: MqttConfig,
    #[command(flatten)]
    pub alarm: AlarmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct MqttConfig {
    #[arg(long = "mqtt-host", env = "MQTT_BROKER_HOST", default_value = "localhost")]
    pub broker_host: String,
    #[arg(long = "mqtt-port", env = "MQTT_BROKER_PORT", default_value_t = 1883)]
    pub broker_port: u16,
    #[arg(long = "mqtt-client-id", env = "MQTT_CLIENT_ID", default_value = "home-alarm")]
    pub client_id: String,
    #[arg(long = "mqtt-username", env = "MQTT_USERNAME")]
    pub username: Option<String>,
    #[arg(long = "mqtt-password", env = "MQTT_PASSWORD")]
    pub password: Option<String>,
    /// Root of every topic the controller publishes or subscribes to.
    #[arg(long, env = "ALARM_TOPIC_PREFIX", default_value = "bridge")]
    pub topic_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct AlarmConfig {
    /// Identifier of this controller on the bus.
    #[arg(long, env = "ALARM_APP_ID", default_value = "basic_alarm")]
    pub app_id: String,
    /// Concentrator client that alerts are addressed to.
    #[arg(long, env = "ALARM_REMOTE_ID", default_value = "CID71")]
    pub remote_id: String,
    /// Directory holding the enable flag and options files.
    #[arg(long, env = "ALARM_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "home-alarm".to_string(),
                username: None,
                password: None,
                topic_prefix: "bridge".to_string(),
            },
            alarm: AlarmConfig {
                app_id: "basic_alarm".to_string(),
                remote_id: "CID71".to_string(),
                config_dir: None,
            },
        }
    }
}

impl AlarmConfig {
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|dir| dir.join("home-alarm"))
                .unwrap_or_else(|| PathBuf::from("config"))
        })
    }

    pub fn state_paths(&self) -> StatePaths {
        StatePaths::new(&self.config_dir(), &self.app_id)
    }
}

/// Locations of the two files the controller persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub enable_flag: PathBuf,
    pub options: PathBuf,
}

impl StatePaths {
    pub fn new(dir: &std::path::Path, app_id: &str) -> Self {
        Self {
            enable_flag: dir.join(format!("{app_id}.enabled")),
            options: dir.join(format!("{app_id}.json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_defaults() {
        let config = Config::parse_from([
            "home-alarm",
            "--mqtt-host",
            "10.0.0.2",
            "--app-id",
            "hall_alarm",
            "--config-dir",
            "/var/lib/alarm",
        ]);
        assert_eq!(config.mqtt.broker_host, "10.0.0.2");
        assert_eq!(config.mqtt.broker_port, 1883);
        assert_eq!(config.alarm.app_id, "hall_alarm");
        assert_eq!(config.alarm.remote_id, "CID71");

        let paths = config.alarm.state_paths();
        assert_eq!(
            paths.enable_flag,
            PathBuf::from("/var/lib/alarm/hall_alarm.enabled")
        );
        assert_eq!(paths.options, PathBuf::from("/var/lib/alarm/hall_alarm.json"));
    }

    #[test]
    fn test_default_config_dir_is_named_after_crate() {
        let config = Config::default();
        let dir = config.alarm.config_dir();
        assert!(dir.ends_with("home-alarm") || dir == PathBuf::from("config"));
    }
}
