use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub client_id: String,
    pub group_id: String,
    pub topics: KafkaTopics,
    pub message_timeout_ms: u64,
}

/// Kafka topic names cannot contain `/`, so every `robots/{id}/{channel}`
/// topic is carried as the record key on one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaTopics {
    pub commands: String,
    pub telemetry: String,
    pub events: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub turn_threshold_degrees: f64,
    /// Wait after a turn command before the forward command is sent.
    pub turn_settle_ms: u64,
    pub turn_speed: u8,
    pub forward_speed: u8,
    /// Used to estimate forward command durations, in meters per second.
    pub nominal_speed_mps: f64,
    pub min_battery_level: u8,
    pub continuous_interval_ms: u64,
    pub stop_on_release: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            turn_threshold_degrees: 30.0,
            turn_settle_ms: 2000,
            turn_speed: 30,
            forward_speed: 50,
            nominal_speed_mps: 0.5,
            min_battery_level: 20,
            continuous_interval_ms: 10_000,
            stop_on_release: true,
        }
    }
}

impl NavigationConfig {
    pub fn turn_settle(&self) -> Duration {
        Duration::from_millis(self.turn_settle_ms)
    }

    pub fn continuous_interval(&self) -> Duration {
        Duration::from_millis(self.continuous_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Zero disables the bound on waiting for the bus acknowledgment.
    pub ack_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { ack_timeout_ms: 5000 }
    }
}

impl DispatchConfig {
    pub fn ack_timeout(&self) -> Option<Duration> {
        (self.ack_timeout_ms > 0).then(|| Duration::from_millis(self.ack_timeout_ms))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub k_nearest: usize,
    pub epsilon: f64,
    pub pixel_tolerance: f64,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            k_nearest: 3,
            epsilon: 1e-4,
            pixel_tolerance: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
    /// When set, domain log lines are also written here through fast_log.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Layered load: defaults, then the optional TOML file, then
    /// `CAMPUS_GUIDE__SECTION__KEY` environment variables.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("CAMPUS_GUIDE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("kafka.brokers")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kafka: KafkaConfig {
                brokers: vec!["localhost:9092".to_string()],
                client_id: "campus-guide".to_string(),
                group_id: "campus-guide-group".to_string(),
                topics: KafkaTopics {
                    commands: "robot-commands".to_string(),
                    telemetry: "robot-telemetry".to_string(),
                    events: "robot-events".to_string(),
                },
                message_timeout_ms: 5000,
            },
            postgres: PostgresConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "campus_guide".to_string(),
                username: "postgres".to_string(),
                password: "password".to_string(),
                max_connections: 10,
            },
            storage: StorageConfig::default(),
            navigation: NavigationConfig::default(),
            dispatch: DispatchConfig::default(),
            mapping: MappingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_from_file_fills_missing_sections_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[kafka]
brokers = ["broker:9092"]
client_id = "guide"
group_id = "guide-group"
message_timeout_ms = 1000

[kafka.topics]
commands = "cmd"
telemetry = "tel"
events = "evt"

[postgres]
host = "db"
port = 5432
database = "guide"
username = "u"
password = "p"
max_connections = 4

[navigation]
turn_settle_ms = 0
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).await.unwrap();
        assert_eq!(config.kafka.topics.commands, "cmd");
        assert_eq!(config.navigation.turn_settle_ms, 0);
        assert_eq!(config.navigation.turn_threshold_degrees, 30.0);
        assert_eq!(config.mapping.k_nearest, 3);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.dispatch.ack_timeout(), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn test_zero_ack_timeout_disables_bound() {
        let dispatch = DispatchConfig { ack_timeout_ms: 0 };
        assert!(dispatch.ack_timeout().is_none());
    }
}
