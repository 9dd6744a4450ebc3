//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `rvcbridge.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use rvcbridge_adapter_mqtt::MqttConfig;
use rvcbridge_adapter_slcan::SlcanConfig;
use rvcbridge_app::services::validator::CommandPolicy;
use rvcbridge_domain::command::Family;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the RV-C spec document.
    pub spec_file: SpecFileConfig,
    /// CAN interface settings.
    pub can: SlcanConfig,
    /// MQTT broker settings.
    pub mqtt: MqttConfig,
    /// Outbound command settings.
    pub command: CommandConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Input document paths.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SpecFileConfig {
    /// RV-C DGN/enum dictionary.
    pub spec: String,
    /// Entity mapping document.
    pub mapping: String,
}

/// Outbound command pipeline settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// CAN source address commands transmit from.
    pub source_address: u8,
    /// Total write attempts per frame.
    pub retry_count: u32,
    /// Delay between write attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Commands per second across the process.
    pub global_rate: usize,
    /// Commands per second per entity.
    pub entity_rate: usize,
    /// Minimum spacing between commands to one entity, in milliseconds.
    pub entity_cooldown_ms: u64,
    /// Entity ids that are always rejected.
    pub denylist: Vec<String>,
    /// When non-empty, the only accepted entity ids.
    pub allowlist: Vec<String>,
    /// Families commands may target.
    pub allowed_families: Vec<Family>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `rvcbridge.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or a
    /// value fails semantic validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("rvcbridge.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RVCBRIDGE_CAN") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.can.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.can.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("RVCBRIDGE_MQTT_BROKER") {
            self.mqtt.broker_host = val;
        }
        if let Ok(val) = std::env::var("RVCBRIDGE_SPEC_FILE") {
            self.spec_file.spec = val;
        }
        if let Ok(val) = std::env::var("RVCBRIDGE_MAPPING_FILE") {
            self.spec_file.mapping = val;
        }
        if let Ok(val) = std::env::var("RVCBRIDGE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.command.retry_count == 0 {
            return Err(ConfigError::Validation(
                "retry_count must be at least 1".to_string(),
            ));
        }
        if self.command.global_rate == 0 || self.command.entity_rate == 0 {
            return Err(ConfigError::Validation(
                "rate budgets must be at least 1 command/sec".to_string(),
            ));
        }
        if self.mqtt.base_topic.is_empty() {
            return Err(ConfigError::Validation(
                "mqtt base_topic cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl CommandConfig {
    /// The stage-4 policy derived from the configured lists.
    #[must_use]
    pub fn policy(&self) -> CommandPolicy {
        CommandPolicy {
            denylist: self.denylist.iter().cloned().collect(),
            allowlist: self.allowlist.iter().cloned().collect(),
            allowed_families: self.allowed_families.iter().copied().collect::<HashSet<_>>(),
        }
    }

    /// The per-entity cooldown as a duration.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.entity_cooldown_ms)
    }

    /// The retry spacing as a duration.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for SpecFileConfig {
    fn default() -> Self {
        Self {
            spec: "rvc_spec.toml".to_string(),
            mapping: "entity_mapping.toml".to_string(),
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            source_address: 99,
            retry_count: 3,
            retry_delay_ms: 100,
            global_rate: 10,
            entity_rate: 2,
            entity_cooldown_ms: 500,
            denylist: Vec::new(),
            allowlist: Vec::new(),
            allowed_families: vec![Family::Light, Family::Climate, Family::Switch],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "rvcbridged=info,rvcbridge=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
