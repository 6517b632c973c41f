use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ConfigError, Result};
use crate::serial::link::LinkConfig;
use crate::serial::protocol::{BAUD_RATE, COMMAND_DELAY, HOME_POSITION};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyS0".to_string(),
            baud_rate: BAUD_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    pub command_delay_ms: u64,
    pub write_timeout_ms: u64,
    pub read_idle_timeout_ms: u64,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    pub max_reconnect_attempts: Option<u32>,
    pub queue_capacity: usize,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            command_delay_ms: COMMAND_DELAY.as_millis() as u64,
            write_timeout_ms: 1000,
            read_idle_timeout_ms: 30_000,
            reconnect_initial_ms: 500,
            reconnect_max_ms: 10_000,
            max_reconnect_attempts: None,
            queue_capacity: 1,
        }
    }
}

/// Process configuration, read from a JSON file. Missing keys take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialSettings,
    pub link: LinkSettings,
    pub catalog_path: Option<PathBuf>,
    pub home_position: i32,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.serial.port.trim().is_empty() {
            return invalid("serial.port must not be empty");
        }
        if self.serial.baud_rate == 0 {
            return invalid("serial.baud_rate must be positive");
        }
        if self.link.command_delay_ms == 0 {
            return invalid("link.command_delay_ms must be positive");
        }
        if self.link.write_timeout_ms == 0 || self.link.read_idle_timeout_ms == 0 {
            return invalid("link timeouts must be positive");
        }
        if self.link.queue_capacity == 0 {
            return invalid("link.queue_capacity must be positive");
        }
        if self.link.reconnect_initial_ms == 0 || self.link.reconnect_max_ms < self.link.reconnect_initial_ms {
            return invalid("link.reconnect_max_ms must be at least link.reconnect_initial_ms (> 0)");
        }
        Ok(())
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            command_delay: Duration::from_millis(self.link.command_delay_ms),
            write_timeout: Duration::from_millis(self.link.write_timeout_ms),
            read_idle_timeout: Duration::from_millis(self.link.read_idle_timeout_ms),
            reconnect_initial: Duration::from_millis(self.link.reconnect_initial_ms),
            reconnect_max: Duration::from_millis(self.link.reconnect_max_ms),
            max_reconnect_attempts: self.link.max_reconnect_attempts,
            queue_capacity: self.link.queue_capacity,
            ..LinkConfig::default()
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings::default(),
            link: LinkSettings::default(),
            catalog_path: None,
            home_position: HOME_POSITION,
        }
    }
}
