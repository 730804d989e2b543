//! Configuration file support for l2orchd
//!
//! Loads and validates the daemon configuration from a TOML file.
//! Default location: /etc/sonic/l2orchd.toml

use crate::daemon::OrchDaemonConfig;
use crate::fdb::FdbOrchConfig;
use crate::ports::PortsOrchConfig;
use serde::{Deserialize, Serialize};
use sonic_sai::VirtualSwitchConfig;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/l2orchd.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Task runner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSection {
    /// Period of the orch timer in milliseconds
    #[serde(default = "default_timer_interval_ms")]
    pub timer_interval_ms: u64,

    /// Events pulled per table per pass
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Front-panel layout of the virtual switch
///
/// An explicit `ports` list wins over `port_count`/`port_stride`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchSection {
    #[serde(default)]
    pub ports: Vec<String>,

    #[serde(default = "default_port_count")]
    pub port_count: usize,

    /// Step between interface numbers (`Ethernet0`, `Ethernet4`, ...)
    #[serde(default = "default_port_stride")]
    pub port_stride: usize,
}

/// FDB pending-queue policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FdbSection {
    /// Most entries waiting for a VLAN or bridge port
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Seconds an entry may wait before it is reported
    #[serde(default = "default_pending_timeout_secs")]
    pub pending_timeout_secs: u64,
}

/// Complete l2orchd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2OrchConfig {
    #[serde(default)]
    pub daemon: DaemonSection,

    #[serde(default)]
    pub switch: SwitchSection,

    #[serde(default)]
    pub fdb: FdbSection,
}

fn default_timer_interval_ms() -> u64 {
    1000
}

fn default_batch_size() -> usize {
    128
}

fn default_port_count() -> usize {
    32
}

fn default_port_stride() -> usize {
    4
}

fn default_max_pending() -> usize {
    4096
}

fn default_pending_timeout_secs() -> u64 {
    300
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            timer_interval_ms: default_timer_interval_ms(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for SwitchSection {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            port_count: default_port_count(),
            port_stride: default_port_stride(),
        }
    }
}

impl Default for FdbSection {
    fn default() -> Self {
        Self {
            max_pending: default_max_pending(),
            pending_timeout_secs: default_pending_timeout_secs(),
        }
    }
}

impl L2OrchConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_toml_str(&content).map_err(|e| match e {
                    ConfigError::Parse { source, .. } => ConfigError::Parse {
                        path: path.display().to_string(),
                        source,
                    },
                    other => other,
                })?;
                info!(path = %path.display(), "loaded configuration");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: "<string>".to_string(),
            source,
        })
    }

    pub fn timer_interval(&self) -> Duration {
        Duration::from_millis(self.daemon.timer_interval_ms)
    }

    pub fn pending_timeout(&self) -> Duration {
        Duration::from_secs(self.fdb.pending_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.daemon.timer_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "daemon.timer_interval_ms must be > 0".to_string(),
            ));
        }

        if self.daemon.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "daemon.batch_size must be > 0".to_string(),
            ));
        }

        if self.switch.ports.is_empty() {
            if self.switch.port_count == 0 {
                return Err(ConfigError::Invalid(
                    "switch.port_count must be > 0 when no ports are listed".to_string(),
                ));
            }
            if self.switch.port_stride == 0 {
                return Err(ConfigError::Invalid(
                    "switch.port_stride must be > 0".to_string(),
                ));
            }
        } else {
            let mut seen = std::collections::HashSet::new();
            for port in &self.switch.ports {
                if port.is_empty() || !seen.insert(port.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "switch.ports has an empty or repeated name {:?}",
                        port
                    )));
                }
            }
        }

        if self.fdb.max_pending == 0 {
            return Err(ConfigError::Invalid(
                "fdb.max_pending must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn daemon_config(&self) -> OrchDaemonConfig {
        OrchDaemonConfig {
            timer_interval: self.timer_interval(),
            batch_size: self.daemon.batch_size,
        }
    }

    pub fn ports_config(&self) -> PortsOrchConfig {
        PortsOrchConfig {
            batch_size: self.daemon.batch_size,
        }
    }

    pub fn fdb_config(&self) -> FdbOrchConfig {
        FdbOrchConfig {
            max_pending: self.fdb.max_pending,
            pending_timeout: self.pending_timeout(),
            batch_size: self.daemon.batch_size,
        }
    }

    pub fn switch_config(&self) -> VirtualSwitchConfig {
        if self.switch.ports.is_empty() {
            VirtualSwitchConfig::front_panel(self.switch.port_count, self.switch.port_stride)
        } else {
            VirtualSwitchConfig {
                ports: self.switch.ports.clone(),
            }
        }
    }
}
