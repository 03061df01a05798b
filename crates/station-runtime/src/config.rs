//! Station configuration.
//!
//! Loaded from an optional TOML file, then overridden from the environment:
//!
//! - `GN_SERVER_HOST`: server hostname or IPv4 address
//! - `GN_SERVER_PORT`: server port (1024..=65535)
//!
//! ```toml
//! [server]
//! host = "db.gonature.local"
//! port = 5555
//!
//! [transport]
//! request_timeout = "10s"
//!
//! [guard]
//! max_attempts = 8
//!
//! [station]
//! name = "acadia-gate-2"
//! ```

use gn_02_transport::{ConnectError, EndpointConfig, TransportConfig};
use gn_03_concurrency_guard::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_SERVER_HOST: &str = "GN_SERVER_HOST";
pub const ENV_SERVER_PORT: &str = "GN_SERVER_PORT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub server: EndpointConfig,
    pub transport: TransportConfig,
    pub guard: RetryPolicy,
    pub station: StationIdentity,
}

/// How this station names itself in logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationIdentity {
    pub name: String,
}

impl Default for StationIdentity {
    fn default() -> Self {
        Self {
            name: "station-01".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{var} has invalid value {value:?}")]
    InvalidOverride { var: &'static str, value: String },
    #[error(transparent)]
    Endpoint(#[from] ConnectError),
    #[error(transparent)]
    Transport(#[from] gn_02_transport::ConfigError),
    #[error("invalid guard policy: {0}")]
    Guard(String),
    #[error("station name cannot be empty")]
    EmptyStationName,
}

impl StationConfig {
    /// File (if any), then environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup(ENV_SERVER_HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_SERVER_PORT) {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidOverride {
                var: ENV_SERVER_PORT,
                value: port,
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.transport.validate()?;
        self.guard.validate().map_err(ConfigError::Guard)?;
        if self.station.name.trim().is_empty() {
            return Err(ConfigError::EmptyStationName);
        }
        Ok(())
    }
}
