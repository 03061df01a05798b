//! Connection and transport configuration with validation.

use crate::errors::ConnectError;
use gn_01_query_protocol::DEFAULT_MAX_FRAME_LEN;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Lowest port a station may connect to.
pub const MIN_PORT: u16 = 1024;

/// Server endpoint a station connects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Hostname or dotted IPv4 address
    pub host: String,
    /// Port in 1024..=65535
    pub port: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5555,
        }
    }
}

impl EndpointConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Check host and port without touching the network.
    pub fn validate(&self) -> Result<(), ConnectError> {
        if !is_valid_host(&self.host) {
            return Err(ConnectError::InvalidHost(self.host.clone()));
        }
        if self.port < MIN_PORT {
            return Err(ConnectError::InvalidPort(self.port));
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Hostname (RFC 1123 labels) or dotted-quad IPv4.
///
/// All-numeric names must parse as IPv4, so `999.1.1.1` is rejected.
pub fn is_valid_host(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels
        .iter()
        .all(|l| !l.is_empty() && l.bytes().all(|b| b.is_ascii_digit()))
    {
        return host.parse::<Ipv4Addr>().is_ok();
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

/// Transport timing and sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Bound on the TCP connect
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Bound on every `execute`
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Bound on flushing DISCONNECT before teardown
    #[serde(with = "humantime_serde")]
    pub disconnect_grace: Duration,
    /// How often orphaned registry entries are swept
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Max frame body in bytes
    pub max_frame_len: usize,
    /// Server notifications buffered per subscriber
    pub notification_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            disconnect_grace: Duration::from_secs(2),
            sweep_interval: Duration::from_secs(10),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            notification_buffer: 64,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("connect_timeout", self.connect_timeout),
            ("request_timeout", self.request_timeout),
            ("disconnect_grace", self.disconnect_grace),
            ("sweep_interval", self.sweep_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidTimeout(format!("{} cannot be 0", name)));
            }
        }
        if self.max_frame_len == 0 {
            return Err(ConfigError::InvalidLimit("max_frame_len cannot be 0".into()));
        }
        if self.notification_buffer == 0 {
            return Err(ConfigError::InvalidLimit(
                "notification_buffer cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Humantime serde module for Duration serialization (`"30s"`, `"250ms"`, `"2m"`).
pub mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
