//! Correlation ID for request/response matching.
//!
//! Uses UUID v7 for time-ordered, unique identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlation ID stamped on a query by the transport at send time.
///
/// Two messages are "the same request" iff their correlation ids match;
/// content equality never participates in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new correlation ID (UUID v7)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse from string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Milliseconds since Unix epoch encoded in the first 48 bits (v7 only).
    pub fn timestamp_ms(&self) -> Option<u64> {
        let bytes = self.0.as_bytes();
        if (bytes[6] >> 4) != 7 {
            return None;
        }
        Some(bytes[..6].iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| CorrelationId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_display_and_parse() {
        let id = CorrelationId::new();
        let s = id.to_string();
        assert_eq!(s.len(), 36);
        assert_eq!(CorrelationId::parse(&s).unwrap(), id);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = CorrelationId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    #[test]
    fn test_timestamp_is_recent() {
        let ts = CorrelationId::new().timestamp_ms().unwrap();
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        assert!(now_ms.abs_diff(ts) < 1000);
    }

    #[test]
    fn test_non_v7_has_no_timestamp() {
        let id = CorrelationId::from(Uuid::nil());
        assert!(id.timestamp_ms().is_none());
    }
}
