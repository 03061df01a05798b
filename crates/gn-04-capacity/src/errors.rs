//! Capacity service errors.
//!
//! Guard denials that the service can resolve itself (retry, route to the
//! waiting list) never surface here; the ones that reach the caller keep
//! their own variant so they are not confused with server rejections.

use gn_01_query_protocol::ProtocolMisuseError;
use gn_02_transport::TransportError;
use gn_03_concurrency_guard::GuardDenial;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Misuse(#[from] ProtocolMisuseError),

    #[error("guarded write denied: {0}")]
    Denied(GuardDenial),

    /// Conflicting updates kept winning for every attempt.
    #[error("gave up after {attempts} conflicting attempts")]
    Contended { attempts: u32 },

    /// Applying the gate delta would leave `0..=maximumVisitors`.
    #[error("occupancy {observed} cannot change by {delta}")]
    OccupancyOutOfRange { observed: i64, delta: i64 },

    #[error("server rejected the request: {0}")]
    ServerRejected(String),

    #[error("park not found: {0}")]
    ParkNotFound(String),

    #[error("unexpected reply shape: {0}")]
    Malformed(String),

    #[error("illegal booking transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}
