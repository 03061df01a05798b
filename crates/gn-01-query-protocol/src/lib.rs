//! # Query Protocol
//!
//! Typed description of one reservation-store operation, exchanged between
//! client stations (visitor kiosks, employee terminals, manager consoles) and
//! the store, without embedding raw SQL.
//!
//! ## Message Model
//!
//! | Kind | Sub-kind | Correlated | Purpose |
//! |------|----------|------------|---------|
//! | `QUERY_REQUEST` | `SELECT` / `INSERT` / `UPDATE` / `DELETE` | yes | store operation |
//! | `CLIENT_SERVER_MESSAGE` | `CONNECT` / `PING` | yes | session control |
//! | `CLIENT_SERVER_MESSAGE` | `DISCONNECT` | no | fire-and-forget teardown |
//! | `NOTIFICATION` | - | no | server push |
//!
//! ## Guard Tags
//!
//! - `criticalResourceIndex`: serialize against every request with the same
//!   index (e.g. one park's capacity counter).
//! - `advisoryLockKey`: take a named lock (e.g. a booking id) for the
//!   duration of this one request.
//! - `capacityBound` / `rank`: conditions and counters the store evaluates
//!   inside the critical section, so read-then-write happens atomically.
//!
//! ## Wire Format
//!
//! Length-prefixed JSON frames; see [`codec`].
//!
//! ```rust
//! use gn_01_query_protocol::{QueryMessage, ProtocolMisuseError};
//!
//! # fn main() -> Result<(), ProtocolMisuseError> {
//! let lookup = QueryMessage::select("acadia_active")
//!     .where_eq("bookingId", "123")?
//!     .build()?;
//! assert!(lookup.correlation_id().is_none());
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod codec;
pub mod correlation;
pub mod errors;
pub mod message;
pub mod value;

pub use codec::{read_frame, write_frame, DEFAULT_MAX_FRAME_LEN};
pub use correlation::CorrelationId;
pub use errors::{CodecError, ProtocolMisuseError};
pub use message::{
    CapacityBound, ControlKind, GuardOutcome, MessageKind, QueryKind, QueryMessage,
    QueryMessageBuilder, QueryResult, RankAssignment,
};
pub use value::{
    Aggregate, Assignment, CompareOp, Condition, Connective, Predicate, Row, SelectColumn, Value,
};
