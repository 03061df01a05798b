//! Store error types.

use thiserror::Error;

/// The request reached the store and failed there.
///
/// Reported to the client as `success=false` with the message text in
/// `error`; never fatal to the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("request names no table")]
    NoTable,

    #[error("{0} is not a store operation")]
    NotAQuery(String),

    #[error("aggregate and plain columns cannot be mixed")]
    MixedAggregate,

    #[error("column {column} holds a non-numeric value")]
    NotNumeric { column: String },
}
