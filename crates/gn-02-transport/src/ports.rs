//! Driving port used by domain services.

use crate::errors::TransportError;
use async_trait::async_trait;
use gn_01_query_protocol::QueryMessage;

/// Executes one query and returns the same message carrying its result.
///
/// Implemented by [`crate::Transport`]; domain services depend on this trait
/// so they can be exercised against an in-process store.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, msg: QueryMessage) -> Result<QueryMessage, TransportError>;
}
