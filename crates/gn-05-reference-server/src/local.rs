//! In-process executor: the full engine without a socket.

use crate::engine::QueryEngine;
use async_trait::async_trait;
use gn_01_query_protocol::{CorrelationId, ProtocolMisuseError, QueryMessage};
use gn_02_transport::{QueryExecutor, TransportError};
use std::sync::Arc;
use uuid::Uuid;

/// Runs each query straight through a [`QueryEngine`] as one session.
///
/// Follows the transport's contract: the message is stamped, answered, and
/// returned with the result merged in.
#[derive(Clone)]
pub struct InProcessExecutor {
    engine: Arc<QueryEngine>,
    session: String,
}

impl InProcessExecutor {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        Self {
            engine,
            session: Uuid::new_v4().to_string(),
        }
    }

    /// Same engine, different session (e.g. a second employee terminal).
    pub fn new_session(&self) -> Self {
        Self::new(self.engine.clone())
    }

    pub fn engine(&self) -> &Arc<QueryEngine> {
        &self.engine
    }
}

#[async_trait]
impl QueryExecutor for InProcessExecutor {
    async fn execute(&self, mut msg: QueryMessage) -> Result<QueryMessage, TransportError> {
        if !msg.kind().expects_response() {
            return Err(ProtocolMisuseError::NotExecutable(msg.kind().to_string()).into());
        }
        if let Some(previous) = msg.correlation_id() {
            return Err(ProtocolMisuseError::AlreadySent(previous.to_string()).into());
        }
        msg.stamp(CorrelationId::new());
        let reply = self
            .engine
            .handle(msg.clone(), &self.session)
            .await
            .ok_or(TransportError::ConnectionLost)?;
        msg.merge_response(reply)?;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TableStore;
    use gn_01_query_protocol::Value;

    #[tokio::test]
    async fn test_executes_and_merges() {
        let store = Arc::new(TableStore::new());
        store.create_table("park");
        store.seed("park", [("parkId", Value::from(1))]).unwrap();
        let executor = InProcessExecutor::new(Arc::new(QueryEngine::new(store)));

        let msg = QueryMessage::select("park").build().unwrap();
        let answered = executor.execute(msg).await.unwrap();
        assert!(answered.correlation_id().is_some());
        assert_eq!(answered.result_rows().len(), 1);

        let err = executor.execute(answered).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Misuse(ProtocolMisuseError::AlreadySent(_))
        ));
    }
}
