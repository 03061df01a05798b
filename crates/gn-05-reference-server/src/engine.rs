//! Query engine: guard tags in, guarded results out.
//!
//! Order for one request:
//! 1. advisory lock (non-blocking; denial answers `lockHeld` immediately)
//! 2. critical section for the resource index (waits)
//! 3. store execution, including capacity bound / rank / CAS predicate
//! 4. release in reverse order

use crate::errors::StoreError;
use crate::store::{Execution, TableStore};
use gn_01_query_protocol::{ControlKind, GuardOutcome, MessageKind, QueryMessage, QueryResult};
use gn_03_concurrency_guard::{AdvisoryLocks, CriticalSections};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct QueryEngine {
    store: Arc<TableStore>,
    sections: CriticalSections,
    locks: AdvisoryLocks,
}

impl QueryEngine {
    pub fn new(store: Arc<TableStore>) -> Self {
        Self {
            store,
            sections: CriticalSections::new(),
            locks: AdvisoryLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<TableStore> {
        &self.store
    }

    pub fn sections(&self) -> &CriticalSections {
        &self.sections
    }

    pub fn locks(&self) -> &AdvisoryLocks {
        &self.locks
    }

    /// Answer one inbound message. `None` for kinds that get no reply.
    pub async fn handle(&self, msg: QueryMessage, session: &str) -> Option<QueryMessage> {
        match msg.kind() {
            MessageKind::QueryRequest(_) => {
                let result = self.run_query(&msg, session).await;
                Some(msg.into_reply(result))
            }
            MessageKind::ClientServer(ControlKind::Disconnect) | MessageKind::Notification => None,
            MessageKind::ClientServer(_) => Some(msg.into_reply(QueryResult {
                success: true,
                ..QueryResult::default()
            })),
        }
    }

    async fn run_query(&self, msg: &QueryMessage, session: &str) -> QueryResult {
        let lock = match msg.advisory_lock_key() {
            Some(key) => match self.locks.try_acquire(key, session) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    debug!(error = %e, "Advisory lock denied");
                    return QueryResult::denied(GuardOutcome::LockHeld);
                }
            },
            None => None,
        };
        let section = match msg.critical_resource_index() {
            Some(index) => Some(self.sections.enter(index).await),
            None => None,
        };

        let execution = self.store.execute(msg);

        let locked = lock.is_some();
        let critical = section.is_some();
        drop(section);
        drop(lock);

        interpret(msg, execution, locked, critical)
    }
}

fn interpret(
    msg: &QueryMessage,
    execution: Result<Execution, StoreError>,
    locked: bool,
    critical: bool,
) -> QueryResult {
    let exec = match execution {
        Ok(exec) => exec,
        Err(e) => {
            warn!(table = msg.table().unwrap_or("-"), error = %e, "Store rejected request");
            let result = QueryResult::rejected(e.to_string());
            return if locked {
                result.with_guard(GuardOutcome::LockFreeOperationFailed)
            } else {
                result
            };
        }
    };
    if exec.bound_exceeded {
        debug!(table = msg.table().unwrap_or("-"), "Capacity bound refused write");
        return QueryResult::denied(GuardOutcome::Conflict);
    }

    let mutation = msg.query_kind().is_some_and(|k| k.is_mutation());
    let mut result = if mutation {
        QueryResult {
            rows: exec.rows,
            ..QueryResult::affected(exec.affected)
        }
    } else {
        QueryResult::rows(exec.rows)
    };

    if locked || critical {
        result.guard_outcome = Some(if result.success {
            GuardOutcome::Granted
        } else if locked {
            GuardOutcome::LockFreeOperationFailed
        } else {
            // The guarded predicate (e.g. CAS on a counter) no longer held.
            GuardOutcome::Conflict
        });
    }
    result
}
