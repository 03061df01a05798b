//! Retry with exponential backoff for guard conflicts.

use crate::outcome::{classify, Outcome};
use gn_01_query_protocol::QueryMessage;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retry configuration for denied guarded writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry (milliseconds)
    pub base_delay_ms: u64,
    /// Cap on any single delay (milliseconds)
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 20,
            max_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay after the `attempt`-th failure (1-based): base * 2^(attempt-1), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".into());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("max_delay_ms must be >= base_delay_ms".into());
        }
        Ok(())
    }
}

/// Run `op` until its reply is not a guard denial, or attempts run out.
///
/// `op` is called with the 1-based attempt number and must build a fresh
/// message each time, re-reading any state the guarded write depends on.
/// Returns the last answered message; the caller classifies it.
pub async fn retry_on_denial<F, Fut, E>(policy: &RetryPolicy, mut op: F) -> Result<QueryMessage, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<QueryMessage, E>>,
{
    let mut attempt = 1;
    loop {
        let reply = op(attempt).await?;
        match classify(&reply) {
            Outcome::GuardDenied(denial) if attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                debug!(
                    attempt = attempt,
                    denial = %denial,
                    delay_ms = delay.as_millis(),
                    "Guarded write denied, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            _ => return Ok(reply),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gn_01_query_protocol::{CorrelationId, GuardOutcome, QueryResult};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn reply(result: QueryResult) -> QueryMessage {
        let mut msg = QueryMessage::update("park")
            .set("currentCapacity", 1)
            .unwrap()
            .critical_resource(1)
            .unwrap()
            .build()
            .unwrap();
        msg.stamp(CorrelationId::new());
        msg.into_reply(result)
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 10,
            max_delay_ms: 50,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for(3), Duration::from_millis(40));
        assert_eq!(policy.delay_for(4), Duration::from_millis(50));
        assert_eq!(policy.delay_for(40), Duration::from_millis(50));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_policy_from_toml() {
        let policy: RetryPolicy = toml::from_str("max_attempts = 3").unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, RetryPolicy::default().base_delay_ms);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_granted() {
        let calls = AtomicU32::new(0);
        let result: Result<QueryMessage, ()> = retry_on_denial(&RetryPolicy::default(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(if n < 2 {
                    reply(QueryResult::denied(GuardOutcome::Conflict))
                } else {
                    reply(QueryResult::affected(1))
                })
            }
        })
        .await;
        assert!(result.unwrap().success());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);
        let result: Result<QueryMessage, ()> = retry_on_denial(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(reply(QueryResult::denied(GuardOutcome::Conflict))) }
        })
        .await;
        assert_eq!(result.unwrap().guard_outcome(), Some(GuardOutcome::Conflict));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_server_rejection_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<QueryMessage, ()> = retry_on_denial(&RetryPolicy::default(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(reply(QueryResult::rejected("boom"))) }
        })
        .await;
        assert!(!result.unwrap().success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_propagate_immediately() {
        let result = retry_on_denial(&RetryPolicy::default(), |_| async {
            Err::<QueryMessage, _>("connection lost")
        })
        .await;
        assert_eq!(result.unwrap_err(), "connection lost");
    }
}
