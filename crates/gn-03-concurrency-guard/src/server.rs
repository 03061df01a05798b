//! Store-side exclusion primitives.
//!
//! - [`CriticalSections`]: one async mutex per resource index, created on first
//!   use. Requests for the same index queue; different indices never contend.
//! - [`AdvisoryLocks`]: non-blocking named locks. A second session asking for
//!   a held key is told so immediately instead of waiting.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, trace};

// =============================================================================
// CRITICAL SECTIONS
// =============================================================================

/// Per-index mutual exclusion.
#[derive(Default)]
pub struct CriticalSections {
    sections: DashMap<u32, Arc<Mutex<()>>>,
    entered: AtomicU64,
    contended: AtomicU64,
}

/// Held while a guarded request runs. Released on drop.
pub struct CriticalSectionGuard {
    index: u32,
    _guard: OwnedMutexGuard<()>,
}

impl CriticalSectionGuard {
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl CriticalSections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `index`.
    pub async fn enter(&self, index: u32) -> CriticalSectionGuard {
        // Clone the Arc out so no map shard is locked across the await.
        let section = self
            .sections
            .entry(index)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = match section.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                self.contended.fetch_add(1, Ordering::Relaxed);
                trace!(index = index, "Waiting for critical section");
                section.lock_owned().await
            }
        };
        self.entered.fetch_add(1, Ordering::Relaxed);
        CriticalSectionGuard {
            index,
            _guard: guard,
        }
    }

    /// Number of distinct indices seen so far.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// (entered, entered after waiting)
    pub fn counters(&self) -> (u64, u64) {
        (
            self.entered.load(Ordering::Relaxed),
            self.contended.load(Ordering::Relaxed),
        )
    }
}

// =============================================================================
// ADVISORY LOCKS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvisoryLockError {
    #[error("lock {key} is held by session {holder}")]
    Held { key: String, holder: String },
}

/// Named locks keyed by e.g. booking id, held by a session id.
#[derive(Clone, Default)]
pub struct AdvisoryLocks {
    held: Arc<DashMap<String, String>>,
}

/// Releases its key on drop.
#[derive(Debug)]
pub struct AdvisoryLockGuard {
    held: Arc<DashMap<String, String>>,
    key: String,
    session: String,
}

impl AdvisoryLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for AdvisoryLockGuard {
    fn drop(&mut self) {
        // Only release if we are still the holder.
        let session = &self.session;
        if self
            .held
            .remove_if(&self.key, |_, holder| holder == session)
            .is_some()
        {
            debug!(key = %self.key, session = %session, "Released advisory lock");
        }
    }
}

impl AdvisoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `key` for `session`, or report who holds it. Never waits.
    pub fn try_acquire(
        &self,
        key: &str,
        session: &str,
    ) -> Result<AdvisoryLockGuard, AdvisoryLockError> {
        match self.held.entry(key.to_string()) {
            Entry::Occupied(e) => Err(AdvisoryLockError::Held {
                key: key.to_string(),
                holder: e.get().clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(session.to_string());
                debug!(key = %key, session = %session, "Acquired advisory lock");
                Ok(AdvisoryLockGuard {
                    held: self.held.clone(),
                    key: key.to_string(),
                    session: session.to_string(),
                })
            }
        }
    }

    pub fn holder(&self, key: &str) -> Option<String> {
        self.held.get(key).map(|h| h.value().clone())
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_critical_section_excludes_same_index() {
        let sections = Arc::new(CriticalSections::new());
        let counter = Arc::new(std::sync::atomic::AtomicI64::new(0));
        let max_seen = Arc::new(std::sync::atomic::AtomicI64::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sections = sections.clone();
                let counter = counter.clone();
                let max_seen = max_seen.clone();
                tokio::spawn(async move {
                    let _guard = sections.enter(7).await;
                    let inside = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(inside, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    counter.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(sections.counters().0, 8);
        assert_eq!(sections.len(), 1);
    }

    #[tokio::test]
    async fn test_different_indices_do_not_contend() {
        let sections = CriticalSections::new();
        let a = sections.enter(1).await;
        let b = tokio::time::timeout(Duration::from_millis(100), sections.enter(2))
            .await
            .unwrap();
        assert_eq!((a.index(), b.index()), (1, 2));
        assert_eq!(sections.counters().1, 0);
    }

    #[tokio::test]
    async fn test_critical_section_released_on_drop() {
        let sections = CriticalSections::new();
        drop(sections.enter(1).await);
        let again = tokio::time::timeout(Duration::from_millis(100), sections.enter(1)).await;
        assert!(again.is_ok());
    }

    #[test]
    fn test_advisory_lock_is_exclusive_and_reports_holder() {
        let locks = AdvisoryLocks::new();
        let guard = locks.try_acquire("b-1", "employee-a").unwrap();
        assert_eq!(
            locks.try_acquire("b-1", "employee-b").unwrap_err(),
            AdvisoryLockError::Held {
                key: "b-1".into(),
                holder: "employee-a".into()
            }
        );
        assert!(locks.try_acquire("b-2", "employee-b").is_ok());
        drop(guard);
        assert!(!locks.is_held("b-1"));
        assert!(locks.try_acquire("b-1", "employee-b").is_ok());
    }

    #[test]
    fn test_stale_guard_does_not_release_new_holder() {
        let locks = AdvisoryLocks::new();
        let stale = AdvisoryLockGuard {
            held: locks.held.clone(),
            key: "b-1".into(),
            session: "s1".into(),
        };
        let _current = locks.try_acquire("b-1", "s2").unwrap();
        drop(stale);
        assert_eq!(locks.holder("b-1").as_deref(), Some("s2"));
        assert_eq!(locks.len(), 1);
    }
}
