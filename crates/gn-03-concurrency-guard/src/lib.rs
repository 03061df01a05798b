//! # Concurrency Guard
//!
//! Two guard flavors protect shared reservation state on the store:
//!
//! | Guard | Tag | Store primitive | Denial |
//! |-------|-----|-----------------|--------|
//! | Critical resource | `criticalResourceIndex` (park id) | [`CriticalSections`] | `conflict` |
//! | Advisory lock | `advisoryLockKey` (booking id) | [`AdvisoryLocks`] | `lockHeld` |
//!
//! Clients tag requests and branch on the answer with [`classify`] or
//! [`lock_outcome`]; denials are values, not errors. Conflicting writes are
//! retried through [`retry_on_denial`].
//!
//! The store evaluates every conditional part of a guarded write (capacity
//! bound, rank assignment, compare-and-swap predicate) while holding the
//! critical section for the request's index.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod outcome;
pub mod retry;
pub mod server;

pub use outcome::{
    classify, lock_outcome, GuardDenial, GuardTag, GuardTagExt, LockOutcome, Outcome,
};
pub use retry::{retry_on_denial, RetryPolicy};
pub use server::{
    AdvisoryLockError, AdvisoryLockGuard, AdvisoryLocks, CriticalSectionGuard, CriticalSections,
};
