//! Client-side interpretation of a guarded reply.
//!
//! A denial is an expected result, never an error. Callers branch on
//! [`Outcome`] and keep [`Outcome::GuardDenied`] apart from
//! [`Outcome::ServerRejected`]: the first is worth a retry, the second is not.

use gn_01_query_protocol::{GuardOutcome, ProtocolMisuseError, QueryMessage, QueryMessageBuilder};
use std::fmt;

/// Why the store refused to run a guarded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDenial {
    /// The critical section was entered but the guarded condition (capacity
    /// bound, compare-and-swap predicate) no longer held.
    Conflict,
    /// Another session holds the advisory lock.
    LockHeld,
}

impl fmt::Display for GuardDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardDenial::Conflict => f.write_str("conflicting concurrent update"),
            GuardDenial::LockHeld => f.write_str("already being processed by another session"),
        }
    }
}

/// Three-way result of any answered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    GuardDenied(GuardDenial),
    /// Reached the store and failed there. Carries the store's text, if any.
    ServerRejected(Option<String>),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Outcome::GuardDenied(_))
    }
}

/// Classify an answered message.
pub fn classify(msg: &QueryMessage) -> Outcome {
    if msg.success() {
        return Outcome::Success;
    }
    match msg.guard_outcome() {
        Some(GuardOutcome::Conflict) => Outcome::GuardDenied(GuardDenial::Conflict),
        Some(GuardOutcome::LockHeld) => Outcome::GuardDenied(GuardDenial::LockHeld),
        _ => Outcome::ServerRejected(msg.result().error.clone()),
    }
}

/// Tri-state answer to an advisory-lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// Lock acquired and the guarded operation succeeded; proceed.
    Acquired,
    /// Nobody held the lock, but the operation itself failed (e.g. no such
    /// booking, or it was already processed).
    NotHeldOperationFailed,
    /// Another session is processing the same key.
    HeldByOther,
}

/// Read the tri-state lock result off an answered message.
pub fn lock_outcome(msg: &QueryMessage) -> LockOutcome {
    match (msg.success(), msg.guard_outcome()) {
        (_, Some(GuardOutcome::LockHeld)) => LockOutcome::HeldByOther,
        (true, _) => LockOutcome::Acquired,
        (false, _) => LockOutcome::NotHeldOperationFailed,
    }
}

/// A guard a request can ask the store to honor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardTag {
    /// Serialize against every request carrying the same index.
    Critical(u32),
    /// Take the named lock for the duration of this request.
    Advisory(String),
}

/// Attach guard tags to a message under construction.
pub trait GuardTagExt: Sized {
    fn guarded(self, tag: GuardTag) -> Result<Self, ProtocolMisuseError>;
}

impl GuardTagExt for QueryMessageBuilder {
    fn guarded(self, tag: GuardTag) -> Result<Self, ProtocolMisuseError> {
        match tag {
            GuardTag::Critical(index) => self.critical_resource(index),
            GuardTag::Advisory(key) => self.advisory_lock(key),
        }
    }
}
