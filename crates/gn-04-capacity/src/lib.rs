//! # Capacity Service
//!
//! Park capacity logic expressed as guarded query messages. Nothing here
//! holds a lock or a counter of its own: every check-then-write is either
//! re-validated by the store under a guard tag, or retried.
//!
//! ## Operations
//!
//! | Operation | Reads | Guarded write |
//! |-----------|-------|---------------|
//! | `check_availability` | SUM over overlap window | - |
//! | `request_booking` | availability | admit, else join waiting list |
//! | `record_entry` / `record_exit` | booking row, occupancy | advisory(booking) + CAS(park) |
//! | `cancel_booking` | - | advisory(booking) delete |
//! | `SessionService::logout` | - | plain update |
//!
//! ## Executor seam
//!
//! ```text
//! CapacityService ──→ Arc<dyn QueryExecutor> ──┬──→ Transport (TCP)
//!                                              └──→ any in-process executor
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod errors;
pub mod service;
pub mod session;

pub use domain::{
    columns, Availability, BookingAttempt, BookingRequest, BookingState, ParkSettings, PARK_TABLE,
};
pub use errors::CapacityError;
pub use service::{Admission, CancelOutcome, CapacityService, GateOutcome};
pub use session::{SessionService, UserRole, LOGGED_IN_COLUMN};
