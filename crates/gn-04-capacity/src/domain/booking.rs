//! Booking attempt state machine.
//!
//! ```text
//! Quoting ──→ AvailabilityChecked ──┬──→ Confirmed
//!    │                              ├──→ Waitlisted
//!    └──────────────────────────────┴──→ Rejected
//! ```
//!
//! Terminal states accept no further transitions.

use crate::domain::park::{Availability, BookingRequest};
use crate::errors::CapacityError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingState {
    Quoting,
    AvailabilityChecked(Availability),
    Confirmed,
    Waitlisted { priority: i64 },
    Rejected { reason: String },
}

impl BookingState {
    pub fn name(&self) -> &'static str {
        match self {
            BookingState::Quoting => "Quoting",
            BookingState::AvailabilityChecked(_) => "AvailabilityChecked",
            BookingState::Confirmed => "Confirmed",
            BookingState::Waitlisted { .. } => "Waitlisted",
            BookingState::Rejected { .. } => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingState::Confirmed | BookingState::Waitlisted { .. } | BookingState::Rejected { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct BookingAttempt {
    request: BookingRequest,
    state: BookingState,
}

impl BookingAttempt {
    pub fn new(request: BookingRequest) -> Self {
        Self {
            request,
            state: BookingState::Quoting,
        }
    }

    pub fn request(&self) -> &BookingRequest {
        &self.request
    }

    pub fn state(&self) -> &BookingState {
        &self.state
    }

    pub fn availability_checked(&mut self, availability: Availability) -> Result<(), CapacityError> {
        match self.state {
            BookingState::Quoting => {
                self.state = BookingState::AvailabilityChecked(availability);
                Ok(())
            }
            _ => Err(self.illegal("AvailabilityChecked")),
        }
    }

    /// Only after a check that found room.
    pub fn confirm(&mut self) -> Result<(), CapacityError> {
        match self.state {
            BookingState::AvailabilityChecked(a) if a.is_available() => {
                self.state = BookingState::Confirmed;
                Ok(())
            }
            _ => Err(self.illegal("Confirmed")),
        }
    }

    /// After any check, including one that found room but lost the admission race.
    pub fn waitlist(&mut self, priority: i64) -> Result<(), CapacityError> {
        match self.state {
            BookingState::AvailabilityChecked(_) => {
                self.state = BookingState::Waitlisted { priority };
                Ok(())
            }
            _ => Err(self.illegal("Waitlisted")),
        }
    }

    pub fn reject(&mut self, reason: impl Into<String>) -> Result<(), CapacityError> {
        if self.state.is_terminal() {
            return Err(self.illegal("Rejected"));
        }
        self.state = BookingState::Rejected {
            reason: reason.into(),
        };
        Ok(())
    }

    fn illegal(&self, to: &'static str) -> CapacityError {
        CapacityError::InvalidTransition {
            from: self.state.name(),
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn attempt() -> BookingAttempt {
        BookingAttempt::new(BookingRequest::new("b-1", Utc::now(), 10))
    }

    const ROOM: Availability = Availability {
        overlap: 10,
        margin: 60,
    };
    const FULL: Availability = Availability {
        overlap: 75,
        margin: -5,
    };

    #[test]
    fn test_confirm_path() {
        let mut a = attempt();
        a.availability_checked(ROOM).unwrap();
        a.confirm().unwrap();
        assert_eq!(a.state(), &BookingState::Confirmed);
        assert!(a.state().is_terminal());
    }

    #[test]
    fn test_cannot_confirm_when_full() {
        let mut a = attempt();
        a.availability_checked(FULL).unwrap();
        assert_eq!(
            a.confirm().unwrap_err(),
            CapacityError::InvalidTransition {
                from: "AvailabilityChecked",
                to: "Confirmed"
            }
        );
        a.waitlist(3).unwrap();
        assert_eq!(a.state(), &BookingState::Waitlisted { priority: 3 });
    }

    #[test]
    fn test_cannot_skip_check() {
        let mut a = attempt();
        assert!(a.confirm().is_err());
        assert!(a.waitlist(1).is_err());
        assert_eq!(a.state(), &BookingState::Quoting);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut a = attempt();
        a.reject("closed for maintenance").unwrap();
        assert!(a.availability_checked(ROOM).is_err());
        assert!(a.reject("again").is_err());
    }
}
