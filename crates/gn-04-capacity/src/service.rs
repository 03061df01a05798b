//! Capacity service.
//!
//! Every write that touches shared park state is guarded:
//!
//! | Operation | Guard | Store-side condition |
//! |-----------|-------|----------------------|
//! | `admit` | critical(park) | capacity bound on the overlap window |
//! | `join_waitlist` | critical(park) | rank = count(window) + 1 |
//! | occupancy change | critical(park) | `currentCapacity = observed` (CAS) |
//! | entry / exit / cancel | advisory(booking) | row still in the expected state |
//! | waitlist re-rank | critical(park) | `priority = observed` |
//!
//! Reads (availability, counts, occupancy) are plain queries. They inform a
//! decision, but the guarded write re-validates it.
//!
//! A gate event stamps the booking first and moves occupancy second. If the
//! occupancy change does not go through, the stamp is cleared again so the
//! event can be retried.

use crate::domain::park::{columns, PARK_TABLE};
use crate::domain::{Availability, BookingAttempt, BookingRequest, ParkSettings};
use crate::errors::CapacityError;
use chrono::{DateTime, TimeZone, Utc};
use gn_01_query_protocol::{
    Aggregate, CapacityBound, CompareOp, Condition, QueryMessage, QueryMessageBuilder,
    SelectColumn, Value,
};
use gn_02_transport::QueryExecutor;
use gn_03_concurrency_guard::{
    classify, lock_outcome, retry_on_denial, GuardDenial, GuardTag, GuardTagExt, LockOutcome,
    Outcome, RetryPolicy,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of a guarded admission write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Confirmed,
    /// The capacity bound no longer held when the write ran.
    CapacityExceeded,
}

/// Result of processing a booking at the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Recorded; the park's occupancy is now `occupancy`.
    Processed { occupancy: i64 },
    /// Entry refused: the group would take occupancy past `maximumVisitors`.
    /// Nothing was recorded.
    ParkFull { occupancy: i64 },
    /// Another employee holds this booking right now.
    AlreadyBeingProcessed,
    /// The booking exists but is not in a state this step applies to
    /// (already entered, already left, or never entered).
    AlreadyProcessed,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Removed from active bookings.
    Cancelled,
    /// Removed from the waiting list.
    LeftWaitlist,
    AlreadyBeingProcessed,
    NotFound,
}

/// Which gate event to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Entry,
    Exit,
}

impl Gate {
    fn column(self) -> &'static str {
        match self {
            Gate::Entry => columns::ENTRY_TIME,
            Gate::Exit => columns::EXIT_TIME,
        }
    }
}

pub struct CapacityService {
    executor: Arc<dyn QueryExecutor>,
    retry: RetryPolicy,
}

impl CapacityService {
    pub fn new(executor: Arc<dyn QueryExecutor>, retry: RetryPolicy) -> Self {
        Self { executor, retry }
    }

    async fn run(&self, msg: QueryMessage) -> Result<QueryMessage, CapacityError> {
        Ok(self.executor.execute(msg).await?)
    }

    /// Run a read and require success.
    async fn read(&self, msg: QueryMessage) -> Result<QueryMessage, CapacityError> {
        let reply = self.run(msg).await?;
        match classify(&reply) {
            Outcome::Success => Ok(reply),
            Outcome::GuardDenied(denial) => Err(CapacityError::Denied(denial)),
            Outcome::ServerRejected(reason) => Err(rejected(reason)),
        }
    }

    // =========================================================================
    // SETTINGS & READS
    // =========================================================================

    pub async fn park_settings(&self, park_name: &str) -> Result<ParkSettings, CapacityError> {
        let msg = QueryMessage::select(PARK_TABLE)
            .columns(ParkSettings::COLUMNS)?
            .where_eq(columns::PARK_NAME, park_name)?
            .build()?;
        let reply = self.read(msg).await?;
        let row = reply
            .result_rows()
            .first()
            .ok_or_else(|| CapacityError::ParkNotFound(park_name.to_string()))?;
        ParkSettings::from_row(row)
    }

    /// Live occupancy, read fresh from the store.
    pub async fn current_occupancy(&self, park: &ParkSettings) -> Result<i64, CapacityError> {
        let msg = QueryMessage::select(PARK_TABLE)
            .column(columns::CURRENT_CAPACITY)?
            .where_eq(columns::PARK_ID, park.park_id)?
            .build()?;
        let reply = self.read(msg).await?;
        reply
            .scalar()
            .ok_or_else(|| CapacityError::ParkNotFound(park.name.clone()))?
            .as_i64()
            .ok_or_else(|| CapacityError::Malformed("currentCapacity is not numeric".into()))
    }

    /// Sum booked visitors in the overlap window and compare to `maximumOrders`.
    pub async fn check_availability(
        &self,
        park: &ParkSettings,
        visit_time: DateTime<Utc>,
        visitors: i64,
    ) -> Result<Availability, CapacityError> {
        let msg = QueryMessage::select(park.active_table())
            .aggregate(Aggregate::Sum, columns::NUMBER_OF_VISITORS)?
            .where_predicate(park.overlap_window(visit_time))?
            .build()?;
        let reply = self.read(msg).await?;
        let overlap = scalar_i64(&reply).unwrap_or(0);
        let availability = Availability {
            overlap,
            margin: park.maximum_orders - overlap - visitors,
        };
        debug!(
            park = %park.name,
            overlap = overlap,
            requested = visitors,
            margin = availability.margin,
            "Checked availability"
        );
        Ok(availability)
    }

    pub async fn waitlist_count(
        &self,
        park: &ParkSettings,
        visit_time: DateTime<Utc>,
    ) -> Result<i64, CapacityError> {
        let msg = QueryMessage::select(park.waiting_table())
            .select_column(SelectColumn::count())?
            .where_predicate(park.overlap_window(visit_time))?
            .build()?;
        let reply = self.read(msg).await?;
        Ok(scalar_i64(&reply).unwrap_or(0))
    }

    // =========================================================================
    // BOOKING
    // =========================================================================

    /// Insert into active bookings only if the window still has room.
    pub async fn admit(
        &self,
        park: &ParkSettings,
        request: &BookingRequest,
    ) -> Result<Admission, CapacityError> {
        let msg = booking_row(QueryMessage::insert(park.active_table()), request)?
            .set(columns::ENTRY_TIME, Value::Null)?
            .set(columns::EXIT_TIME, Value::Null)?
            .capacity_bound(CapacityBound {
                sum_column: columns::NUMBER_OF_VISITORS.to_string(),
                scope: park.overlap_window(request.visit_time),
                limit: park.maximum_orders,
                adding: request.visitors,
            })?
            .guarded(GuardTag::Critical(park.park_id))?
            .build()?;
        let reply = self.run(msg).await?;
        match classify(&reply) {
            Outcome::Success => {
                info!(park = %park.name, booking_id = %request.booking_id, "Booking confirmed");
                Ok(Admission::Confirmed)
            }
            Outcome::GuardDenied(GuardDenial::Conflict) => {
                info!(park = %park.name, booking_id = %request.booking_id, "Admission refused, window full");
                Ok(Admission::CapacityExceeded)
            }
            Outcome::GuardDenied(denial) => Err(CapacityError::Denied(denial)),
            Outcome::ServerRejected(reason) => Err(rejected(reason)),
        }
    }

    /// Append to the waiting list; the store assigns the FIFO priority.
    pub async fn join_waitlist(
        &self,
        park: &ParkSettings,
        request: &BookingRequest,
    ) -> Result<i64, CapacityError> {
        let msg = booking_row(QueryMessage::insert(park.waiting_table()), request)?
            .rank_column(columns::PRIORITY, park.overlap_window(request.visit_time))?
            .guarded(GuardTag::Critical(park.park_id))?
            .build()?;
        let reply = self.read(msg).await?;
        let priority = scalar_i64(&reply)
            .ok_or_else(|| CapacityError::Malformed("waitlist insert returned no priority".into()))?;
        info!(
            park = %park.name,
            booking_id = %request.booking_id,
            priority = priority,
            "Joined waiting list"
        );
        Ok(priority)
    }

    /// Full flow: check, then admit or fall back to the waiting list.
    pub async fn request_booking(
        &self,
        park: &ParkSettings,
        request: BookingRequest,
    ) -> Result<BookingAttempt, CapacityError> {
        let mut attempt = BookingAttempt::new(request);
        let availability = self
            .check_availability(park, attempt.request().visit_time, attempt.request().visitors)
            .await?;
        attempt.availability_checked(availability)?;

        if availability.is_available() {
            match self.admit(park, attempt.request()).await {
                Ok(Admission::Confirmed) => {
                    attempt.confirm()?;
                    return Ok(attempt);
                }
                Ok(Admission::CapacityExceeded) => {
                    debug!(booking_id = %attempt.request().booking_id, "Lost admission race");
                }
                Err(CapacityError::ServerRejected(reason)) => {
                    attempt.reject(reason)?;
                    return Ok(attempt);
                }
                Err(e) => return Err(e),
            }
        }

        match self.join_waitlist(park, attempt.request()).await {
            Ok(priority) => attempt.waitlist(priority)?,
            Err(CapacityError::ServerRejected(reason)) => attempt.reject(reason)?,
            Err(e) => return Err(e),
        }
        Ok(attempt)
    }

    /// Remove a booking that has not entered yet, or its waiting-list entry.
    pub async fn cancel_booking(
        &self,
        park: &ParkSettings,
        booking_id: &str,
    ) -> Result<CancelOutcome, CapacityError> {
        let msg = QueryMessage::delete(park.active_table())
            .where_eq(columns::BOOKING_ID, booking_id)?
            .filter(Condition::is_null(columns::ENTRY_TIME))?
            .guarded(GuardTag::Advisory(booking_id.to_string()))?
            .build()?;
        match self.locked(msg).await? {
            LockOutcome::Acquired => return Ok(CancelOutcome::Cancelled),
            LockOutcome::HeldByOther => return Ok(CancelOutcome::AlreadyBeingProcessed),
            LockOutcome::NotHeldOperationFailed => {}
        }

        let entry = self.waiting_entry(park, booking_id).await?;
        let msg = QueryMessage::delete(park.waiting_table())
            .where_eq(columns::BOOKING_ID, booking_id)?
            .guarded(GuardTag::Advisory(booking_id.to_string()))?
            .build()?;
        match self.locked(msg).await? {
            LockOutcome::Acquired => {}
            LockOutcome::HeldByOther => return Ok(CancelOutcome::AlreadyBeingProcessed),
            LockOutcome::NotHeldOperationFailed => return Ok(CancelOutcome::NotFound),
        }
        if let Some((visit_time, priority)) = entry {
            self.close_waitlist_gap(park, visit_time, priority).await?;
        }
        Ok(CancelOutcome::LeftWaitlist)
    }

    /// `(visitTime, priority)` of a waiting-list entry.
    async fn waiting_entry(
        &self,
        park: &ParkSettings,
        booking_id: &str,
    ) -> Result<Option<(DateTime<Utc>, i64)>, CapacityError> {
        let msg = QueryMessage::select(park.waiting_table())
            .columns([columns::VISIT_TIME, columns::PRIORITY])?
            .where_eq(columns::BOOKING_ID, booking_id)?
            .build()?;
        let reply = self.read(msg).await?;
        let Some(row) = reply.result_rows().first() else {
            return Ok(None);
        };
        let visit_time = row
            .first()
            .and_then(Value::as_i64)
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single());
        let priority = row.get(1).and_then(Value::as_i64);
        match (visit_time, priority) {
            (Some(visit_time), Some(priority)) => Ok(Some((visit_time, priority))),
            _ => Err(CapacityError::Malformed("waiting-list row without visitTime/priority".into())),
        }
    }

    /// Move every entry ranked behind `removed` in the window up by one, so
    /// the next joiner's `count + 1` priority is not already taken.
    async fn close_waitlist_gap(
        &self,
        park: &ParkSettings,
        visit_time: DateTime<Utc>,
        removed: i64,
    ) -> Result<(), CapacityError> {
        let msg = QueryMessage::select(park.waiting_table())
            .columns([columns::BOOKING_ID, columns::PRIORITY])?
            .where_predicate(park.overlap_window(visit_time))?
            .filter(Condition::new(columns::PRIORITY, CompareOp::Gt, removed))?
            .build()?;
        let behind = self.read(msg).await?;
        let mut moved = 0;
        for row in behind.result_rows() {
            let (Some(booking_id), Some(priority)) = (
                row.first().and_then(Value::as_str),
                row.get(1).and_then(Value::as_i64),
            ) else {
                continue;
            };
            let msg = QueryMessage::update(park.waiting_table())
                .set(columns::PRIORITY, priority - 1)?
                .where_eq(columns::BOOKING_ID, booking_id)?
                .where_eq(columns::PRIORITY, priority)?
                .guarded(GuardTag::Critical(park.park_id))?
                .build()?;
            let reply = self.run(msg).await?;
            match classify(&reply) {
                Outcome::Success => moved += 1,
                // Left or re-ranked since the read.
                Outcome::GuardDenied(_) => {}
                Outcome::ServerRejected(reason) => return Err(rejected(reason)),
            }
        }
        debug!(park = %park.name, removed = removed, moved = moved, "Waiting list re-ranked");
        Ok(())
    }

    // =========================================================================
    // GATE
    // =========================================================================

    pub async fn record_entry(
        &self,
        park: &ParkSettings,
        booking_id: &str,
    ) -> Result<GateOutcome, CapacityError> {
        self.record_gate(park, booking_id, Gate::Entry).await
    }

    pub async fn record_exit(
        &self,
        park: &ParkSettings,
        booking_id: &str,
    ) -> Result<GateOutcome, CapacityError> {
        self.record_gate(park, booking_id, Gate::Exit).await
    }

    async fn record_gate(
        &self,
        park: &ParkSettings,
        booking_id: &str,
        gate: Gate,
    ) -> Result<GateOutcome, CapacityError> {
        let Some(visitors) = self.booking_visitors(park, booking_id).await? else {
            return Ok(GateOutcome::NotFound);
        };

        let now = Utc::now().timestamp();
        let builder = QueryMessage::update(park.active_table())
            .set(gate.column(), now)?
            .where_eq(columns::BOOKING_ID, booking_id)?;
        let (builder, delta) = match gate {
            Gate::Entry => (builder.filter(Condition::is_null(columns::ENTRY_TIME))?, visitors),
            Gate::Exit => (
                builder
                    .filter(Condition::not_null(columns::ENTRY_TIME))?
                    .filter(Condition::is_null(columns::EXIT_TIME))?,
                -visitors,
            ),
        };
        let msg = builder
            .guarded(GuardTag::Advisory(booking_id.to_string()))?
            .build()?;

        match self.locked(msg).await? {
            LockOutcome::HeldByOther => {
                info!(booking_id = %booking_id, "Booking already being processed");
                Ok(GateOutcome::AlreadyBeingProcessed)
            }
            LockOutcome::NotHeldOperationFailed => Ok(GateOutcome::AlreadyProcessed),
            LockOutcome::Acquired => match self.adjust_occupancy(park, delta).await {
                Ok(occupancy) => {
                    info!(
                        park = %park.name,
                        booking_id = %booking_id,
                        gate = ?gate,
                        occupancy = occupancy,
                        "Gate event recorded"
                    );
                    Ok(GateOutcome::Processed { occupancy })
                }
                Err(err) => {
                    self.clear_stamp(park, booking_id, gate, now).await;
                    match err {
                        CapacityError::OccupancyOutOfRange { observed, .. } if gate == Gate::Entry => {
                            info!(
                                park = %park.name,
                                booking_id = %booking_id,
                                occupancy = observed,
                                requested = visitors,
                                "Entry refused, park full"
                            );
                            Ok(GateOutcome::ParkFull { occupancy: observed })
                        }
                        err => Err(err),
                    }
                }
            },
        }
    }

    /// Undo a gate stamp whose occupancy change failed.
    async fn clear_stamp(&self, park: &ParkSettings, booking_id: &str, gate: Gate, stamped: i64) {
        let cleared = match unstamp_message(park, booking_id, gate, stamped) {
            Ok(msg) => self.locked(msg).await,
            Err(e) => Err(e),
        };
        match cleared {
            Ok(LockOutcome::Acquired) => {
                debug!(booking_id = %booking_id, gate = ?gate, "Gate stamp cleared");
            }
            Ok(outcome) => {
                error!(booking_id = %booking_id, gate = ?gate, outcome = ?outcome, "Gate stamp left without occupancy change");
            }
            Err(e) => {
                error!(booking_id = %booking_id, gate = ?gate, error = %e, "Gate stamp left without occupancy change");
            }
        }
    }

    /// Execute an advisory-locked write and read its tri-state outcome.
    ///
    /// A store error while the lock was free is a rejection, not a
    /// "nothing matched".
    async fn locked(&self, msg: QueryMessage) -> Result<LockOutcome, CapacityError> {
        let reply = self.run(msg).await?;
        if let Some(reason) = &reply.result().error {
            return Err(CapacityError::ServerRejected(reason.clone()));
        }
        Ok(lock_outcome(&reply))
    }

    async fn booking_visitors(
        &self,
        park: &ParkSettings,
        booking_id: &str,
    ) -> Result<Option<i64>, CapacityError> {
        let msg = QueryMessage::select(park.active_table())
            .column(columns::NUMBER_OF_VISITORS)?
            .where_eq(columns::BOOKING_ID, booking_id)?
            .build()?;
        let reply = self.read(msg).await?;
        Ok(scalar_i64(&reply))
    }

    /// Add `delta` to `currentCapacity` by compare-and-swap. Returns the new
    /// value, or `OccupancyOutOfRange` if it would leave `0..=maximumVisitors`.
    async fn adjust_occupancy(&self, park: &ParkSettings, delta: i64) -> Result<i64, CapacityError> {
        let reply = retry_on_denial(&self.retry, move |attempt| {
            self.occupancy_cas(park, delta, attempt)
        })
            .await?;
        match classify(&reply) {
            Outcome::Success => reply
                .assignments()
                .first()
                .and_then(|a| a.value.as_i64())
                .ok_or_else(|| CapacityError::Malformed("occupancy update lost its value".into())),
            Outcome::GuardDenied(_) => {
                warn!(park = %park.name, attempts = self.retry.max_attempts, "Occupancy update kept conflicting");
                Err(CapacityError::Contended {
                    attempts: self.retry.max_attempts,
                })
            }
            Outcome::ServerRejected(reason) => Err(rejected(reason)),
        }
    }

    async fn occupancy_cas(
        &self,
        park: &ParkSettings,
        delta: i64,
        attempt: u32,
    ) -> Result<QueryMessage, CapacityError> {
        let observed = self.current_occupancy(park).await?;
        let target = observed.saturating_add(delta);
        if !(0..=park.maximum_visitors).contains(&target) {
            return Err(CapacityError::OccupancyOutOfRange { observed, delta });
        }
        let msg = QueryMessage::update(PARK_TABLE)
            .set(columns::CURRENT_CAPACITY, target)?
            .where_eq(columns::PARK_ID, park.park_id)?
            .where_eq(columns::CURRENT_CAPACITY, observed)?
            .guarded(GuardTag::Critical(park.park_id))?
            .build()?;
        debug!(park = %park.name, observed = observed, target = target, attempt = attempt, "Occupancy CAS");
        self.run(msg).await
    }
}

fn booking_row(
    builder: QueryMessageBuilder,
    request: &BookingRequest,
) -> Result<QueryMessageBuilder, CapacityError> {
    Ok(builder
        .set(columns::BOOKING_ID, request.booking_id.as_str())?
        .set(columns::VISIT_TIME, request.visit_time.timestamp())?
        .set(columns::NUMBER_OF_VISITORS, request.visitors)?)
}

fn unstamp_message(
    park: &ParkSettings,
    booking_id: &str,
    gate: Gate,
    stamped: i64,
) -> Result<QueryMessage, CapacityError> {
    Ok(QueryMessage::update(park.active_table())
        .set(gate.column(), Value::Null)?
        .where_eq(columns::BOOKING_ID, booking_id)?
        .filter(Condition::eq(gate.column(), stamped))?
        .guarded(GuardTag::Advisory(booking_id.to_string()))?
        .build()?)
}

fn scalar_i64(reply: &QueryMessage) -> Option<i64> {
    reply.scalar().and_then(Value::as_i64)
}

fn rejected(reason: Option<String>) -> CapacityError {
    CapacityError::ServerRejected(reason.unwrap_or_else(|| "operation failed".into()))
}
