//! # QueryMessage
//!
//! The typed request/response envelope. One instance describes exactly one
//! store operation and, once answered, carries that operation's result.
//!
//! ## Lifecycle
//!
//! ```text
//! builder ──build()──→ QueryMessage ──stamp(id)──→ on the wire
//!                                                     │
//!            caller ←──merge_response()── reply ──────┘
//! ```
//!
//! Field groups are write-once: the builder owns the request fields, the
//! transport owns the correlation id, the store owns the result.

use crate::correlation::CorrelationId;
use crate::errors::ProtocolMisuseError;
use crate::value::{
    Aggregate, Assignment, CompareOp, Condition, Connective, Predicate, Row, SelectColumn, Value,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// KINDS
// =============================================================================

/// Sub-kind of a `QUERY_REQUEST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl QueryKind {
    pub fn is_mutation(self) -> bool {
        !matches!(self, QueryKind::Select)
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryKind::Select => "SELECT",
            QueryKind::Insert => "INSERT",
            QueryKind::Update => "UPDATE",
            QueryKind::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// Sub-kind of a `CLIENT_SERVER_MESSAGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Connect,
    /// Fire-and-forget; the server never answers it.
    Disconnect,
    Ping,
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControlKind::Connect => "CONNECT",
            ControlKind::Disconnect => "DISCONNECT",
            ControlKind::Ping => "PING",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    QueryRequest(QueryKind),
    ClientServer(ControlKind),
    /// Server-pushed, uncorrelated.
    Notification,
}

impl MessageKind {
    /// Whether a reply carrying the same correlation id is expected.
    pub fn expects_response(self) -> bool {
        match self {
            MessageKind::QueryRequest(_) => true,
            MessageKind::ClientServer(ControlKind::Disconnect) => false,
            MessageKind::ClientServer(_) => true,
            MessageKind::Notification => false,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::QueryRequest(k) => write!(f, "QUERY_REQUEST/{}", k),
            MessageKind::ClientServer(k) => write!(f, "CLIENT_SERVER_MESSAGE/{}", k),
            MessageKind::Notification => f.write_str("NOTIFICATION"),
        }
    }
}

// =============================================================================
// GUARD PAYLOADS
// =============================================================================

/// Store's verdict on the guard attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GuardOutcome {
    /// Critical section entered / advisory lock acquired; the write ran.
    Granted,
    /// Critical section entered but the guarded condition no longer held.
    Conflict,
    /// Advisory lock is held by another session.
    LockHeld,
    /// Lock was free, but the guarded operation itself failed.
    LockFreeOperationFailed,
}

/// Admit the write only if `sum(sum_column over scope) + adding <= limit`.
///
/// Evaluated by the store inside the critical section of the request's
/// resource index, against the request's first table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityBound {
    pub sum_column: String,
    pub scope: Predicate,
    pub limit: i64,
    pub adding: i64,
}

/// Assign `column = count(rows matching scope) + 1` atomically on INSERT.
///
/// The assigned rank is returned as the single result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankAssignment {
    pub column: String,
    pub scope: Predicate,
}

// =============================================================================
// RESULT
// =============================================================================

/// Result fields written by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// SELECT rows, or the assigned rank for ranked INSERTs.
    pub rows: Vec<Row>,
    pub success: bool,
    pub affected_rows: u64,
    pub guard_outcome: Option<GuardOutcome>,
    /// Informational only.
    pub error: Option<String>,
}

impl QueryResult {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            success: true,
            ..Self::default()
        }
    }

    pub fn affected(affected_rows: u64) -> Self {
        Self {
            success: affected_rows > 0,
            affected_rows,
            ..Self::default()
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn denied(outcome: GuardOutcome) -> Self {
        Self {
            guard_outcome: Some(outcome),
            ..Self::default()
        }
    }

    pub fn with_guard(mut self, outcome: GuardOutcome) -> Self {
        self.guard_outcome = Some(outcome);
        self
    }
}

// =============================================================================
// MESSAGE
// =============================================================================

/// One store operation plus its correlation id and result slot.
///
/// Equality is correlation identity: two messages are equal iff both are
/// stamped with the same id. Unstamped messages are never equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "WireMessage", try_from = "WireMessage")]
pub struct QueryMessage {
    kind: MessageKind,
    tables: Vec<String>,
    select_columns: Vec<SelectColumn>,
    filter: Predicate,
    assignments: Vec<Assignment>,
    rank: Option<RankAssignment>,
    capacity_bound: Option<CapacityBound>,
    critical_resource_index: Option<u32>,
    advisory_lock_key: Option<String>,
    correlation_id: Option<CorrelationId>,
    notice: Option<String>,
    result: QueryResult,
}

impl PartialEq for QueryMessage {
    fn eq(&self, other: &Self) -> bool {
        self.correlation_id.is_some() && self.correlation_id == other.correlation_id
    }
}

impl QueryMessage {
    pub fn builder() -> QueryMessageBuilder {
        QueryMessageBuilder::default()
    }

    pub fn select(table: impl Into<String>) -> QueryMessageBuilder {
        QueryMessageBuilder::declared(QueryKind::Select).table(table)
    }

    pub fn insert(table: impl Into<String>) -> QueryMessageBuilder {
        QueryMessageBuilder::declared(QueryKind::Insert).table(table)
    }

    pub fn update(table: impl Into<String>) -> QueryMessageBuilder {
        QueryMessageBuilder::declared(QueryKind::Update).table(table)
    }

    pub fn delete(table: impl Into<String>) -> QueryMessageBuilder {
        QueryMessageBuilder::declared(QueryKind::Delete).table(table)
    }

    pub fn control(kind: ControlKind) -> Self {
        Self::bare(MessageKind::ClientServer(kind))
    }

    pub fn notification(notice: impl Into<String>) -> Self {
        let mut msg = Self::bare(MessageKind::Notification);
        msg.notice = Some(notice.into());
        msg
    }

    fn bare(kind: MessageKind) -> Self {
        Self {
            kind,
            tables: Vec::new(),
            select_columns: Vec::new(),
            filter: Predicate::default(),
            assignments: Vec::new(),
            rank: None,
            capacity_bound: None,
            critical_resource_index: None,
            advisory_lock_key: None,
            correlation_id: None,
            notice: None,
            result: QueryResult::default(),
        }
    }

    // -------------------------------------------------------------------------
    // Request fields
    // -------------------------------------------------------------------------

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn query_kind(&self) -> Option<QueryKind> {
        match self.kind {
            MessageKind::QueryRequest(k) => Some(k),
            _ => None,
        }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// First (and in practice only) target table.
    pub fn table(&self) -> Option<&str> {
        self.tables.first().map(String::as_str)
    }

    pub fn select_columns(&self) -> &[SelectColumn] {
        &self.select_columns
    }

    pub fn filter(&self) -> &Predicate {
        &self.filter
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn rank(&self) -> Option<&RankAssignment> {
        self.rank.as_ref()
    }

    pub fn capacity_bound(&self) -> Option<&CapacityBound> {
        self.capacity_bound.as_ref()
    }

    pub fn critical_resource_index(&self) -> Option<u32> {
        self.critical_resource_index
    }

    pub fn advisory_lock_key(&self) -> Option<&str> {
        self.advisory_lock_key.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    // -------------------------------------------------------------------------
    // Correlation
    // -------------------------------------------------------------------------

    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }

    /// Stamp the correlation id. Called by the transport at send time only.
    pub fn stamp(&mut self, id: CorrelationId) {
        self.correlation_id = Some(id);
    }

    // -------------------------------------------------------------------------
    // Result fields
    // -------------------------------------------------------------------------

    pub fn result(&self) -> &QueryResult {
        &self.result
    }

    pub fn result_rows(&self) -> &[Row] {
        &self.result.rows
    }

    pub fn success(&self) -> bool {
        self.result.success
    }

    pub fn affected_rows(&self) -> u64 {
        self.result.affected_rows
    }

    pub fn guard_outcome(&self) -> Option<GuardOutcome> {
        self.result.guard_outcome
    }

    /// First cell of the first row; the shape of aggregate and rank replies.
    pub fn scalar(&self) -> Option<&Value> {
        self.result.rows.first().and_then(|row| row.first())
    }

    /// Turn a received request into its reply. Store side.
    pub fn into_reply(mut self, result: QueryResult) -> Self {
        self.result = result;
        self
    }

    /// Copy the result of `response` onto this request.
    ///
    /// The caller keeps its own instance; only the result group changes.
    pub fn merge_response(&mut self, response: QueryMessage) -> Result<(), ProtocolMisuseError> {
        match (self.correlation_id, response.correlation_id) {
            (Some(mine), Some(theirs)) if mine == theirs => {
                self.result = response.result;
                Ok(())
            }
            (mine, theirs) => Err(ProtocolMisuseError::CorrelationMismatch {
                request: mine.map_or_else(|| "<unstamped>".into(), |id| id.to_string()),
                response: theirs.map_or_else(|| "<unstamped>".into(), |id| id.to_string()),
            }),
        }
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Accumulates fields for exactly one query kind.
///
/// Kind-specific setters are fallible: setting a field before the kind is
/// declared, or one the declared kind does not accept, is a
/// [`ProtocolMisuseError`].
#[derive(Debug, Clone, Default)]
pub struct QueryMessageBuilder {
    kind: Option<QueryKind>,
    tables: Vec<String>,
    select_columns: Vec<SelectColumn>,
    filter: Predicate,
    assignments: Vec<Assignment>,
    rank: Option<RankAssignment>,
    capacity_bound: Option<CapacityBound>,
    critical_resource_index: Option<u32>,
    advisory_lock_key: Option<String>,
}

const FILTERABLE: &[QueryKind] = &[QueryKind::Select, QueryKind::Update, QueryKind::Delete];
const ASSIGNABLE: &[QueryKind] = &[QueryKind::Insert, QueryKind::Update];
const ANY_QUERY: &[QueryKind] = &[
    QueryKind::Select,
    QueryKind::Insert,
    QueryKind::Update,
    QueryKind::Delete,
];

impl QueryMessageBuilder {
    fn declared(kind: QueryKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Declare the query kind. Redeclaring the same kind is a no-op.
    pub fn kind(mut self, kind: QueryKind) -> Result<Self, ProtocolMisuseError> {
        match self.kind {
            Some(declared) if declared != kind => Err(ProtocolMisuseError::KindAlreadyDeclared {
                declared: declared.to_string(),
                requested: kind.to_string(),
            }),
            _ => {
                self.kind = Some(kind);
                Ok(self)
            }
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.tables.push(table.into());
        self
    }

    fn require(&self, field: &'static str, allowed: &[QueryKind]) -> Result<(), ProtocolMisuseError> {
        match self.kind {
            None => Err(ProtocolMisuseError::KindNotDeclared { field }),
            Some(kind) if !allowed.contains(&kind) => Err(ProtocolMisuseError::IncompatibleField {
                field,
                kind: kind.to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    pub fn column(self, column: impl Into<String>) -> Result<Self, ProtocolMisuseError> {
        self.select_column(SelectColumn::plain(column))
    }

    pub fn columns<I, S>(mut self, columns: I) -> Result<Self, ProtocolMisuseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            self = self.column(column)?;
        }
        Ok(self)
    }

    /// Add a select column, optionally aggregated.
    pub fn select_column(mut self, column: SelectColumn) -> Result<Self, ProtocolMisuseError> {
        self.require("selectColumns", &[QueryKind::Select])?;
        self.select_columns.push(column);
        Ok(self)
    }

    /// `SUM(column)`, `MAX(column)` or `COUNT(column)`.
    pub fn aggregate(
        self,
        aggregate: Aggregate,
        column: impl Into<String>,
    ) -> Result<Self, ProtocolMisuseError> {
        self.select_column(SelectColumn {
            column: column.into(),
            aggregate: Some(aggregate),
        })
    }

    pub fn set(
        mut self,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, ProtocolMisuseError> {
        self.require("setColumns", ASSIGNABLE)?;
        self.assignments.push(Assignment {
            column: column.into(),
            value: value.into(),
        });
        Ok(self)
    }

    /// Add a condition, AND-ed onto any existing ones.
    pub fn filter(self, condition: Condition) -> Result<Self, ProtocolMisuseError> {
        self.push_condition(Connective::And, condition)
    }

    pub fn where_eq(
        self,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, ProtocolMisuseError> {
        self.filter(Condition::new(column, CompareOp::Eq, value))
    }

    pub fn or(self, condition: Condition) -> Result<Self, ProtocolMisuseError> {
        self.push_condition(Connective::Or, condition)
    }

    fn push_condition(
        mut self,
        connective: Connective,
        condition: Condition,
    ) -> Result<Self, ProtocolMisuseError> {
        self.require("whereConditions", FILTERABLE)?;
        self.filter = std::mem::take(&mut self.filter).push(connective, condition);
        Ok(self)
    }

    /// Replace the whole where clause.
    pub fn where_predicate(mut self, predicate: Predicate) -> Result<Self, ProtocolMisuseError> {
        self.require("whereConditions", FILTERABLE)?;
        self.filter = predicate;
        Ok(self)
    }

    pub fn rank_column(
        mut self,
        column: impl Into<String>,
        scope: Predicate,
    ) -> Result<Self, ProtocolMisuseError> {
        self.require("rankColumn", &[QueryKind::Insert])?;
        self.rank = Some(RankAssignment {
            column: column.into(),
            scope,
        });
        Ok(self)
    }

    pub fn capacity_bound(mut self, bound: CapacityBound) -> Result<Self, ProtocolMisuseError> {
        self.require("capacityBound", ASSIGNABLE)?;
        self.capacity_bound = Some(bound);
        Ok(self)
    }

    /// Ask the store to serialize this request against all others with `index`.
    pub fn critical_resource(mut self, index: u32) -> Result<Self, ProtocolMisuseError> {
        self.require("criticalResourceIndex", ANY_QUERY)?;
        self.critical_resource_index = Some(index);
        Ok(self)
    }

    /// Ask the store to take the named advisory lock for this request.
    pub fn advisory_lock(mut self, key: impl Into<String>) -> Result<Self, ProtocolMisuseError> {
        self.require("advisoryLockKey", ANY_QUERY)?;
        self.advisory_lock_key = Some(key.into());
        Ok(self)
    }

    pub fn build(self) -> Result<QueryMessage, ProtocolMisuseError> {
        let kind = self
            .kind
            .ok_or(ProtocolMisuseError::Incomplete("query kind not declared"))?;
        if self.tables.is_empty() {
            return Err(ProtocolMisuseError::Incomplete("no target table"));
        }
        if kind.is_mutation() && kind != QueryKind::Delete && self.assignments.is_empty() {
            return Err(ProtocolMisuseError::Incomplete("no column assignments"));
        }
        if self.capacity_bound.is_some() && self.critical_resource_index.is_none() {
            return Err(ProtocolMisuseError::Incomplete(
                "capacity bound requires a critical resource index",
            ));
        }
        if self.rank.is_some() && self.critical_resource_index.is_none() {
            return Err(ProtocolMisuseError::Incomplete(
                "rank assignment requires a critical resource index",
            ));
        }
        let mut msg = QueryMessage::bare(MessageKind::QueryRequest(kind));
        msg.tables = self.tables;
        msg.select_columns = self.select_columns;
        msg.filter = self.filter;
        msg.assignments = self.assignments;
        msg.rank = self.rank;
        msg.capacity_bound = self.capacity_bound;
        msg.critical_resource_index = self.critical_resource_index;
        msg.advisory_lock_key = self.advisory_lock_key;
        Ok(msg)
    }
}

// =============================================================================
// WIRE SCHEMA
// =============================================================================
//
// Field presence, not order, carries meaning. Optional groups are omitted
// when empty and unknown fields are ignored on read.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum WireKind {
    QueryRequest,
    ClientServerMessage,
    Notification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum WireSubKind {
    Select,
    Insert,
    Update,
    Delete,
    Connect,
    Disconnect,
    Ping,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    kind: WireKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_kind: Option<WireSubKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tables: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    select_columns: Vec<SelectColumn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    where_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    where_operators: Vec<CompareOp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    where_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    where_connectives: Vec<Connective>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    set_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    set_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rank: Option<RankAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    capacity_bound: Option<CapacityBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    critical_resource_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    advisory_lock_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<CorrelationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notice: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    result_rows: Vec<Row>,
    #[serde(default)]
    success: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    affected_rows: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    guard_outcome: Option<GuardOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl From<QueryMessage> for WireMessage {
    fn from(msg: QueryMessage) -> Self {
        let (kind, sub_kind) = match msg.kind {
            MessageKind::QueryRequest(k) => (
                WireKind::QueryRequest,
                Some(match k {
                    QueryKind::Select => WireSubKind::Select,
                    QueryKind::Insert => WireSubKind::Insert,
                    QueryKind::Update => WireSubKind::Update,
                    QueryKind::Delete => WireSubKind::Delete,
                }),
            ),
            MessageKind::ClientServer(k) => (
                WireKind::ClientServerMessage,
                Some(match k {
                    ControlKind::Connect => WireSubKind::Connect,
                    ControlKind::Disconnect => WireSubKind::Disconnect,
                    ControlKind::Ping => WireSubKind::Ping,
                }),
            ),
            MessageKind::Notification => (WireKind::Notification, None),
        };
        let (where_columns, where_operators, where_values, where_connectives) =
            msg.filter.into_parts();
        let (set_columns, set_values) = msg
            .assignments
            .into_iter()
            .map(|a| (a.column, a.value))
            .unzip();
        Self {
            kind,
            sub_kind,
            tables: msg.tables,
            select_columns: msg.select_columns,
            where_columns,
            where_operators,
            where_values,
            where_connectives,
            set_columns,
            set_values,
            rank: msg.rank,
            capacity_bound: msg.capacity_bound,
            critical_resource_index: msg.critical_resource_index,
            advisory_lock_key: msg.advisory_lock_key,
            correlation_id: msg.correlation_id,
            notice: msg.notice,
            result_rows: msg.result.rows,
            success: msg.result.success,
            affected_rows: msg.result.affected_rows,
            guard_outcome: msg.result.guard_outcome,
            error: msg.result.error,
        }
    }
}

impl TryFrom<WireMessage> for QueryMessage {
    type Error = String;

    fn try_from(w: WireMessage) -> Result<Self, Self::Error> {
        let kind = match (w.kind, w.sub_kind) {
            (WireKind::QueryRequest, Some(sub)) => MessageKind::QueryRequest(match sub {
                WireSubKind::Select => QueryKind::Select,
                WireSubKind::Insert => QueryKind::Insert,
                WireSubKind::Update => QueryKind::Update,
                WireSubKind::Delete => QueryKind::Delete,
                other => return Err(format!("{:?} is not a query sub-kind", other)),
            }),
            (WireKind::ClientServerMessage, Some(sub)) => MessageKind::ClientServer(match sub {
                WireSubKind::Connect => ControlKind::Connect,
                WireSubKind::Disconnect => ControlKind::Disconnect,
                WireSubKind::Ping => ControlKind::Ping,
                other => return Err(format!("{:?} is not a control sub-kind", other)),
            }),
            (WireKind::Notification, _) => MessageKind::Notification,
            (kind, None) => return Err(format!("{:?} requires a subKind", kind)),
        };
        let filter = Predicate::from_parts(
            w.where_columns,
            w.where_operators,
            w.where_values,
            w.where_connectives,
        )?;
        if w.set_columns.len() != w.set_values.len() {
            return Err(format!(
                "{} set columns but {} set values",
                w.set_columns.len(),
                w.set_values.len()
            ));
        }
        let assignments = w
            .set_columns
            .into_iter()
            .zip(w.set_values)
            .map(|(column, value)| Assignment { column, value })
            .collect();
        Ok(Self {
            kind,
            tables: w.tables,
            select_columns: w.select_columns,
            filter,
            assignments,
            rank: w.rank,
            capacity_bound: w.capacity_bound,
            critical_resource_index: w.critical_resource_index,
            advisory_lock_key: w.advisory_lock_key,
            correlation_id: w.correlation_id,
            notice: w.notice,
            result: QueryResult {
                rows: w.result_rows,
                success: w.success,
                affected_rows: w.affected_rows,
                guard_outcome: w.guard_outcome,
                error: w.error,
            },
        })
    }
}
