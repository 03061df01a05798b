//! Structured query payloads.
//!
//! Column names, operators and bound values are carried separately so a
//! predicate or assignment list can be reconstructed by the store without
//! string concatenation on the client.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A bound value (column value, predicate operand, result cell).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view; floats are truncated, text is parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// SQL-style ordering. `Null` is incomparable with everything.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One result tuple, ordered as the select columns.
pub type Row = Vec<Value>;

/// Comparison placed between a column and its bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    NotNull,
}

/// Boolean operator placed between two conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connective {
    And,
    Or,
}

/// `column <op> value`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Eq, value)
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::new(column, CompareOp::IsNull, Value::Null)
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Self::new(column, CompareOp::NotNull, Value::Null)
    }

    /// Evaluate against a row; `lookup` resolves a column to its value.
    pub fn matches<'a>(&self, lookup: impl Fn(&str) -> Option<&'a Value>) -> bool {
        let actual = lookup(&self.column);
        let ordering = || actual.and_then(|v| v.compare(&self.value));
        match self.op {
            CompareOp::IsNull => actual.map_or(true, Value::is_null),
            CompareOp::NotNull => actual.is_some_and(|v| !v.is_null()),
            CompareOp::Eq => ordering() == Some(Ordering::Equal),
            CompareOp::Ne => matches!(ordering(), Some(Ordering::Less | Ordering::Greater)),
            CompareOp::Lt => ordering() == Some(Ordering::Less),
            CompareOp::Le => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            CompareOp::Gt => ordering() == Some(Ordering::Greater),
            CompareOp::Ge => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

/// Conditions joined by connectives; `connectives.len() == conditions.len() - 1`.
///
/// AND binds tighter than OR. An empty predicate matches every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "WirePredicate", try_from = "WirePredicate")]
pub struct Predicate {
    conditions: Vec<Condition>,
    connectives: Vec<Connective>,
}

impl Predicate {
    pub fn new(first: Condition) -> Self {
        Self {
            conditions: vec![first],
            connectives: Vec::new(),
        }
    }

    pub fn and(self, next: Condition) -> Self {
        self.push(Connective::And, next)
    }

    pub fn or(self, next: Condition) -> Self {
        self.push(Connective::Or, next)
    }

    /// Append a condition; the connective is dropped for the first one.
    pub fn push(mut self, connective: Connective, next: Condition) -> Self {
        if !self.conditions.is_empty() {
            self.connectives.push(connective);
        }
        self.conditions.push(next);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn connectives(&self) -> &[Connective] {
        &self.connectives
    }

    pub fn matches<'a>(&self, lookup: impl Fn(&str) -> Option<&'a Value> + Copy) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        // Disjunction of AND-groups.
        let mut group = self.conditions[0].matches(lookup);
        for (connective, condition) in self.connectives.iter().zip(&self.conditions[1..]) {
            match connective {
                Connective::And => group = group && condition.matches(lookup),
                Connective::Or => {
                    if group {
                        return true;
                    }
                    group = condition.matches(lookup);
                }
            }
        }
        group
    }

    /// Rebuild from parallel wire arrays. Absent connectives mean all AND.
    pub fn from_parts(
        columns: Vec<String>,
        operators: Vec<CompareOp>,
        values: Vec<Value>,
        connectives: Vec<Connective>,
    ) -> Result<Self, String> {
        if columns.len() != operators.len() || columns.len() != values.len() {
            return Err(format!(
                "predicate arrays differ in length: {} columns, {} operators, {} values",
                columns.len(),
                operators.len(),
                values.len()
            ));
        }
        let expected = columns.len().saturating_sub(1);
        let connectives = if connectives.is_empty() {
            vec![Connective::And; expected]
        } else if connectives.len() == expected {
            connectives
        } else {
            return Err(format!(
                "expected {} connectives for {} conditions, got {}",
                expected,
                columns.len(),
                connectives.len()
            ));
        };
        let conditions = columns
            .into_iter()
            .zip(operators)
            .zip(values)
            .map(|((column, op), value)| Condition { column, op, value })
            .collect();
        Ok(Self {
            conditions,
            connectives,
        })
    }

    /// Split into parallel wire arrays.
    pub fn into_parts(self) -> (Vec<String>, Vec<CompareOp>, Vec<Value>, Vec<Connective>) {
        let mut columns = Vec::with_capacity(self.conditions.len());
        let mut operators = Vec::with_capacity(self.conditions.len());
        let mut values = Vec::with_capacity(self.conditions.len());
        for c in self.conditions {
            columns.push(c.column);
            operators.push(c.op);
            values.push(c.value);
        }
        (columns, operators, values, self.connectives)
    }
}

impl From<Condition> for Predicate {
    fn from(condition: Condition) -> Self {
        Predicate::new(condition)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePredicate {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    operators: Vec<CompareOp>,
    #[serde(default)]
    values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    connectives: Vec<Connective>,
}

impl From<Predicate> for WirePredicate {
    fn from(p: Predicate) -> Self {
        let (columns, operators, values, connectives) = p.into_parts();
        Self {
            columns,
            operators,
            values,
            connectives,
        }
    }
}

impl TryFrom<WirePredicate> for Predicate {
    type Error = String;

    fn try_from(w: WirePredicate) -> Result<Self, Self::Error> {
        Predicate::from_parts(w.columns, w.operators, w.values, w.connectives)
    }
}

/// Aggregate applied to a select column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Aggregate {
    Count,
    Sum,
    Max,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectColumn {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
}

impl SelectColumn {
    pub fn plain(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            aggregate: None,
        }
    }

    pub fn sum(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            aggregate: Some(Aggregate::Sum),
        }
    }

    pub fn max(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            aggregate: Some(Aggregate::Max),
        }
    }

    /// `COUNT(*)`
    pub fn count() -> Self {
        Self {
            column: "*".to_string(),
            aggregate: Some(Aggregate::Count),
        }
    }
}

/// `column = value` for INSERT and UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Value,
}
