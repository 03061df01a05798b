//! In-memory tables.
//!
//! Every operation, including the conditional parts of a guarded write
//! (capacity bound, rank assignment), runs under one store-wide lock, so a
//! single request is atomic with respect to every other request.

use crate::errors::StoreError;
use gn_01_query_protocol::{
    Aggregate, CapacityBound, Predicate, QueryKind, QueryMessage, Row, SelectColumn, Value,
};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// One stored row, by column name.
pub type Record = BTreeMap<String, Value>;

/// What one operation did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Execution {
    pub rows: Vec<Row>,
    pub affected: u64,
    /// A capacity bound refused the write; nothing changed.
    pub bound_exceeded: bool,
}

#[derive(Default)]
pub struct TableStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the table already existed.
    pub fn create_table(&self, name: impl Into<String>) -> bool {
        let mut tables = self.tables.write();
        let name = name.into();
        if tables.contains_key(&name) {
            return false;
        }
        tables.insert(name, Vec::new());
        true
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    /// Insert a row directly, bypassing the query path.
    pub fn seed<I, K, V>(&self, table: &str, row: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut tables = self.tables.write();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        rows.push(row.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        Ok(())
    }

    /// Snapshot of a table's rows.
    pub fn rows(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        self.tables
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    pub fn execute(&self, msg: &QueryMessage) -> Result<Execution, StoreError> {
        let kind = msg
            .query_kind()
            .ok_or_else(|| StoreError::NotAQuery(msg.kind().to_string()))?;
        let table = msg.table().ok_or(StoreError::NoTable)?;
        trace!(kind = %kind, table = table, "Executing");

        if kind == QueryKind::Select {
            let tables = self.tables.read();
            let rows = tables
                .get(table)
                .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
            return Ok(Execution {
                rows: project(rows, msg.select_columns(), msg.filter())?,
                ..Execution::default()
            });
        }

        let mut tables = self.tables.write();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;

        if let Some(bound) = msg.capacity_bound() {
            if !within_bound(rows, bound)? {
                return Ok(Execution {
                    bound_exceeded: true,
                    ..Execution::default()
                });
            }
        }

        match kind {
            QueryKind::Insert => {
                let mut record: Record = msg
                    .assignments()
                    .iter()
                    .map(|a| (a.column.clone(), a.value.clone()))
                    .collect();
                let mut result_rows = Vec::new();
                if let Some(rank) = msg.rank() {
                    let assigned = Value::Int(count(rows, &rank.scope) as i64 + 1);
                    record.insert(rank.column.clone(), assigned.clone());
                    result_rows.push(vec![assigned]);
                }
                rows.push(record);
                Ok(Execution {
                    rows: result_rows,
                    affected: 1,
                    bound_exceeded: false,
                })
            }
            QueryKind::Update => {
                let mut affected = 0;
                for record in rows.iter_mut().filter(|r| matches(r, msg.filter())) {
                    for a in msg.assignments() {
                        record.insert(a.column.clone(), a.value.clone());
                    }
                    affected += 1;
                }
                Ok(Execution {
                    affected,
                    ..Execution::default()
                })
            }
            QueryKind::Delete => {
                let before = rows.len();
                rows.retain(|r| !matches(r, msg.filter()));
                Ok(Execution {
                    affected: (before - rows.len()) as u64,
                    ..Execution::default()
                })
            }
            QueryKind::Select => Ok(Execution::default()),
        }
    }
}

fn matches(record: &Record, predicate: &Predicate) -> bool {
    predicate.matches(|column: &str| record.get(column))
}

fn count(rows: &[Record], scope: &Predicate) -> usize {
    rows.iter().filter(|r| matches(r, scope)).count()
}

fn sum<'a>(rows: impl IntoIterator<Item = &'a Record>, column: &str) -> Result<i64, StoreError> {
    let mut total = 0i64;
    for record in rows {
        match record.get(column) {
            None | Some(Value::Null) => {}
            Some(v) => {
                let n = v.as_i64().ok_or_else(|| StoreError::NotNumeric {
                    column: column.to_string(),
                })?;
                total = total.saturating_add(n);
            }
        }
    }
    Ok(total)
}

fn within_bound(rows: &[Record], bound: &CapacityBound) -> Result<bool, StoreError> {
    let current = sum(rows.iter().filter(|r| matches(r, &bound.scope)), &bound.sum_column)?;
    Ok(current.saturating_add(bound.adding) <= bound.limit)
}

fn project(
    rows: &[Record],
    columns: &[SelectColumn],
    filter: &Predicate,
) -> Result<Vec<Row>, StoreError> {
    let matching: Vec<&Record> = rows.iter().filter(|r| matches(r, filter)).collect();
    let aggregated = columns.iter().filter(|c| c.aggregate.is_some()).count();

    if aggregated == 0 {
        return Ok(matching
            .into_iter()
            .map(|record| {
                if columns.is_empty() {
                    record.values().cloned().collect()
                } else {
                    columns
                        .iter()
                        .map(|c| record.get(&c.column).cloned().unwrap_or(Value::Null))
                        .collect()
                }
            })
            .collect());
    }
    if aggregated != columns.len() {
        return Err(StoreError::MixedAggregate);
    }

    let row = columns
        .iter()
        .map(|c| aggregate(&matching, c))
        .collect::<Result<Row, _>>()?;
    Ok(vec![row])
}

fn aggregate(rows: &[&Record], column: &SelectColumn) -> Result<Value, StoreError> {
    let name = column.column.as_str();
    match column.aggregate {
        Some(Aggregate::Count) => {
            let n = if name == "*" {
                rows.len()
            } else {
                rows.iter()
                    .filter(|r| r.get(name).is_some_and(|v| !v.is_null()))
                    .count()
            };
            Ok(Value::Int(n as i64))
        }
        // Sum over no rows is 0, not NULL.
        Some(Aggregate::Sum) => sum(rows.iter().copied(), name).map(Value::Int),
        Some(Aggregate::Max) => Ok(rows
            .iter()
            .filter_map(|r| r.get(name))
            .filter(|v| !v.is_null())
            .fold(None::<&Value>, |best, v| match best {
                Some(b) if b.compare(v) != Some(Ordering::Less) => Some(b),
                _ => Some(v),
            })
            .cloned()
            .unwrap_or(Value::Null)),
        None => Err(StoreError::MixedAggregate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gn_01_query_protocol::{CompareOp, Condition};

    fn store() -> TableStore {
        let store = TableStore::new();
        store.create_table("acadia_active");
        for (id, visitors, time) in [("1", 20, 100), ("2", 30, 200), ("3", 25, 900)] {
            store
                .seed(
                    "acadia_active",
                    [
                        ("bookingId", Value::from(id)),
                        ("numberOfVisitors", Value::from(visitors)),
                        ("visitTime", Value::from(time)),
                    ],
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_select_with_filter_and_projection() {
        let store = store();
        let msg = QueryMessage::select("acadia_active")
            .column("numberOfVisitors")
            .unwrap()
            .where_eq("bookingId", "2")
            .unwrap()
            .build()
            .unwrap();
        let exec = store.execute(&msg).unwrap();
        assert_eq!(exec.rows, vec![vec![Value::Int(30)]]);
    }

    #[test]
    fn test_sum_over_window() {
        let store = store();
        let msg = QueryMessage::select("acadia_active")
            .aggregate(Aggregate::Sum, "numberOfVisitors")
            .unwrap()
            .filter(Condition::new("visitTime", CompareOp::Ge, 50))
            .unwrap()
            .filter(Condition::new("visitTime", CompareOp::Le, 250))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(store.execute(&msg).unwrap().rows, vec![vec![Value::Int(50)]]);
    }

    #[test]
    fn test_aggregates_over_empty_set() {
        let store = store();
        let msg = QueryMessage::select("acadia_active")
            .select_column(SelectColumn::sum("numberOfVisitors"))
            .unwrap()
            .select_column(SelectColumn::count())
            .unwrap()
            .select_column(SelectColumn::max("visitTime"))
            .unwrap()
            .where_eq("bookingId", "nope")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            store.execute(&msg).unwrap().rows,
            vec![vec![Value::Int(0), Value::Int(0), Value::Null]]
        );
    }

    #[test]
    fn test_mixed_aggregate_rejected() {
        let store = store();
        let msg = QueryMessage::select("acadia_active")
            .select_column(SelectColumn::count())
            .unwrap()
            .column("bookingId")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(store.execute(&msg).unwrap_err(), StoreError::MixedAggregate);
    }

    #[test]
    fn test_capacity_bound_refuses_without_writing() {
        let store = store();
        let admit = |visitors: i64| {
            QueryMessage::insert("acadia_active")
                .set("bookingId", "4")
                .unwrap()
                .set("numberOfVisitors", visitors)
                .unwrap()
                .capacity_bound(CapacityBound {
                    sum_column: "numberOfVisitors".into(),
                    scope: Predicate::default(),
                    limit: 80,
                    adding: visitors,
                })
                .unwrap()
                .critical_resource(1)
                .unwrap()
                .build()
                .unwrap()
        };
        let refused = store.execute(&admit(10)).unwrap();
        assert!(refused.bound_exceeded);
        assert_eq!(store.rows("acadia_active").unwrap().len(), 3);

        let accepted = store.execute(&admit(5)).unwrap();
        assert_eq!(accepted.affected, 1);
        assert_eq!(store.rows("acadia_active").unwrap().len(), 4);
    }

    #[test]
    fn test_rank_assignment_counts_scope() {
        let store = TableStore::new();
        store.create_table("acadia_waiting");
        let join = |id: &str| {
            QueryMessage::insert("acadia_waiting")
                .set("bookingId", id)
                .unwrap()
                .rank_column("priority", Predicate::default())
                .unwrap()
                .critical_resource(1)
                .unwrap()
                .build()
                .unwrap()
        };
        assert_eq!(store.execute(&join("a")).unwrap().rows, vec![vec![Value::Int(1)]]);
        assert_eq!(store.execute(&join("b")).unwrap().rows, vec![vec![Value::Int(2)]]);
        let rows = store.rows("acadia_waiting").unwrap();
        assert_eq!(rows[1].get("priority"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_update_is_compare_and_swap() {
        let store = TableStore::new();
        store.create_table("park");
        store
            .seed("park", [("parkId", Value::from(1)), ("currentCapacity", Value::from(10))])
            .unwrap();
        let cas = |observed: i64| {
            QueryMessage::update("park")
                .set("currentCapacity", observed + 1)
                .unwrap()
                .where_eq("parkId", 1)
                .unwrap()
                .where_eq("currentCapacity", observed)
                .unwrap()
                .build()
                .unwrap()
        };
        assert_eq!(store.execute(&cas(10)).unwrap().affected, 1);
        assert_eq!(store.execute(&cas(10)).unwrap().affected, 0);
        assert_eq!(store.execute(&cas(11)).unwrap().affected, 1);
    }

    #[test]
    fn test_delete_and_unknown_table() {
        let store = store();
        let msg = QueryMessage::delete("acadia_active")
            .where_eq("bookingId", "1")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(store.execute(&msg).unwrap().affected, 1);

        let msg = QueryMessage::select("zion_active").build().unwrap();
        assert_eq!(
            store.execute(&msg).unwrap_err(),
            StoreError::UnknownTable("zion_active".into())
        );
    }
}
