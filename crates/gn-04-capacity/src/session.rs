//! User roles and session teardown.

use crate::errors::CapacityError;
use gn_01_query_protocol::QueryMessage;
use gn_02_transport::QueryExecutor;
use gn_03_concurrency_guard::{classify, Outcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

pub const LOGGED_IN_COLUMN: &str = "isLoggedIn";

/// Who is signed in at a station. Each role lives in its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Visitor,
    GroupGuide,
    Employee,
    ParkManager,
    DepartmentManager,
}

impl UserRole {
    pub fn resource_table(self) -> &'static str {
        match self {
            UserRole::Visitor => "visitor",
            UserRole::GroupGuide => "group_guide",
            UserRole::Employee => "employee",
            UserRole::ParkManager => "park_manager",
            UserRole::DepartmentManager => "department_manager",
        }
    }

    pub fn id_column(self) -> &'static str {
        match self {
            UserRole::Visitor => "visitorId",
            UserRole::GroupGuide => "guideId",
            UserRole::Employee => "employeeId",
            UserRole::ParkManager | UserRole::DepartmentManager => "managerId",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_table())
    }
}

pub struct SessionService {
    executor: Arc<dyn QueryExecutor>,
}

impl SessionService {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Clear the logged-in flag. `false` when no such user exists.
    pub async fn logout(&self, role: UserRole, user_id: &str) -> Result<bool, CapacityError> {
        let msg = QueryMessage::update(role.resource_table())
            .set(LOGGED_IN_COLUMN, false)?
            .where_eq(role.id_column(), user_id)?
            .build()?;
        let reply = self.executor.execute(msg).await?;
        if let Outcome::ServerRejected(Some(reason)) = classify(&reply) {
            return Err(CapacityError::ServerRejected(reason));
        }
        let found = reply.affected_rows() > 0;
        info!(role = %role, user_id = %user_id, found = found, "Logged out");
        Ok(found)
    }
}
