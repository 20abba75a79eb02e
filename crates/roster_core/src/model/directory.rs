//! Referenced entity read models.
//!
//! Procedures, users and plans are owned outside the assignment lifecycle;
//! core only looks them up by identity.

use crate::model::assignment::{ProcedureId, UserId};
use serde::{Deserialize, Serialize};

/// Procedure as seen by assignment callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    pub procedure_id: ProcedureId,
    pub procedure_title: String,
}

/// User as seen by assignment callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: UserId,
    pub name: String,
}
