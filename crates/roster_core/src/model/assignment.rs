//! Assignment domain model.
//!
//! # Responsibility
//! - Define the canonical `ProcedureUser` record and its triple key.
//! - Provide the joined `AssignmentView` read model consumed by list callers.
//!
//! # Invariants
//! - Every identifier is a positive integer.
//! - `is_removed` is the source of truth for soft-delete state.
//! - A freshly created record has `created_at == updated_at`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned identity of one assignment row.
pub type AssignmentId = i64;
/// Identity of a procedure owned by an external collaborator.
pub type ProcedureId = i64;
/// Identity of a user owned by an external collaborator.
pub type UserId = i64;
/// Identity of a plan owned by an external collaborator.
pub type PlanId = i64;

/// Validation errors for assignment identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentValidationError {
    /// Identifier must be greater than zero.
    NonPositiveId { field: &'static str, value: i64 },
}

impl Display for AssignmentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveId { field, value } => {
                write!(f, "{field} must be greater than 0, got {value}")
            }
        }
    }
}

impl Error for AssignmentValidationError {}

/// Checks that one identifier is strictly positive.
pub fn ensure_positive_id(field: &'static str, value: i64) -> Result<(), AssignmentValidationError> {
    if value <= 0 {
        return Err(AssignmentValidationError::NonPositiveId { field, value });
    }
    Ok(())
}

/// The `(procedure, user, plan)` key identifying one relationship slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentTriple {
    pub procedure_id: ProcedureId,
    pub user_id: UserId,
    pub plan_id: PlanId,
}

impl AssignmentTriple {
    pub fn new(procedure_id: ProcedureId, user_id: UserId, plan_id: PlanId) -> Self {
        Self {
            procedure_id,
            user_id,
            plan_id,
        }
    }

    /// Validates that all three identifiers are positive.
    ///
    /// Fields are checked in `procedure_id`, `user_id`, `plan_id` order and the
    /// first offending one is reported.
    pub fn validate(&self) -> Result<(), AssignmentValidationError> {
        ensure_positive_id("procedure_id", self.procedure_id)?;
        ensure_positive_id("user_id", self.user_id)?;
        ensure_positive_id("plan_id", self.plan_id)?;
        Ok(())
    }
}

impl Display for AssignmentTriple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "procedure_id={} user_id={} plan_id={}",
            self.procedure_id, self.user_id, self.plan_id
        )
    }
}

/// One `(procedure, user, plan)` relationship at a point in time.
///
/// Re-assigning after removal creates a new row, so one triple accumulates a
/// row per assign/unassign cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureUser {
    /// Store-assigned identity, never reused.
    pub procedure_user_id: AssignmentId,
    pub procedure_id: ProcedureId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    /// Soft-delete marker.
    pub is_removed: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds. Stamped again on removal.
    pub updated_at: i64,
}

impl ProcedureUser {
    /// Returns the triple this record occupies.
    pub fn triple(&self) -> AssignmentTriple {
        AssignmentTriple::new(self.procedure_id, self.user_id, self.plan_id)
    }

    /// Returns whether this record is the active assignment of its triple.
    pub fn is_active(&self) -> bool {
        !self.is_removed
    }
}

/// Read-only projection of an active assignment joined with the procedure
/// title and user display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
    pub procedure_user_id: AssignmentId,
    pub procedure_id: ProcedureId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub user_name: String,
    pub procedure_title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::{AssignmentTriple, AssignmentValidationError, ProcedureUser};

    #[test]
    fn validate_reports_first_non_positive_field() {
        let err = AssignmentTriple::new(1, 0, -3).validate().unwrap_err();
        assert_eq!(
            err,
            AssignmentValidationError::NonPositiveId {
                field: "user_id",
                value: 0
            }
        );
        assert!(AssignmentTriple::new(1, 2, 3).validate().is_ok());
    }

    #[test]
    fn record_exposes_triple_and_active_state() {
        let record = ProcedureUser {
            procedure_user_id: 7,
            procedure_id: 1,
            user_id: 2,
            plan_id: 3,
            is_removed: false,
            created_at: 10,
            updated_at: 10,
        };
        assert_eq!(record.triple(), AssignmentTriple::new(1, 2, 3));
        assert!(record.is_active());
    }
}
