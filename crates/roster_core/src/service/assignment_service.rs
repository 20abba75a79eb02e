//! Assignment lifecycle service.
//!
//! # Responsibility
//! - Enforce assignment invariants above the repository layer.
//! - Provide create, remove, bulk-remove and list operations for callers that
//!   already hold validated integer identifiers.
//!
//! # Invariants
//! - Create checks run in order: procedure, user, plan, active duplicate.
//! - At most one active assignment exists per triple; re-assignment after
//!   removal inserts a new row.
//! - A removal succeeds at most once per active row.
//! - Failures are never retried; the same store state reproduces them.

use crate::clock::{Clock, SystemClock};
use crate::model::assignment::{
    ensure_positive_id, AssignmentId, AssignmentTriple, AssignmentValidationError,
    AssignmentView, PlanId, ProcedureId, ProcedureUser, UserId,
};
use crate::repo::assignment_repo::{AssignmentRepository, RepoError};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// How a missing active assignment was addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKey {
    Id(AssignmentId),
    Triple(AssignmentTriple),
}

impl Display for AssignmentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "procedure_user_id={id}"),
            Self::Triple(triple) => write!(f, "{triple}"),
        }
    }
}

/// What could not be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Procedure(ProcedureId),
    User(UserId),
    Plan(PlanId),
    /// Never existed or already removed.
    ActiveAssignment(AssignmentKey),
    /// Bulk-removal target set is empty.
    NoActiveAssignments {
        procedure_id: ProcedureId,
        plan_id: PlanId,
    },
}

/// Why a write was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The triple already has an active assignment.
    AlreadyAssigned(AssignmentTriple),
}

/// Errors from assignment lifecycle operations.
#[derive(Debug)]
pub enum AssignmentServiceError {
    /// Identifier is not a positive integer.
    InvalidIdentifier { field: &'static str, value: i64 },
    NotFound(NotFoundKind),
    Conflict(ConflictKind),
    /// Repository-level failure.
    Repo(RepoError),
}

impl AssignmentServiceError {
    /// Stable snake_case code for logs and boundary mapping.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier { .. } => "invalid_identifier",
            Self::NotFound(NotFoundKind::Procedure(_)) => "procedure_not_found",
            Self::NotFound(NotFoundKind::User(_)) => "user_not_found",
            Self::NotFound(NotFoundKind::Plan(_)) => "plan_not_found",
            Self::NotFound(NotFoundKind::ActiveAssignment(_)) => "active_assignment_not_found",
            Self::NotFound(NotFoundKind::NoActiveAssignments { .. }) => "no_active_assignments",
            Self::Conflict(ConflictKind::AlreadyAssigned(_)) => "already_assigned",
            Self::Repo(_) => "repo_error",
        }
    }

    fn is_expected(&self) -> bool {
        !matches!(self, Self::Repo(_))
    }
}

impl Display for AssignmentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier { field, value } => {
                write!(f, "{field} must be greater than 0, got {value}")
            }
            Self::NotFound(NotFoundKind::Procedure(id)) => write!(f, "procedure {id} not found"),
            Self::NotFound(NotFoundKind::User(id)) => write!(f, "user {id} not found"),
            Self::NotFound(NotFoundKind::Plan(id)) => write!(f, "plan {id} not found"),
            Self::NotFound(NotFoundKind::ActiveAssignment(key)) => {
                write!(f, "assignment not found or already removed: {key}")
            }
            Self::NotFound(NotFoundKind::NoActiveAssignments {
                procedure_id,
                plan_id,
            }) => write!(
                f,
                "no active assignments for procedure_id={procedure_id} plan_id={plan_id}"
            ),
            Self::Conflict(ConflictKind::AlreadyAssigned(triple)) => {
                write!(f, "user already assigned to this procedure: {triple}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AssignmentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AssignmentValidationError> for AssignmentServiceError {
    fn from(value: AssignmentValidationError) -> Self {
        match value {
            AssignmentValidationError::NonPositiveId { field, value } => {
                Self::InvalidIdentifier { field, value }
            }
        }
    }
}

impl From<RepoError> for AssignmentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => err.into(),
            RepoError::NotFound(id) => {
                Self::NotFound(NotFoundKind::ActiveAssignment(AssignmentKey::Id(id)))
            }
            RepoError::DuplicateActive(triple) => {
                Self::Conflict(ConflictKind::AlreadyAssigned(triple))
            }
            other => Self::Repo(other),
        }
    }
}

pub type AssignmentServiceResult<T> = Result<T, AssignmentServiceError>;

/// Assignment lifecycle facade.
pub struct AssignmentService<R: AssignmentRepository, C: Clock = SystemClock> {
    repo: R,
    clock: C,
}

impl<R: AssignmentRepository> AssignmentService<R> {
    /// Creates a service stamping timestamps from the wall clock.
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, SystemClock)
    }
}

impl<R: AssignmentRepository, C: Clock> AssignmentService<R, C> {
    /// Creates a service with an injected clock.
    pub fn with_clock(repo: R, clock: C) -> Self {
        Self { repo, clock }
    }

    /// Assigns a user to a procedure within a plan.
    ///
    /// # Errors
    /// - `NotFound(Procedure | User | Plan)` for the first missing reference.
    /// - `Conflict(AlreadyAssigned)` when the triple already has an active row,
    ///   including when a concurrent writer wins the race.
    pub fn create_assignment(
        &self,
        procedure_id: ProcedureId,
        user_id: UserId,
        plan_id: PlanId,
    ) -> AssignmentServiceResult<ProcedureUser> {
        let started_at = Instant::now();
        let triple = AssignmentTriple::new(procedure_id, user_id, plan_id);
        let result = self.create_assignment_inner(&triple);
        match &result {
            Ok(record) => info!(
                "event=assignment_create module=assignment status=ok {} procedure_user_id={} duration_ms={}",
                triple,
                record.procedure_user_id,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("assignment_create", &triple.to_string(), err, started_at),
        }
        result
    }

    /// Soft-deletes the active assignment of one triple.
    ///
    /// Succeeds once per active row; repeating the call reports
    /// `NotFound(ActiveAssignment)`.
    pub fn remove_assignment(
        &self,
        procedure_id: ProcedureId,
        user_id: UserId,
        plan_id: PlanId,
    ) -> AssignmentServiceResult<()> {
        let started_at = Instant::now();
        let triple = AssignmentTriple::new(procedure_id, user_id, plan_id);
        let result = self.remove_assignment_inner(&triple);
        match &result {
            Ok(()) => info!(
                "event=assignment_remove module=assignment status=ok {} duration_ms={}",
                triple,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("assignment_remove", &triple.to_string(), err, started_at),
        }
        result
    }

    /// Soft-deletes one assignment by its own identity.
    pub fn remove_assignment_by_id(&self, assignment_id: AssignmentId) -> AssignmentServiceResult<()> {
        let started_at = Instant::now();
        let result = ensure_positive_id("procedure_user_id", assignment_id)
            .map_err(AssignmentServiceError::from)
            .and_then(|()| {
                self.repo
                    .mark_removed(assignment_id, self.clock.now_ms())
                    .map_err(AssignmentServiceError::from)
            });
        let fields = format!("procedure_user_id={assignment_id}");
        match &result {
            Ok(()) => info!(
                "event=assignment_remove_by_id module=assignment status=ok {} duration_ms={}",
                fields,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("assignment_remove_by_id", &fields, err, started_at),
        }
        result
    }

    /// Soft-deletes every active assignment of one procedure within a plan.
    ///
    /// All rows share one `updated_at` and flip in one transaction. Returns
    /// the number of rows removed.
    ///
    /// # Errors
    /// - `NotFound(NoActiveAssignments)` when nothing is active, whether rows
    ///   never existed or were all removed already.
    pub fn remove_all_assignments_in_procedure(
        &self,
        procedure_id: ProcedureId,
        plan_id: PlanId,
    ) -> AssignmentServiceResult<usize> {
        let started_at = Instant::now();
        let result = self.remove_all_inner(procedure_id, plan_id);
        let fields = format!("procedure_id={procedure_id} plan_id={plan_id}");
        match &result {
            Ok(count) => info!(
                "event=assignment_remove_all module=assignment status=ok {} removed_count={} duration_ms={}",
                fields,
                count,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("assignment_remove_all", &fields, err, started_at),
        }
        result
    }

    /// Lists active assignments of one procedure within a plan, joined with
    /// the user name and procedure title.
    ///
    /// Order is store-defined. An empty selection is an empty list.
    pub fn list_active_assignments(
        &self,
        procedure_id: ProcedureId,
        plan_id: PlanId,
    ) -> AssignmentServiceResult<Vec<AssignmentView>> {
        ensure_positive_id("procedure_id", procedure_id)?;
        ensure_positive_id("plan_id", plan_id)?;
        let views = self.repo.list_active_views(procedure_id, plan_id)?;
        debug!(
            "event=assignment_list module=assignment status=ok procedure_id={} plan_id={} count={}",
            procedure_id,
            plan_id,
            views.len()
        );
        Ok(views)
    }

    /// Gets one assignment by id with optional removed-row visibility.
    pub fn get_assignment(
        &self,
        assignment_id: AssignmentId,
        include_removed: bool,
    ) -> AssignmentServiceResult<Option<ProcedureUser>> {
        ensure_positive_id("procedure_user_id", assignment_id)?;
        self.repo
            .get_assignment(assignment_id, include_removed)
            .map_err(Into::into)
    }

    /// Returns every record ever written for one triple, oldest first.
    pub fn assignment_history(
        &self,
        procedure_id: ProcedureId,
        user_id: UserId,
        plan_id: PlanId,
    ) -> AssignmentServiceResult<Vec<ProcedureUser>> {
        let triple = AssignmentTriple::new(procedure_id, user_id, plan_id);
        triple.validate()?;
        self.repo.list_triple_history(&triple).map_err(Into::into)
    }

    fn create_assignment_inner(
        &self,
        triple: &AssignmentTriple,
    ) -> AssignmentServiceResult<ProcedureUser> {
        triple.validate()?;

        if !self.repo.procedure_exists(triple.procedure_id)? {
            return Err(AssignmentServiceError::NotFound(NotFoundKind::Procedure(
                triple.procedure_id,
            )));
        }
        if !self.repo.user_exists(triple.user_id)? {
            return Err(AssignmentServiceError::NotFound(NotFoundKind::User(
                triple.user_id,
            )));
        }
        if !self.repo.plan_exists(triple.plan_id)? {
            return Err(AssignmentServiceError::NotFound(NotFoundKind::Plan(
                triple.plan_id,
            )));
        }
        if self.repo.find_active(triple)?.is_some() {
            return Err(AssignmentServiceError::Conflict(
                ConflictKind::AlreadyAssigned(*triple),
            ));
        }

        let now_ms = self.clock.now_ms();
        self.repo
            .insert_assignment(triple, now_ms)
            .map_err(Into::into)
    }

    fn remove_assignment_inner(&self, triple: &AssignmentTriple) -> AssignmentServiceResult<()> {
        triple.validate()?;
        let not_found = || {
            AssignmentServiceError::NotFound(NotFoundKind::ActiveAssignment(
                AssignmentKey::Triple(*triple),
            ))
        };

        let active = self.repo.find_active(triple)?.ok_or_else(not_found)?;
        match self
            .repo
            .mark_removed(active.procedure_user_id, self.clock.now_ms())
        {
            Ok(()) => Ok(()),
            // Removed concurrently between lookup and update.
            Err(RepoError::NotFound(_)) => Err(not_found()),
            Err(err) => Err(err.into()),
        }
    }

    fn remove_all_inner(
        &self,
        procedure_id: ProcedureId,
        plan_id: PlanId,
    ) -> AssignmentServiceResult<usize> {
        ensure_positive_id("procedure_id", procedure_id)?;
        ensure_positive_id("plan_id", plan_id)?;

        let removed = self
            .repo
            .mark_removed_in_procedure(procedure_id, plan_id, self.clock.now_ms())?;
        if removed == 0 {
            return Err(AssignmentServiceError::NotFound(
                NotFoundKind::NoActiveAssignments {
                    procedure_id,
                    plan_id,
                },
            ));
        }
        Ok(removed)
    }
}

fn log_failure(
    event: &str,
    fields: &str,
    err: &AssignmentServiceError,
    started_at: Instant,
) {
    if err.is_expected() {
        warn!(
            "event={} module=assignment status=error {} error_code={} duration_ms={}",
            event,
            fields,
            err.error_code(),
            started_at.elapsed().as_millis()
        );
    } else {
        error!(
            "event={} module=assignment status=error {} error_code={} duration_ms={} error={}",
            event,
            fields,
            err.error_code(),
            started_at.elapsed().as_millis(),
            err
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{AssignmentKey, AssignmentServiceError, ConflictKind, NotFoundKind};
    use crate::model::assignment::{AssignmentTriple, AssignmentValidationError};
    use crate::repo::assignment_repo::RepoError;

    #[test]
    fn duplicate_active_maps_to_already_assigned_conflict() {
        let triple = AssignmentTriple::new(1, 2, 3);
        let err: AssignmentServiceError = RepoError::DuplicateActive(triple).into();
        assert!(matches!(
            err,
            AssignmentServiceError::Conflict(ConflictKind::AlreadyAssigned(t)) if t == triple
        ));
        assert_eq!(err.error_code(), "already_assigned");
    }

    #[test]
    fn repo_not_found_maps_to_missing_active_assignment_by_id() {
        let err: AssignmentServiceError = RepoError::NotFound(9).into();
        assert!(matches!(
            err,
            AssignmentServiceError::NotFound(NotFoundKind::ActiveAssignment(AssignmentKey::Id(9)))
        ));
        assert_eq!(err.error_code(), "active_assignment_not_found");
    }

    #[test]
    fn validation_error_maps_to_invalid_identifier() {
        let err: AssignmentServiceError = AssignmentValidationError::NonPositiveId {
            field: "plan_id",
            value: -1,
        }
        .into();
        assert_eq!(err.error_code(), "invalid_identifier");
        assert_eq!(err.to_string(), "plan_id must be greater than 0, got -1");
    }

    #[test]
    fn transport_errors_stay_wrapped() {
        let err: AssignmentServiceError = RepoError::InvalidData("bad".to_string()).into();
        assert!(matches!(err, AssignmentServiceError::Repo(_)));
        assert!(!err.is_expected());
        assert!(std::error::Error::source(&err).is_some());
    }
}
