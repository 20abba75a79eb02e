//! Core domain logic for procedure-user assignments within plans.
//! This crate is the single source of truth for assignment invariants.

pub mod clock;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::assignment::{
    AssignmentId, AssignmentTriple, AssignmentValidationError, AssignmentView, PlanId,
    ProcedureId, ProcedureUser, UserId,
};
pub use model::directory::{Procedure, User};
pub use repo::assignment_repo::{
    AssignmentRepository, RepoError, RepoResult, SqliteAssignmentRepository,
};
pub use repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
pub use service::assignment_service::{
    AssignmentKey, AssignmentService, AssignmentServiceError, AssignmentServiceResult,
    ConflictKind, NotFoundKind,
};
pub use service::directory_service::DirectoryService;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
