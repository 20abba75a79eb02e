//! Referenced-entity lookup service.
//!
//! Thin facade so callers can render procedure and user pickers without
//! reaching into repositories.

use crate::model::assignment::{ensure_positive_id, ProcedureId, UserId};
use crate::model::directory::{Procedure, User};
use crate::repo::directory_repo::DirectoryRepository;
use crate::service::assignment_service::AssignmentServiceResult;

/// Directory lookup facade.
pub struct DirectoryService<R: DirectoryRepository> {
    repo: R,
}

impl<R: DirectoryRepository> DirectoryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lists every procedure ordered by id.
    pub fn list_procedures(&self) -> AssignmentServiceResult<Vec<Procedure>> {
        self.repo.list_procedures().map_err(Into::into)
    }

    pub fn get_procedure(
        &self,
        procedure_id: ProcedureId,
    ) -> AssignmentServiceResult<Option<Procedure>> {
        ensure_positive_id("procedure_id", procedure_id)?;
        self.repo.get_procedure(procedure_id).map_err(Into::into)
    }

    pub fn get_user(&self, user_id: UserId) -> AssignmentServiceResult<Option<User>> {
        ensure_positive_id("user_id", user_id)?;
        self.repo.get_user(user_id).map_err(Into::into)
    }
}
