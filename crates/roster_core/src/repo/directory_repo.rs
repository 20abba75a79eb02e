//! Read-only lookups of procedures and users referenced by assignments.
//!
//! # Invariants
//! - This repository never creates or mutates referenced entities.
//! - Procedure listing is deterministic: `procedure_id ASC`.

use crate::model::assignment::{ProcedureId, UserId};
use crate::model::directory::{Procedure, User};
use crate::repo::assignment_repo::RepoResult;
use crate::repo::ensure_connection_ready;
use rusqlite::{Connection, OptionalExtension};

/// Repository interface for referenced-entity lookups.
pub trait DirectoryRepository {
    /// Lists every procedure ordered by id.
    fn list_procedures(&self) -> RepoResult<Vec<Procedure>>;
    /// Loads one procedure by id.
    fn get_procedure(&self, procedure_id: ProcedureId) -> RepoResult<Option<Procedure>>;
    /// Loads one user by id.
    fn get_user(&self, user_id: UserId) -> RepoResult<Option<User>>;
}

/// SQLite-backed directory repository.
pub struct SqliteDirectoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectoryRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                ("procedures", &["procedure_id", "procedure_title"][..]),
                ("users", &["user_id", "name"][..]),
            ],
        )?;
        Ok(Self { conn })
    }
}

impl DirectoryRepository for SqliteDirectoryRepository<'_> {
    fn list_procedures(&self) -> RepoResult<Vec<Procedure>> {
        let mut stmt = self.conn.prepare(
            "SELECT procedure_id, procedure_title
             FROM procedures
             ORDER BY procedure_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut procedures = Vec::new();
        while let Some(row) = rows.next()? {
            procedures.push(Procedure {
                procedure_id: row.get("procedure_id")?,
                procedure_title: row.get("procedure_title")?,
            });
        }
        Ok(procedures)
    }

    fn get_procedure(&self, procedure_id: ProcedureId) -> RepoResult<Option<Procedure>> {
        let procedure = self
            .conn
            .query_row(
                "SELECT procedure_id, procedure_title
                 FROM procedures
                 WHERE procedure_id = ?1;",
                [procedure_id],
                |row| {
                    Ok(Procedure {
                        procedure_id: row.get("procedure_id")?,
                        procedure_title: row.get("procedure_title")?,
                    })
                },
            )
            .optional()?;
        Ok(procedure)
    }

    fn get_user(&self, user_id: UserId) -> RepoResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT user_id, name
                 FROM users
                 WHERE user_id = ?1;",
                [user_id],
                |row| {
                    Ok(User {
                        user_id: row.get("user_id")?,
                        name: row.get("name")?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }
}
