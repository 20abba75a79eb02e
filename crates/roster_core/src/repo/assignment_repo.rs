//! Assignment repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the record-store operations the assignment lifecycle runs on.
//! - Keep SQL details, transactions and constraint mapping inside the
//!   persistence boundary.
//!
//! # Invariants
//! - Rows are never deleted; removal flips `is_removed` and stamps
//!   `updated_at`.
//! - The partial unique index on active triples is reported as
//!   `RepoError::DuplicateActive`, never as a raw SQLite error.
//! - Batch removal commits all rows or none.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::assignment::{
    AssignmentId, AssignmentTriple, AssignmentValidationError, AssignmentView, PlanId,
    ProcedureId, ProcedureUser, UserId,
};
use crate::repo::ensure_connection_ready;
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ASSIGNMENT_SELECT_SQL: &str = "SELECT
    procedure_user_id,
    procedure_id,
    user_id,
    plan_id,
    is_removed,
    created_at,
    updated_at
FROM procedure_users";

const PROCEDURE_USER_COLUMNS: &[&str] = &[
    "procedure_user_id",
    "procedure_id",
    "user_id",
    "plan_id",
    "is_removed",
    "created_at",
    "updated_at",
];
const PROCEDURE_COLUMNS: &[&str] = &["procedure_id", "procedure_title"];
const USER_COLUMNS: &[&str] = &["user_id", "name"];
const PLAN_COLUMNS: &[&str] = &["plan_id"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for assignment persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(AssignmentValidationError),
    Db(DbError),
    /// No active row exists for the given assignment id.
    NotFound(AssignmentId),
    /// An active row already occupies the triple.
    DuplicateActive(AssignmentTriple),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "active assignment not found: {id}"),
            Self::DuplicateActive(triple) => {
                write!(f, "active assignment already exists for {triple}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted assignment data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::DuplicateActive(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<AssignmentValidationError> for RepoError {
    fn from(value: AssignmentValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Record-store contract for the assignment lifecycle.
///
/// Every write is a single atomic step on the store side; read-then-write
/// races on one triple are closed by the active-triple uniqueness backstop.
pub trait AssignmentRepository {
    /// Returns whether the procedure exists.
    fn procedure_exists(&self, procedure_id: ProcedureId) -> RepoResult<bool>;
    /// Returns whether the user exists.
    fn user_exists(&self, user_id: UserId) -> RepoResult<bool>;
    /// Returns whether the plan exists.
    fn plan_exists(&self, plan_id: PlanId) -> RepoResult<bool>;
    /// Loads the active row for one triple, if any.
    fn find_active(&self, triple: &AssignmentTriple) -> RepoResult<Option<ProcedureUser>>;
    /// Loads one row by id with optional removed-row visibility.
    fn get_assignment(
        &self,
        id: AssignmentId,
        include_removed: bool,
    ) -> RepoResult<Option<ProcedureUser>>;
    /// Inserts one active row with `created_at = updated_at = now_ms`.
    fn insert_assignment(
        &self,
        triple: &AssignmentTriple,
        now_ms: i64,
    ) -> RepoResult<ProcedureUser>;
    /// Soft-deletes one active row.
    fn mark_removed(&self, id: AssignmentId, updated_at: i64) -> RepoResult<()>;
    /// Soft-deletes every active row of `(procedure_id, plan_id)` in one
    /// transaction and returns how many flipped.
    fn mark_removed_in_procedure(
        &self,
        procedure_id: ProcedureId,
        plan_id: PlanId,
        updated_at: i64,
    ) -> RepoResult<usize>;
    /// Lists active rows of `(procedure_id, plan_id)` joined with user name
    /// and procedure title.
    fn list_active_views(
        &self,
        procedure_id: ProcedureId,
        plan_id: PlanId,
    ) -> RepoResult<Vec<AssignmentView>>;
    /// Lists every row ever written for one triple, oldest first.
    fn list_triple_history(&self, triple: &AssignmentTriple) -> RepoResult<Vec<ProcedureUser>>;
}

/// SQLite-backed assignment repository.
pub struct SqliteAssignmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAssignmentRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                ("procedure_users", PROCEDURE_USER_COLUMNS),
                ("procedures", PROCEDURE_COLUMNS),
                ("users", USER_COLUMNS),
                ("plans", PLAN_COLUMNS),
            ],
        )?;
        Ok(Self { conn })
    }
}

impl AssignmentRepository for SqliteAssignmentRepository<'_> {
    fn procedure_exists(&self, procedure_id: ProcedureId) -> RepoResult<bool> {
        exists(
            self.conn,
            "SELECT EXISTS(SELECT 1 FROM procedures WHERE procedure_id = ?1);",
            procedure_id,
        )
    }

    fn user_exists(&self, user_id: UserId) -> RepoResult<bool> {
        exists(
            self.conn,
            "SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?1);",
            user_id,
        )
    }

    fn plan_exists(&self, plan_id: PlanId) -> RepoResult<bool> {
        exists(
            self.conn,
            "SELECT EXISTS(SELECT 1 FROM plans WHERE plan_id = ?1);",
            plan_id,
        )
    }

    fn find_active(&self, triple: &AssignmentTriple) -> RepoResult<Option<ProcedureUser>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ASSIGNMENT_SELECT_SQL}
             WHERE procedure_id = ?1
               AND user_id = ?2
               AND plan_id = ?3
               AND is_removed = 0;"
        ))?;

        let mut rows = stmt.query(params![triple.procedure_id, triple.user_id, triple.plan_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_assignment_row(row)?));
        }

        Ok(None)
    }

    fn get_assignment(
        &self,
        id: AssignmentId,
        include_removed: bool,
    ) -> RepoResult<Option<ProcedureUser>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ASSIGNMENT_SELECT_SQL}
             WHERE procedure_user_id = ?1
               AND (?2 = 1 OR is_removed = 0);"
        ))?;

        let mut rows = stmt.query(params![id, bool_to_int(include_removed)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_assignment_row(row)?));
        }

        Ok(None)
    }

    fn insert_assignment(
        &self,
        triple: &AssignmentTriple,
        now_ms: i64,
    ) -> RepoResult<ProcedureUser> {
        triple.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
            "INSERT INTO procedure_users (
                procedure_id,
                user_id,
                plan_id,
                is_removed,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, 0, ?4, ?4);",
            params![triple.procedure_id, triple.user_id, triple.plan_id, now_ms],
        );
        if let Err(err) = inserted {
            return Err(if is_unique_violation(&err) {
                RepoError::DuplicateActive(*triple)
            } else {
                err.into()
            });
        }

        let id = tx.last_insert_rowid();
        let record = load_assignment(&tx, id)?
            .ok_or_else(|| RepoError::InvalidData(format!("inserted row {id} vanished")))?;
        tx.commit()?;
        Ok(record)
    }

    fn mark_removed(&self, id: AssignmentId, updated_at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE procedure_users
             SET
                is_removed = 1,
                updated_at = ?2
             WHERE procedure_user_id = ?1
               AND is_removed = 0;",
            params![id, updated_at],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn mark_removed_in_procedure(
        &self,
        procedure_id: ProcedureId,
        plan_id: PlanId,
        updated_at: i64,
    ) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let mut ids = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT procedure_user_id
                 FROM procedure_users
                 WHERE procedure_id = ?1
                   AND plan_id = ?2
                   AND is_removed = 0
                 ORDER BY procedure_user_id ASC;",
            )?;
            let mut rows = stmt.query(params![procedure_id, plan_id])?;
            while let Some(row) = rows.next()? {
                ids.push(row.get::<_, AssignmentId>(0)?);
            }
        }

        // Dropping `tx` on any early return rolls back rows already flipped.
        for id in &ids {
            let changed = tx.execute(
                "UPDATE procedure_users
                 SET
                    is_removed = 1,
                    updated_at = ?2
                 WHERE procedure_user_id = ?1
                   AND is_removed = 0;",
                params![id, updated_at],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound(*id));
            }
        }

        tx.commit()?;
        Ok(ids.len())
    }

    fn list_active_views(
        &self,
        procedure_id: ProcedureId,
        plan_id: PlanId,
    ) -> RepoResult<Vec<AssignmentView>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                pu.procedure_user_id AS procedure_user_id,
                pu.procedure_id AS procedure_id,
                pu.user_id AS user_id,
                pu.plan_id AS plan_id,
                u.name AS user_name,
                p.procedure_title AS procedure_title,
                pu.created_at AS created_at,
                pu.updated_at AS updated_at
             FROM procedure_users pu
             INNER JOIN users u ON u.user_id = pu.user_id
             INNER JOIN procedures p ON p.procedure_id = pu.procedure_id
             WHERE pu.procedure_id = ?1
               AND pu.plan_id = ?2
               AND pu.is_removed = 0
             ORDER BY pu.procedure_user_id ASC;",
        )?;

        let mut rows = stmt.query(params![procedure_id, plan_id])?;
        let mut views = Vec::new();
        while let Some(row) = rows.next()? {
            views.push(AssignmentView {
                procedure_user_id: row.get("procedure_user_id")?,
                procedure_id: row.get("procedure_id")?,
                user_id: row.get("user_id")?,
                plan_id: row.get("plan_id")?,
                user_name: row.get("user_name")?,
                procedure_title: row.get("procedure_title")?,
                created_at: row.get("created_at")?,
                updated_at: row.get("updated_at")?,
            });
        }

        Ok(views)
    }

    fn list_triple_history(&self, triple: &AssignmentTriple) -> RepoResult<Vec<ProcedureUser>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ASSIGNMENT_SELECT_SQL}
             WHERE procedure_id = ?1
               AND user_id = ?2
               AND plan_id = ?3
             ORDER BY procedure_user_id ASC;"
        ))?;

        let mut rows = stmt.query(params![triple.procedure_id, triple.user_id, triple.plan_id])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_assignment_row(row)?);
        }

        Ok(records)
    }
}

fn exists(conn: &Connection, sql: &str, id: i64) -> RepoResult<bool> {
    let found: i64 = conn.query_row(sql, [id], |row| row.get(0))?;
    Ok(found == 1)
}

fn load_assignment(conn: &Connection, id: AssignmentId) -> RepoResult<Option<ProcedureUser>> {
    conn.query_row(
        &format!("{ASSIGNMENT_SELECT_SQL} WHERE procedure_user_id = ?1;"),
        [id],
        |row| Ok(parse_assignment_row(row)),
    )
    .optional()?
    .transpose()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

fn parse_assignment_row(row: &Row<'_>) -> RepoResult<ProcedureUser> {
    let is_removed = match row.get::<_, i64>("is_removed")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_removed value `{other}` in procedure_users.is_removed"
            )));
        }
    };

    let record = ProcedureUser {
        procedure_user_id: row.get("procedure_user_id")?,
        procedure_id: row.get("procedure_id")?,
        user_id: row.get("user_id")?,
        plan_id: row.get("plan_id")?,
        is_removed,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    record.triple().validate()?;
    Ok(record)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
