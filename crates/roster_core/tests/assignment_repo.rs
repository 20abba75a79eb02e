use roster_core::db::migrations::latest_version;
use roster_core::db::open_db_in_memory;
use roster_core::{
    AssignmentId, AssignmentRepository, AssignmentService, AssignmentServiceError,
    AssignmentTriple, AssignmentView, ConflictKind, PlanId, ProcedureId, ProcedureUser,
    RepoError, RepoResult, SqliteAssignmentRepository, UserId,
};
use rusqlite::Connection;

fn seeded_db() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO procedures (procedure_id, procedure_title) VALUES (1, 'Chest tube');
         INSERT INTO users (user_id, name) VALUES (1, 'Resident D'), (2, 'Resident E');
         INSERT INTO plans (plan_id) VALUES (1);",
    )
    .unwrap();
    conn
}

#[test]
fn unique_index_rejects_second_active_row_for_triple() {
    let conn = seeded_db();
    let repo = SqliteAssignmentRepository::try_new(&conn).unwrap();
    let triple = AssignmentTriple::new(1, 1, 1);

    repo.insert_assignment(&triple, 10).unwrap();
    let err = repo.insert_assignment(&triple, 20).unwrap_err();
    assert!(matches!(err, RepoError::DuplicateActive(t) if t == triple));

    assert_eq!(repo.list_triple_history(&triple).unwrap().len(), 1);
}

#[test]
fn removed_rows_do_not_block_new_active_row() {
    let conn = seeded_db();
    let repo = SqliteAssignmentRepository::try_new(&conn).unwrap();
    let triple = AssignmentTriple::new(1, 2, 1);

    for cycle in 0..3 {
        let record = repo.insert_assignment(&triple, cycle * 100).unwrap();
        repo.mark_removed(record.procedure_user_id, cycle * 100 + 50)
            .unwrap();
    }
    let active = repo.insert_assignment(&triple, 1_000).unwrap();

    let history = repo.list_triple_history(&triple).unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history.iter().filter(|record| record.is_removed).count(), 3);
    assert_eq!(repo.find_active(&triple).unwrap(), Some(active));
}

#[test]
fn mark_removed_only_touches_active_rows() {
    let conn = seeded_db();
    let repo = SqliteAssignmentRepository::try_new(&conn).unwrap();
    let record = repo
        .insert_assignment(&AssignmentTriple::new(1, 1, 1), 10)
        .unwrap();

    repo.mark_removed(record.procedure_user_id, 20).unwrap();
    let err = repo.mark_removed(record.procedure_user_id, 30).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == record.procedure_user_id));

    let stored = repo
        .get_assignment(record.procedure_user_id, true)
        .unwrap()
        .unwrap();
    assert_eq!(stored.updated_at, 20);
}

#[test]
fn insert_rejects_non_positive_ids_before_sql() {
    let conn = seeded_db();
    let repo = SqliteAssignmentRepository::try_new(&conn).unwrap();

    let err = repo
        .insert_assignment(&AssignmentTriple::new(1, -1, 1), 10)
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}

/// Hides active rows from the duplicate pre-check, as a concurrent writer
/// committing between check and insert would.
struct RacingRepository<'conn> {
    inner: SqliteAssignmentRepository<'conn>,
}

impl AssignmentRepository for RacingRepository<'_> {
    fn procedure_exists(&self, procedure_id: ProcedureId) -> RepoResult<bool> {
        self.inner.procedure_exists(procedure_id)
    }

    fn user_exists(&self, user_id: UserId) -> RepoResult<bool> {
        self.inner.user_exists(user_id)
    }

    fn plan_exists(&self, plan_id: PlanId) -> RepoResult<bool> {
        self.inner.plan_exists(plan_id)
    }

    fn find_active(&self, _triple: &AssignmentTriple) -> RepoResult<Option<ProcedureUser>> {
        Ok(None)
    }

    fn get_assignment(
        &self,
        id: AssignmentId,
        include_removed: bool,
    ) -> RepoResult<Option<ProcedureUser>> {
        self.inner.get_assignment(id, include_removed)
    }

    fn insert_assignment(
        &self,
        triple: &AssignmentTriple,
        now_ms: i64,
    ) -> RepoResult<ProcedureUser> {
        self.inner.insert_assignment(triple, now_ms)
    }

    fn mark_removed(&self, id: AssignmentId, updated_at: i64) -> RepoResult<()> {
        self.inner.mark_removed(id, updated_at)
    }

    fn mark_removed_in_procedure(
        &self,
        procedure_id: ProcedureId,
        plan_id: PlanId,
        updated_at: i64,
    ) -> RepoResult<usize> {
        self.inner
            .mark_removed_in_procedure(procedure_id, plan_id, updated_at)
    }

    fn list_active_views(
        &self,
        procedure_id: ProcedureId,
        plan_id: PlanId,
    ) -> RepoResult<Vec<AssignmentView>> {
        self.inner.list_active_views(procedure_id, plan_id)
    }

    fn list_triple_history(&self, triple: &AssignmentTriple) -> RepoResult<Vec<ProcedureUser>> {
        self.inner.list_triple_history(triple)
    }
}

#[test]
fn lost_duplicate_check_race_still_surfaces_as_conflict() {
    let conn = seeded_db();
    let service = AssignmentService::new(RacingRepository {
        inner: SqliteAssignmentRepository::try_new(&conn).unwrap(),
    });

    service.create_assignment(1, 1, 1).unwrap();
    let err = service.create_assignment(1, 1, 1).unwrap_err();

    assert!(matches!(
        err,
        AssignmentServiceError::Conflict(ConflictKind::AlreadyAssigned(triple))
            if triple == AssignmentTriple::new(1, 1, 1)
    ));
    assert_eq!(service.assignment_history(1, 1, 1).unwrap().len(), 1);
}

#[test]
fn assignment_view_serializes_with_camel_case_contract() {
    let conn = seeded_db();
    let repo = SqliteAssignmentRepository::try_new(&conn).unwrap();
    let record = repo
        .insert_assignment(&AssignmentTriple::new(1, 2, 1), 1_234)
        .unwrap();

    let views = repo.list_active_views(1, 1).unwrap();
    let json = serde_json::to_value(&views).unwrap();

    assert_eq!(
        json,
        serde_json::json!([{
            "procedureUserId": record.procedure_user_id,
            "procedureId": 1,
            "userId": 2,
            "planId": 1,
            "userName": "Resident E",
            "procedureTitle": "Chest tube",
            "createdAt": 1_234,
            "updatedAt": 1_234
        }])
    );
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let result = SqliteAssignmentRepository::try_new(&conn);
    match result {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_assignment_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteAssignmentRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredTable("procedure_users"))
    ));
}

#[test]
fn repository_rejects_assignment_table_missing_removed_flag() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE procedure_users (
            procedure_user_id INTEGER PRIMARY KEY,
            procedure_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            plan_id INTEGER NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteAssignmentRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredColumn {
            table: "procedure_users",
            column: "is_removed"
        })
    ));
}
