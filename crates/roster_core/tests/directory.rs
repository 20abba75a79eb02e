use roster_core::db::open_db_in_memory;
use roster_core::{DirectoryService, Procedure, SqliteDirectoryRepository, User};

#[test]
fn lists_procedures_in_id_order() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO procedures (procedure_id, procedure_title) VALUES
            (3, 'Thoracentesis'),
            (1, 'Arterial line'),
            (2, 'Paracentesis');",
    )
    .unwrap();
    let service = DirectoryService::new(SqliteDirectoryRepository::try_new(&conn).unwrap());

    let titles: Vec<_> = service
        .list_procedures()
        .unwrap()
        .into_iter()
        .map(|procedure| procedure.procedure_title)
        .collect();
    assert_eq!(titles, vec!["Arterial line", "Paracentesis", "Thoracentesis"]);
}

#[test]
fn looks_up_procedures_and_users_by_id() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO procedures (procedure_id, procedure_title) VALUES (1, 'Arterial line');
         INSERT INTO users (user_id, name) VALUES (7, 'Attending F');",
    )
    .unwrap();
    let service = DirectoryService::new(SqliteDirectoryRepository::try_new(&conn).unwrap());

    assert_eq!(
        service.get_procedure(1).unwrap(),
        Some(Procedure {
            procedure_id: 1,
            procedure_title: "Arterial line".to_string(),
        })
    );
    assert_eq!(
        service.get_user(7).unwrap(),
        Some(User {
            user_id: 7,
            name: "Attending F".to_string(),
        })
    );
    assert!(service.get_user(8).unwrap().is_none());
    assert_eq!(
        service.get_procedure(0).unwrap_err().error_code(),
        "invalid_identifier"
    );
}

#[test]
fn empty_directory_lists_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = DirectoryService::new(SqliteDirectoryRepository::try_new(&conn).unwrap());

    assert!(service.list_procedures().unwrap().is_empty());
}
