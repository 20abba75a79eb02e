//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `roster_core` linkage and schema
//!   bootstrap.
//! - Keep output deterministic `key=value` lines for quick local checks.
//!
//! Usage: `roster_cli [DB_PATH]`. Without a path an in-memory database is used.

use roster_core::db::migrations::latest_version;
use roster_core::db::{open_db, open_db_in_memory, DbResult};
use roster_core::{DirectoryService, SqliteDirectoryRepository};
use rusqlite::Connection;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("roster_core ping={}", roster_core::ping());
    println!("roster_core version={}", roster_core::core_version());
    println!("roster_core schema_version={}", latest_version());

    let db_path = std::env::args().nth(1);
    let conn = match open(db_path.as_deref()) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("roster_core db_open=error error={err}");
            return ExitCode::FAILURE;
        }
    };

    match count_procedures(&conn) {
        Ok(count) => {
            println!("roster_core procedures={count}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("roster_core procedures=error error={message}");
            ExitCode::FAILURE
        }
    }
}

fn open(path: Option<&str>) -> DbResult<Connection> {
    match path {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    }
}

fn count_procedures(conn: &Connection) -> Result<usize, String> {
    let repo = SqliteDirectoryRepository::try_new(conn).map_err(|err| err.to_string())?;
    let service = DirectoryService::new(repo);
    service
        .list_procedures()
        .map(|procedures| procedures.len())
        .map_err(|err| err.to_string())
}
