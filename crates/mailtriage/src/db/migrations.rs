//! Versioned schema changes for the job database.
//!
//! Applied versions are recorded in `_migrations`. Each migration and its
//! record commit together, so a crash never leaves a half-applied version.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

enum Step {
    Script,
    /// Skipped when the column is already there.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    step: Step,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_jobs_table",
        sql: include_str!("sql/001_create_jobs.sql"),
        step: Step::Script,
    },
    Migration {
        version: 2,
        description: "add_confidence_to_jobs",
        sql: include_str!("sql/002_add_confidence.sql"),
        step: Step::AddColumn {
            table: "jobs",
            column: "confidence",
        },
    },
];

pub const LATEST_VERSION: u32 = 2;

const CREATE_LEDGER: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version     INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
);";

/// Highest recorded version, 0 for a fresh database.
pub fn applied_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )
}

pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(CREATE_LEDGER)?;
    let current = applied_version(conn)?;

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        log::debug!("Job schema is at v{}", current);
        return Ok(());
    }

    for migration in pending {
        apply(conn, migration)?;
    }
    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let failed = |source: rusqlite::Error| DatabaseError::Migration {
        version: migration.version,
        description: migration.description,
        source,
    };

    let skip = match migration.step {
        Step::Script => false,
        Step::AddColumn { table, column } => column_exists(conn, table, column)?,
    };

    let tx = conn.unchecked_transaction().map_err(failed)?;
    if skip {
        log::info!(
            "Migration v{} ({}): column already present",
            migration.version,
            migration.description
        );
    } else {
        log::info!("Applying migration v{} ({})", migration.version, migration.description);
        tx.execute_batch(migration.sql).map_err(failed)?;
    }
    tx.execute(
        "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
        params![migration.version, migration.description],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    // PRAGMA arguments cannot be bound
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::UnsafeIdentifier(table.to_string()));
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
