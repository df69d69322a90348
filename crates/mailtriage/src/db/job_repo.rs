//! Job repository: row-level operations on the `jobs` table.
//!
//! Terminal transitions are conditional on `status = 'PROCESSING'` and report
//! the number of rows they touched. Interpreting a zero is left to the store.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

const PROCESSING: &str = "PROCESSING";

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub owner_id: String,
    pub original_text: String,
    pub file_reference: Option<String>,
    pub category: Option<String>,
    pub generated_reply: Option<String>,
    pub confidence: Option<f64>,
    pub status: String,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            original_text: row.get("original_text")?,
            file_reference: row.get("file_reference")?,
            category: row.get("category")?,
            generated_reply: row.get("generated_reply")?,
            confidence: row.get("confidence")?,
            status: row.get("status")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, owner_id, original_text, file_reference, category,
             generated_reply, confidence, status, error, created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                job.id,
                job.owner_id,
                job.original_text,
                job.file_reference,
                job.category,
                job.generated_reply,
                job.confidence,
                job.status,
                job.error,
                job.created_at,
                job.updated_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists an owner's jobs, newest first.
pub fn list_by_owner(db: &Database, owner_id: &str) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE owner_id = ?1 ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map(params![owner_id], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Writes the inference result and flips the job to `COMPLETED` in a single
/// statement. Returns the number of rows updated (0 or 1).
pub fn mark_completed(
    db: &Database,
    id: &str,
    category: &str,
    confidence: Option<f64>,
    generated_reply: &str,
    now: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE jobs SET category = ?2, confidence = ?3, generated_reply = ?4,
             status = 'COMPLETED', error = NULL, updated_at = ?5, completed_at = ?5
             WHERE id = ?1 AND status = ?6",
            params![id, category, confidence, generated_reply, now, PROCESSING],
        )?;
        Ok(updated)
    })
}

/// Flips the job to `FAILED` with an error message. Result fields are left
/// untouched. Returns the number of rows updated (0 or 1).
pub fn mark_failed(db: &Database, id: &str, error: &str, now: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE jobs SET status = 'FAILED', error = ?2, updated_at = ?3, completed_at = ?3
             WHERE id = ?1 AND status = ?4",
            params![id, error, now, PROCESSING],
        )?;
        Ok(updated)
    })
}

/// Returns the stored status of a job, if the job exists.
pub fn status_of(db: &Database, id: &str) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT status FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], |r| r.get::<_, String>(0))?;
        match rows.next() {
            Some(Ok(status)) => Ok(Some(status)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
