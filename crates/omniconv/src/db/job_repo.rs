//! Persistence for the `jobs` table.
//!
//! Each row carries the job serialized as one JSON document, plus status
//! and timestamp columns the queries filter and sort on.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// One row of the `jobs` table.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub document: String,
}

impl JobRow {
    // Column order matches the SELECT lists below.
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            status: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
            document: row.get(4)?,
        })
    }
}

/// Writes a job row, replacing any previous version of the same job. The
/// engine writes through on every transition, so the whole document
/// travels each time and `created_at` survives the conflict.
pub fn upsert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, status, created_at, updated_at, document)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 updated_at = excluded.updated_at,
                 document = excluded.document",
            params![job.id, job.status, job.created_at, job.updated_at, job.document],
        )?;
        Ok(())
    })
}

/// Looks up one job by id.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT id, status, created_at, updated_at, document
                 FROM jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// All jobs in `status`, oldest first. Restore-on-startup walks these in
/// creation order.
pub fn load_by_status(db: &Database, status: &str) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, status, created_at, updated_at, document
             FROM jobs WHERE status = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![status], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// The `limit` most recently created jobs, newest first.
pub fn load_recent(db: &Database, limit: u64) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, status, created_at, updated_at, document
             FROM jobs ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Number of jobs currently in `status`.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?)
    })
}
