//! Embedded schema migrations.
//!
//! Each migration is a `(version, sql)` pair applied inside its own
//! transaction; the `schema_migrations` table records which versions have
//! already run, so reopening a database is a no-op.

use rusqlite::Connection;

use super::error::DatabaseError;

/// V1: the jobs table. One serialized job document per row, with status
/// and timestamps mirrored into indexed columns so restores and listings
/// can filter without parsing JSON.
const V1_JOBS: &str = r#"
CREATE TABLE jobs (
    id         TEXT PRIMARY KEY,
    status     TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    document   TEXT NOT NULL
);

CREATE INDEX idx_jobs_status ON jobs(status);
CREATE INDEX idx_jobs_created_at ON jobs(created_at);
"#;

const MIGRATIONS: &[(i64, &str)] = &[(1, V1_JOBS)];

/// Brings `conn` up to the latest schema version.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )?;

    for &(version, sql) in MIGRATIONS {
        let applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
            [version],
            |row| row.get(0),
        )?;
        if applied {
            continue;
        }

        log::info!("Applying schema migration v{}", version);
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql).map_err(|e| DatabaseError::Migration {
            version,
            reason: e.to_string(),
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        conn
    }

    #[test]
    fn test_fresh_database_records_every_version() {
        let conn = fresh();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_rerun_is_a_no_op() {
        let conn = fresh();
        run_all(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_jobs_table_accepts_a_row() {
        let conn = fresh();
        conn.execute(
            "INSERT INTO jobs (id, status, created_at, updated_at, document)
             VALUES ('j1', 'queued', '2026-02-01T00:00:00Z', '2026-02-01T00:00:00Z', '{}')",
            [],
        )
        .unwrap();

        let status: String = conn
            .query_row("SELECT status FROM jobs WHERE id = 'j1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(status, "queued");
    }
}
