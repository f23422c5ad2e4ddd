// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All access is serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use courier_core::CourierError;
use tracing::debug;

/// Handle to the SQLite database.
///
/// Cheap to clone; all clones share the same background connection thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run all
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, CourierError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(map_tr_err)?;

        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )?;
            crate::migrations::run_migrations(conn)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// Open an in-memory database. Used by tests and available for tooling.
    pub async fn open_in_memory() -> Result<Self, CourierError> {
        Self::open(":memory:").await
    }

    /// Returns the underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the background connection thread.
    pub async fn close(&self) -> Result<(), CourierError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.clone().close().await.map_err(map_tr_err)
    }
}

/// Map a tokio-rusqlite error into the workspace error type.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> CourierError {
    CourierError::Storage {
        source: Box::new(e),
    }
}

/// Current timestamp in the stored format (`2026-01-01T00:00:00.000Z`).
///
/// The same shape `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')` produces, so
/// application-written and SQL-written timestamps stay mutually comparable.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_runs_migrations_and_enables_foreign_keys() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let (fk, tables): (i64, i64) = db
            .connection()
            .call(|conn| {
                let fk = conn.query_row("PRAGMA foreign_keys;", [], |row| row.get(0))?;
                let tables = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master
                     WHERE type = 'table' AND name LIKE 'chat_%'",
                    [],
                    |row| row.get(0),
                )?;
                Ok((fk, tables))
            })
            .await
            .unwrap();

        assert_eq!(fk, 1);
        assert_eq!(tables, 3);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();

        // Second open must not re-apply migrations.
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }

    #[test]
    fn now_timestamp_matches_sqlite_shape() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'), "got {ts}");
        assert_eq!(ts.len(), "2026-01-01T00:00:00.000Z".len(), "got {ts}");
    }
}
