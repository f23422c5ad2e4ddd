// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job CRUD and status transitions.
//!
//! The status column moves through a one-way lattice; the `queued -> running`
//! transition is conditional so broker redeliveries observe prior terminal
//! states instead of silently re-running.

use courier_core::{CourierError, JobStatus};
use rusqlite::params;

use crate::database::Database;
use crate::models::Job;

const JOB_COLUMNS: &str = "id, user_id, session_id, prompt, idempotency_key, status, \
                           result_message_id, error, created_at, updated_at";

fn row_to_job(row: &rusqlite::Row<'_>) -> Result<Job, rusqlite::Error> {
    let status: String = row.get(5)?;
    let status = status.parse::<JobStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Job {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        prompt: row.get(3)?,
        idempotency_key: row.get(4)?,
        status,
        result_message_id: row.get(6)?,
        error: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn insert_job(conn: &rusqlite::Connection, job: &Job) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO chat_jobs
             (id, user_id, session_id, prompt, idempotency_key, status,
              result_message_id, error, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL, ?7, ?8)",
        params![
            job.id,
            job.user_id,
            job.session_id,
            job.prompt,
            job.idempotency_key,
            job.status.to_string(),
            job.created_at,
            job.updated_at,
        ],
    )?;
    Ok(())
}

/// Insert a new job row.
pub async fn create_job(db: &Database, job: &Job) -> Result<(), CourierError> {
    let job = job.clone();
    db.connection()
        .call(move |conn| {
            insert_job(conn, &job)?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a job by ID. Callers enforce ownership where it matters.
pub async fn get_job(db: &Database, job_id: &str) -> Result<Option<Job>, CourierError> {
    let job_id = job_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {JOB_COLUMNS} FROM chat_jobs WHERE id = ?1"),
                params![job_id],
                row_to_job,
            );
            match result {
                Ok(job) => Ok(Some(job)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Idempotent job create over `(user, idempotency_key)`.
///
/// Without a key this is a plain insert. With one, a unique-constraint
/// conflict fetches and returns the pre-existing job with `false`; only the
/// caller that observes `true` may enqueue the broker message.
pub async fn create_job_or_get(db: &Database, job: &Job) -> Result<(Job, bool), CourierError> {
    let job = job.clone();
    db.connection()
        .call(move |conn| {
            let has_key = job
                .idempotency_key
                .as_deref()
                .is_some_and(|k| !k.is_empty());
            match insert_job(conn, &job) {
                Ok(()) => Ok((job, true)),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation && has_key =>
                {
                    let existing = conn.query_row(
                        &format!(
                            "SELECT {JOB_COLUMNS} FROM chat_jobs
                             WHERE user_id = ?1 AND idempotency_key = ?2",
                        ),
                        params![job.user_id, job.idempotency_key],
                        row_to_job,
                    )?;
                    Ok((existing, false))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition `queued -> running`. Returns whether a row actually moved;
/// `false` means the job was absent or already past `queued`.
pub async fn mark_job_running(db: &Database, job_id: &str) -> Result<bool, CourierError> {
    let job_id = job_id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE chat_jobs
                 SET status = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2 AND status = ?3",
                params![
                    JobStatus::Running.to_string(),
                    job_id,
                    JobStatus::Queued.to_string(),
                ],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Terminal success: set the result message reference and clear any error.
pub async fn mark_job_succeeded(
    db: &Database,
    job_id: &str,
    result_message_id: i64,
) -> Result<(), CourierError> {
    let job_id = job_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE chat_jobs
                 SET status = ?1, result_message_id = ?2, error = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3",
                params![JobStatus::Succeeded.to_string(), result_message_id, job_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Terminal failure: record the error text and clear any result reference.
pub async fn mark_job_failed(
    db: &Database,
    job_id: &str,
    error: &str,
) -> Result<(), CourierError> {
    let job_id = job_id.to_string();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE chat_jobs
                 SET status = ?1, error = ?2, result_message_id = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3",
                params![JobStatus::Failed.to_string(), error, job_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::now_timestamp;
    use courier_core::new_id;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_job(user_id: i64, key: Option<&str>) -> Job {
        let now = now_timestamp();
        Job {
            id: new_id(),
            user_id,
            session_id: new_id(),
            prompt: "hello".to_string(),
            idempotency_key: key.map(String::from),
            status: JobStatus::Queued,
            result_message_id: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_and_get_job_roundtrips() {
        let (db, _dir) = setup_db().await;
        let job = make_job(1, None);

        create_job(&db, &job).await.unwrap();
        let got = get_job(&db, &job.id).await.unwrap().unwrap();
        assert_eq!(got.id, job.id);
        assert_eq!(got.status, JobStatus::Queued);
        assert!(got.result_message_id.is_none());
        assert!(got.error.is_none());

        assert!(get_job(&db, "01NOSUCHJOB000000000000000").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn create_or_get_coalesces_on_user_and_key() {
        let (db, _dir) = setup_db().await;

        let (first, created) = create_job_or_get(&db, &make_job(1, Some("k"))).await.unwrap();
        assert!(created);

        let (dup, created) = create_job_or_get(&db, &make_job(1, Some("k"))).await.unwrap();
        assert!(!created);
        assert_eq!(dup.id, first.id);

        // Same key, different user: separate job.
        let (other, created) = create_job_or_get(&db, &make_job(2, Some("k"))).await.unwrap();
        assert!(created);
        assert_ne!(other.id, first.id);

        // No key: always a new row.
        let (a, _) = create_job_or_get(&db, &make_job(1, None)).await.unwrap();
        let (b, _) = create_job_or_get(&db, &make_job(1, None)).await.unwrap();
        assert_ne!(a.id, b.id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn running_transition_only_fires_from_queued() {
        let (db, _dir) = setup_db().await;
        let job = make_job(1, None);
        create_job(&db, &job).await.unwrap();

        assert!(mark_job_running(&db, &job.id).await.unwrap());
        // Second attempt observes the job is no longer queued.
        assert!(!mark_job_running(&db, &job.id).await.unwrap());
        // Absent job transitions nothing.
        assert!(!mark_job_running(&db, "01NOSUCHJOB000000000000000").await.unwrap());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn terminal_states_are_mutually_exclusive() {
        let (db, _dir) = setup_db().await;
        let job = make_job(1, None);
        create_job(&db, &job).await.unwrap();

        mark_job_failed(&db, &job.id, "provider exploded").await.unwrap();
        let got = get_job(&db, &job.id).await.unwrap().unwrap();
        assert_eq!(got.status, JobStatus::Failed);
        assert_eq!(got.error.as_deref(), Some("provider exploded"));
        assert!(got.result_message_id.is_none());

        mark_job_succeeded(&db, &job.id, 42).await.unwrap();
        let got = get_job(&db, &job.id).await.unwrap().unwrap();
        assert_eq!(got.status, JobStatus::Succeeded);
        assert_eq!(got.result_message_id, Some(42));
        assert!(got.error.is_none());

        db.close().await.unwrap();
    }
}
