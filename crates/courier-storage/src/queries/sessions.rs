// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD operations.
//!
//! Every read is scoped to an owner; a session that exists but belongs to a
//! different user is reported as not-found.

use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;
use crate::models::Session;

const SESSION_COLUMNS: &str =
    "id, session_id, user_id, provider, model, title, created_at, updated_at";

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session, rusqlite::Error> {
    Ok(Session {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_id: row.get(2)?,
        provider: row.get(3)?,
        model: row.get(4)?,
        title: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Insert a new session row with a caller-supplied external ID.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), CourierError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO chat_sessions
                     (session_id, user_id, provider, model, title, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    session.session_id,
                    session.user_id,
                    session.provider,
                    session.model,
                    session.title,
                    session.created_at,
                    session.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a session by its external ID, scoped to `user_id`.
pub async fn get_session(
    db: &Database,
    user_id: i64,
    session_id: &str,
) -> Result<Session, CourierError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM chat_sessions
                 WHERE session_id = ?1 AND user_id = ?2",
            ))?;
            let result = stmt.query_row(params![session_id, user_id], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?
        .ok_or(CourierError::NotFound { entity: "session" })
}

/// List a user's sessions, most recently active first.
///
/// Keyset paginated: `before_id > 0` selects rows with a primary key below
/// it, so concatenating pages walks strictly backwards.
pub async fn list_sessions(
    db: &Database,
    user_id: i64,
    limit: i64,
    before_id: i64,
) -> Result<Vec<Session>, CourierError> {
    db.connection()
        .call(move |conn| {
            let mut sessions = Vec::new();
            if before_id > 0 {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM chat_sessions
                     WHERE user_id = ?1 AND id < ?2
                     ORDER BY updated_at DESC, id DESC LIMIT ?3",
                ))?;
                let rows = stmt.query_map(params![user_id, before_id, limit], row_to_session)?;
                for row in rows {
                    sessions.push(row?);
                }
            } else {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM chat_sessions
                     WHERE user_id = ?1
                     ORDER BY updated_at DESC, id DESC LIMIT ?2",
                ))?;
                let rows = stmt.query_map(params![user_id, limit], row_to_session)?;
                for row in rows {
                    sessions.push(row?);
                }
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Overwrite a session's title and bump `updated_at`.
pub async fn update_session_title(
    db: &Database,
    user_id: i64,
    session_id: &str,
    title: &str,
) -> Result<(), CourierError> {
    let session_id = session_id.to_string();
    let title = title.to_string();
    let affected = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE chat_sessions
                 SET title = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE session_id = ?2 AND user_id = ?3",
                params![title, session_id, user_id],
            )?;
            Ok(n)
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if affected == 0 {
        return Err(CourierError::NotFound { entity: "session" });
    }
    Ok(())
}

/// Bump a session's `updated_at`. Called on any message activity so the
/// session list surfaces recently active conversations first.
pub async fn touch_session(db: &Database, session_id: &str) -> Result<(), CourierError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE chat_sessions
                 SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a session; messages cascade with it.
pub async fn delete_session(
    db: &Database,
    user_id: i64,
    session_id: &str,
) -> Result<(), CourierError> {
    let session_id = session_id.to_string();
    let affected = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM chat_sessions WHERE session_id = ?1 AND user_id = ?2",
                params![session_id, user_id],
            )?;
            Ok(n)
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if affected == 0 {
        return Err(CourierError::NotFound { entity: "session" });
    }
    Ok(())
}
