// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message append and listing operations.

use courier_core::{CourierError, Role};
use rusqlite::params;

use crate::database::{now_timestamp, Database};
use crate::models::Message;

const MESSAGE_COLUMNS: &str =
    "id, session_id, user_id, role, content, idempotency_key, created_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, rusqlite::Error> {
    Ok(Message {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_id: row.get(2)?,
        role: row.get(3)?,
        content: row.get(4)?,
        idempotency_key: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Append a message. Returns the new row's primary key.
pub async fn insert_message(
    db: &Database,
    user_id: i64,
    session_id: &str,
    role: Role,
    content: &str,
) -> Result<i64, CourierError> {
    let session_id = session_id.to_string();
    let role = role.to_string();
    let content = content.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO chat_messages
                     (session_id, user_id, role, content, idempotency_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
                params![session_id, user_id, role, content, now_timestamp()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List messages newest-first; `before_id > 0` selects older pages.
pub async fn list_messages(
    db: &Database,
    user_id: i64,
    session_id: &str,
    limit: i64,
    before_id: i64,
) -> Result<Vec<Message>, CourierError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut messages = Vec::new();
            if before_id > 0 {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM chat_messages
                     WHERE user_id = ?1 AND session_id = ?2 AND id < ?3
                     ORDER BY id DESC LIMIT ?4",
                ))?;
                let rows = stmt.query_map(
                    params![user_id, session_id, before_id, limit],
                    row_to_message,
                )?;
                for row in rows {
                    messages.push(row?);
                }
            } else {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM chat_messages
                     WHERE user_id = ?1 AND session_id = ?2
                     ORDER BY id DESC LIMIT ?3",
                ))?;
                let rows =
                    stmt.query_map(params![user_id, session_id, limit], row_to_message)?;
                for row in rows {
                    messages.push(row?);
                }
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The most recent `limit` messages, newest first. Feeds provider context.
pub async fn list_recent_messages(
    db: &Database,
    user_id: i64,
    session_id: &str,
    limit: i64,
) -> Result<Vec<Message>, CourierError> {
    let limit = if limit <= 0 { 20 } else { limit };
    list_messages(db, user_id, session_id, limit, 0).await
}

/// Idempotent user-message insert.
///
/// With a key, a duplicate `(user, session, key)` submission returns the
/// pre-existing row and `false`. Without a key the insert is unconditional.
pub async fn insert_user_message_or_get(
    db: &Database,
    user_id: i64,
    session_id: &str,
    content: &str,
    idempotency_key: Option<&str>,
) -> Result<(Message, bool), CourierError> {
    let session_id = session_id.to_string();
    let content = content.to_string();
    let key = idempotency_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from);
    db.connection()
        .call(move |conn| {
            let role = Role::User.to_string();
            let result = conn.execute(
                "INSERT INTO chat_messages
                     (session_id, user_id, role, content, idempotency_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![session_id, user_id, role, content, key, now_timestamp()],
            );
            match result {
                Ok(_) => {
                    let id = conn.last_insert_rowid();
                    let msg = conn.query_row(
                        &format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE id = ?1"),
                        params![id],
                        row_to_message,
                    )?;
                    Ok((msg, true))
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation
                        && key.is_some() =>
                {
                    let msg = conn.query_row(
                        &format!(
                            "SELECT {MESSAGE_COLUMNS} FROM chat_messages
                             WHERE user_id = ?1 AND session_id = ?2
                               AND idempotency_key = ?3 AND role = ?4",
                        ),
                        params![user_id, session_id, key, role],
                        row_to_message,
                    )?;
                    Ok((msg, false))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::sessions::{create_session, delete_session, tests::make_session};
    use tempfile::tempdir;

    async fn setup_db_with_session(user_id: i64) -> (Database, String, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let session = make_session(user_id);
        create_session(&db, &session).await.unwrap();
        (db, session.session_id, dir)
    }

    #[tokio::test]
    async fn insert_assigns_strictly_increasing_ids() {
        let (db, sid, _dir) = setup_db_with_session(1).await;

        let a = insert_message(&db, 1, &sid, Role::User, "one").await.unwrap();
        let b = insert_message(&db, 1, &sid, Role::Assistant, "two")
            .await
            .unwrap();
        let c = insert_message(&db, 1, &sid, Role::User, "three").await.unwrap();
        assert!(a < b && b < c);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_messages_pages_strictly_backwards() {
        let (db, sid, _dir) = setup_db_with_session(1).await;
        for i in 0..7 {
            insert_message(&db, 1, &sid, Role::User, &format!("m{i}"))
                .await
                .unwrap();
        }

        let page1 = list_messages(&db, 1, &sid, 3, 0).await.unwrap();
        assert_eq!(page1.len(), 3);
        let page2 = list_messages(&db, 1, &sid, 3, page1.last().unwrap().id)
            .await
            .unwrap();
        assert_eq!(page2.len(), 3);

        let mut ids: Vec<i64> = page1.iter().chain(page2.iter()).map(|m| m.id).collect();
        let sorted = {
            let mut s = ids.clone();
            s.sort_unstable_by(|a, b| b.cmp(a));
            s
        };
        assert_eq!(ids, sorted, "concatenated pages must strictly decrease");
        ids.dedup();
        assert_eq!(ids.len(), 6, "no row may repeat across pages");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn recent_messages_defaults_to_twenty() {
        let (db, sid, _dir) = setup_db_with_session(1).await;
        for i in 0..25 {
            insert_message(&db, 1, &sid, Role::User, &format!("m{i}"))
                .await
                .unwrap();
        }

        let recent = list_recent_messages(&db, 1, &sid, 0).await.unwrap();
        assert_eq!(recent.len(), 20);
        assert_eq!(recent[0].content, "m24");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn idempotent_insert_returns_existing_row() {
        let (db, sid, _dir) = setup_db_with_session(1).await;

        let (first, created) =
            insert_user_message_or_get(&db, 1, &sid, "hello", Some("key-1"))
                .await
                .unwrap();
        assert!(created);

        let (second, created) =
            insert_user_message_or_get(&db, 1, &sid, "hello again", Some("key-1"))
                .await
                .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.content, "hello");

        // A different key inserts a new row.
        let (third, created) =
            insert_user_message_or_get(&db, 1, &sid, "hello", Some("key-2"))
                .await
                .unwrap();
        assert!(created);
        assert_ne!(third.id, first.id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_key_always_inserts() {
        let (db, sid, _dir) = setup_db_with_session(1).await;

        let (a, _) = insert_user_message_or_get(&db, 1, &sid, "x", None).await.unwrap();
        let (b, _) = insert_user_message_or_get(&db, 1, &sid, "x", None).await.unwrap();
        assert_ne!(a.id, b.id);

        // Blank keys are treated as absent.
        let (c, created) =
            insert_user_message_or_get(&db, 1, &sid, "x", Some("  ")).await.unwrap();
        assert!(created);
        assert!(c.idempotency_key.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn deleting_session_cascades_messages() {
        let (db, sid, _dir) = setup_db_with_session(1).await;
        insert_message(&db, 1, &sid, Role::User, "doomed").await.unwrap();

        delete_session(&db, 1, &sid).await.unwrap();

        let rows = list_messages(&db, 1, &sid, 10, 0).await.unwrap();
        assert!(rows.is_empty());

        db.close().await.unwrap();
    }
}
