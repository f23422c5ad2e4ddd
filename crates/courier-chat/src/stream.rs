// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming inference producer.
//!
//! The producer multiplexes an upstream provider stream onto a bounded
//! event channel: zero or more chunks, then exactly one terminal event. The
//! assistant message is persisted only after the provider stream completes
//! without error, so an aborted or failed stream leaves no assistant row.
//!
//! Cancellation is receiver-driven: when the HTTP handler's stream is
//! dropped, the next channel send fails and the producer stops consuming
//! the provider.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use courier_core::{CourierError, Role};
use courier_providers::ProviderRegistry;
use courier_storage::queries::{messages, sessions};
use courier_storage::Database;

use crate::service::build_context;

/// One event on the streaming channel.
///
/// A well-formed stream is `Chunk* (Done | Error)`; the channel closes after
/// the terminal event.
#[derive(Debug)]
pub enum StreamEvent {
    /// A non-empty textual delta, in provider order.
    Chunk(String),
    /// The stream completed; the assistant message was persisted.
    Done { message_id: i64 },
    /// Terminal failure; no assistant message was persisted.
    Error(CourierError),
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_stream(
    db: Database,
    registry: Arc<ProviderRegistry>,
    context_window: usize,
    user_id: i64,
    session_id: String,
    content: String,
    idempotency_key: Option<String>,
    tx: mpsc::Sender<StreamEvent>,
) {
    if let Err(e) = produce(
        &db,
        &registry,
        context_window,
        user_id,
        &session_id,
        &content,
        idempotency_key.as_deref(),
        &tx,
    )
    .await
    {
        // A send failure here means the client is gone; nothing to report.
        let _ = tx.send(StreamEvent::Error(e)).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn produce(
    db: &Database,
    registry: &ProviderRegistry,
    context_window: usize,
    user_id: i64,
    session_id: &str,
    content: &str,
    idempotency_key: Option<&str>,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<(), CourierError> {
    let session = sessions::get_session(db, user_id, session_id).await?;

    messages::insert_user_message_or_get(db, user_id, session_id, content, idempotency_key)
        .await?;
    sessions::touch_session(db, session_id).await?;

    let context = build_context(db, context_window, user_id, session_id).await?;
    let provider = registry.get(&session.provider, &session.model)?;
    if !provider.supports_streaming() {
        return Err(CourierError::Provider {
            message: "provider does not support streaming".into(),
            source: None,
        });
    }

    let mut chunks = provider.stream_chat(&context).await?;
    let mut reply = String::new();

    while let Some(item) = chunks.next().await {
        let chunk = item?;
        reply.push_str(&chunk);
        if tx.send(StreamEvent::Chunk(chunk)).await.is_err() {
            debug!(session_id, "stream client went away, aborting");
            return Ok(());
        }
    }

    if reply.is_empty() {
        return Err(CourierError::Provider {
            message: "provider returned an empty completion".into(),
            source: None,
        });
    }

    let message_id =
        messages::insert_message(db, user_id, session_id, Role::Assistant, &reply).await?;
    sessions::touch_session(db, session_id).await?;

    if tx.send(StreamEvent::Done { message_id }).await.is_err() {
        // Persisted but undeliverable: the row stands, the client re-reads.
        warn!(session_id, message_id, "done event undeliverable");
    }
    Ok(())
}
