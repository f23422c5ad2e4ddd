// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The streaming chat endpoint.
//!
//! Translates the service's event channel into SSE frames, interleaving a
//! 15-second heartbeat so intermediaries keep the connection open:
//!
//! ```text
//! event: chunk
//! data: {"type":"chunk","delta":"<text>"}
//!
//! event: ping
//! data: {"type":"ping","ts":<unix>}
//!
//! event: done
//! data: {"type":"done","message_id":<id>}
//! ```
//!
//! An `error` frame is terminal. When the client disconnects, axum drops
//! this stream; the producer notices its closed channel and stops.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval};

use courier_chat::StreamEvent;
use courier_core::CourierError;

use crate::auth::AuthUser;
use crate::envelope::{codes, fail};
use crate::handlers::{idempotency_key, validate_send_request, SendMessageRequest};
use crate::server::GatewayState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// POST /chat/messages/stream
pub async fn stream_message(
    State(state): State<GatewayState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    headers: HeaderMap,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return fail(StatusCode::BAD_REQUEST, codes::INVALID_JSON, "invalid json");
    };
    if let Err(response) = validate_send_request(&body) {
        return response;
    }
    let key = match idempotency_key(&headers) {
        Ok(key) => key,
        Err(response) => return response,
    };

    let rx = state.service.send_message_stream(
        user_id,
        &body.session_id,
        &body.message,
        key.as_deref(),
    );

    let response_headers = [
        (header::CACHE_CONTROL, "no-cache"),
        (header::CONNECTION, "keep-alive"),
        (HeaderName::from_static("x-accel-buffering"), "no"),
    ];
    (response_headers, Sse::new(event_stream(rx))).into_response()
}

/// Select between service events and the heartbeat ticker until a terminal
/// event. Every frame is flushed by the SSE body as it is produced.
fn event_stream(
    rx: mpsc::Receiver<StreamEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    // interval() would tick immediately; delay the first heartbeat.
    let ticker = interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);

    futures::stream::unfold(
        (rx, ticker, false),
        |(mut rx, mut ticker, finished): (mpsc::Receiver<StreamEvent>, Interval, bool)| async move {
            if finished {
                return None;
            }
            tokio::select! {
                event = rx.recv() => match event {
                    Some(StreamEvent::Chunk(delta)) => {
                        Some((Ok(chunk_event(&delta)), (rx, ticker, false)))
                    }
                    Some(StreamEvent::Done { message_id }) => {
                        Some((Ok(done_event(message_id)), (rx, ticker, true)))
                    }
                    Some(StreamEvent::Error(err)) => {
                        Some((Ok(error_event(&err)), (rx, ticker, true)))
                    }
                    // Producer gone without a terminal event; end the stream.
                    None => None,
                },
                _ = ticker.tick() => {
                    Some((Ok(ping_event()), (rx, ticker, false)))
                }
            }
        },
    )
}

fn chunk_event(delta: &str) -> Event {
    Event::default()
        .event("chunk")
        .data(serde_json::json!({"type": "chunk", "delta": delta}).to_string())
}

fn ping_event() -> Event {
    Event::default().event("ping").data(
        serde_json::json!({"type": "ping", "ts": chrono::Utc::now().timestamp()}).to_string(),
    )
}

fn done_event(message_id: i64) -> Event {
    Event::default()
        .event("done")
        .data(serde_json::json!({"type": "done", "message_id": message_id}).to_string())
}

fn error_event(err: &CourierError) -> Event {
    let message = if err.is_not_found() {
        "session not found".to_string()
    } else {
        err.to_string()
    };
    Event::default()
        .event("error")
        .data(serde_json::json!({"type": "error", "message": message}).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Render a scripted event sequence to the raw SSE body text.
    async fn collect_frames(events: Vec<StreamEvent>) -> String {
        let (tx, rx) = mpsc::channel(16);
        for event in events {
            tx.send(event).await.unwrap();
        }
        drop(tx);

        let response = Sse::new(event_stream(rx)).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn chunks_then_done_render_in_order() {
        let frames = collect_frames(vec![
            StreamEvent::Chunk("Hel".into()),
            StreamEvent::Chunk("lo".into()),
            StreamEvent::Done { message_id: 7 },
        ])
        .await;

        assert!(frames.contains("event: chunk\ndata: {\"type\":\"chunk\",\"delta\":\"Hel\"}"));
        assert!(frames.contains("data: {\"type\":\"chunk\",\"delta\":\"lo\"}"));
        assert!(frames.contains("event: done\ndata: {\"type\":\"done\",\"message_id\":7}"));
        let chunk_pos = frames.find("event: chunk").unwrap();
        let done_pos = frames.find("event: done").unwrap();
        assert!(chunk_pos < done_pos);
    }

    #[tokio::test]
    async fn error_event_is_terminal() {
        let frames = collect_frames(vec![
            StreamEvent::Error(CourierError::NotFound { entity: "session" }),
            // Anything after a terminal event must not be rendered.
            StreamEvent::Chunk("late".into()),
        ])
        .await;

        assert!(frames.contains("event: error"));
        assert!(frames.contains("session not found"));
        assert!(!frames.contains("late"));
    }
}
