// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST handlers for the chat surface.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::error;

use courier_core::{CourierError, JobStatus};
use courier_storage::{Job, Message, Session};

use crate::auth::AuthUser;
use crate::envelope::{codes, fail, ok};
use crate::server::GatewayState;

const MAX_IDEMPOTENCY_KEY_BYTES: usize = 128;

// ---- request bodies and queries ----

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTitleRequest {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub before_id: i64,
}

// ---- response views ----

/// Session as exposed over the API: the numeric primary key stays internal
/// (it only surfaces as the opaque `next_before_id` cursor).
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub provider: String,
    pub model: String,
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Session> for SessionView {
    fn from(s: &Session) -> Self {
        Self {
            session_id: s.session_id.clone(),
            provider: s.provider.clone(),
            model: s.model.clone(),
            title: s.title.clone(),
            created_at: s.created_at.clone(),
            updated_at: s.updated_at.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

impl From<&Message> for MessageView {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id,
            session_id: m.session_id.clone(),
            role: m.role.clone(),
            content: m.content.clone(),
            created_at: m.created_at.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: String,
    pub session_id: String,
    pub status: JobStatus,
    pub result_message_id: Option<i64>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Job> for JobView {
    fn from(j: &Job) -> Self {
        Self {
            id: j.id.clone(),
            session_id: j.session_id.clone(),
            status: j.status,
            result_message_id: j.result_message_id,
            error: j.error.clone(),
            created_at: j.created_at.clone(),
            updated_at: j.updated_at.clone(),
        }
    }
}

// ---- shared helpers ----

/// Read and validate the optional `Idempotency-Key` header (<= 128 bytes).
pub(crate) fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, Response> {
    let Some(value) = headers.get("idempotency-key") else {
        return Ok(None);
    };
    let Ok(key) = value.to_str() else {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            codes::INVALID_FIELD,
            "invalid idempotency key",
        ));
    };
    let key = key.trim();
    if key.len() > MAX_IDEMPOTENCY_KEY_BYTES {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            codes::IDEMPOTENCY_KEY_TOO_LONG,
            "idempotency key too long",
        ));
    }
    if key.is_empty() {
        return Ok(None);
    }
    Ok(Some(key.to_string()))
}

fn session_error(context: &str, err: CourierError) -> Response {
    match err {
        CourierError::NotFound { .. } => fail(
            StatusCode::NOT_FOUND,
            codes::SESSION_NOT_FOUND,
            "session not found",
        ),
        CourierError::Validation(msg) => {
            fail(StatusCode::BAD_REQUEST, codes::INVALID_FIELD, &msg)
        }
        err => {
            error!(context, error = %err, "request failed");
            fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                "internal error",
            )
        }
    }
}

// ---- handlers ----

/// GET /ping
pub async fn ping() -> Response {
    ok(serde_json::json!({"message": "pong"}))
}

/// POST /chat/sessions
pub async fn create_session(
    State(state): State<GatewayState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Response {
    // An absent or empty body is fine; everything defaults.
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let provider = body
        .provider
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(&state.default_provider);
    let model = body.model.as_deref().unwrap_or("");

    match state.service.create_session(user_id, provider, model).await {
        Ok(session) => ok(serde_json::json!({"session_id": session.session_id})),
        Err(err) => {
            error!(error = %err, "failed to create session");
            fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                "failed to create session",
            )
        }
    }
}

/// GET /chat/sessions?limit&before_id
pub async fn list_sessions(
    State(state): State<GatewayState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Response {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    match state
        .service
        .list_sessions(user_id, query.limit, query.before_id)
        .await
    {
        Ok(sessions) => {
            let next_before_id = sessions.last().map(|s| s.id);
            let views: Vec<SessionView> = sessions.iter().map(SessionView::from).collect();
            ok(serde_json::json!({
                "sessions": views,
                "next_before_id": next_before_id,
            }))
        }
        Err(err) => session_error("list sessions", err),
    }
}

/// PATCH /chat/sessions/:session_id
pub async fn update_session_title(
    State(state): State<GatewayState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(session_id): Path<String>,
    body: Result<Json<UpdateTitleRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return fail(StatusCode::BAD_REQUEST, codes::INVALID_JSON, "invalid json");
    };
    match state
        .service
        .update_session_title(user_id, &session_id, &body.title)
        .await
    {
        Ok(title) => ok(serde_json::json!({"session_id": session_id, "title": title})),
        Err(err) => session_error("update session title", err),
    }
}

/// DELETE /chat/sessions/:session_id
pub async fn delete_session(
    State(state): State<GatewayState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> Response {
    match state.service.delete_session(user_id, &session_id).await {
        Ok(()) => ok(serde_json::json!({"session_id": session_id, "deleted": true})),
        Err(err) => session_error("delete session", err),
    }
}

/// POST /chat/messages
pub async fn send_message(
    State(state): State<GatewayState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return fail(StatusCode::BAD_REQUEST, codes::INVALID_JSON, "invalid json");
    };
    if let Err(response) = validate_send_request(&body) {
        return response;
    }

    match state
        .service
        .send_message(user_id, &body.session_id, &body.message)
        .await
    {
        Ok((reply, message_id)) => ok(serde_json::json!({
            "session_id": body.session_id,
            "reply": reply,
            "message_id": message_id,
        })),
        Err(CourierError::NotFound { .. }) => fail(
            StatusCode::NOT_FOUND,
            codes::SESSION_NOT_FOUND,
            "session not found",
        ),
        Err(err) => {
            error!(error = %err, "failed to send message");
            fail(
                StatusCode::BAD_REQUEST,
                codes::SEND_FAILED,
                "failed to send message",
            )
        }
    }
}

/// POST /chat/messages/async
pub async fn send_message_async(
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

    match state
        .service
        .submit_job(user_id, &body.session_id, &body.message, key.as_deref())
        .await
    {
        Ok((job_id, _created)) => ok(serde_json::json!({"job_id": job_id})),
        Err(CourierError::NotFound { .. }) => fail(
            StatusCode::NOT_FOUND,
            codes::SESSION_NOT_FOUND,
            "session not found",
        ),
        Err(CourierError::Broker { .. }) => fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::ENQUEUE_FAILED,
            "enqueue failed",
        ),
        Err(err) => session_error("submit job", err),
    }
}

/// GET /chat/jobs/:job_id
pub async fn get_job(
    State(state): State<GatewayState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(job_id): Path<String>,
) -> Response {
    match state.service.get_job(user_id, &job_id).await {
        Ok(job) => ok(serde_json::json!({"job": JobView::from(&job)})),
        Err(CourierError::NotFound { .. }) => fail(
            StatusCode::NOT_FOUND,
            codes::JOB_NOT_FOUND,
            "job not found",
        ),
        Err(err) => session_error("get job", err),
    }
}

/// GET /chat/sessions/:session_id/messages?limit&before_id
pub async fn list_messages(
    State(state): State<GatewayState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(session_id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Response {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    match state
        .service
        .list_messages(user_id, &session_id, query.limit, query.before_id)
        .await
    {
        Ok(messages) => {
            let next_before_id = messages.last().map(|m| m.id);
            let views: Vec<MessageView> = messages.iter().map(MessageView::from).collect();
            ok(serde_json::json!({
                "messages": views,
                "next_before_id": next_before_id,
            }))
        }
        Err(err) => session_error("list messages", err),
    }
}

/// Fallback for unknown routes.
pub async fn route_not_found() -> Response {
    fail(
        StatusCode::NOT_FOUND,
        codes::ROUTE_NOT_FOUND,
        "route not found",
    )
}

pub(crate) fn validate_send_request(body: &SendMessageRequest) -> Result<(), Response> {
    if body.session_id.trim().is_empty() {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            codes::INVALID_FIELD,
            "session_id required",
        ));
    }
    if body.message.trim().is_empty() {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            codes::INVALID_FIELD,
            "message required",
        ));
    }
    Ok(())
}
