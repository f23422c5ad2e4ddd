// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router assembly and the HTTP server lifecycle.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Router};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use courier_chat::ChatService;
use courier_core::CourierError;

use crate::auth::{auth_middleware, AuthState};
use crate::handlers;
use crate::request_id::request_id_middleware;
use crate::sse;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub service: Arc<ChatService>,
    pub auth: AuthState,
    /// Provider a session routes to when the request names none.
    pub default_provider: String,
}

/// Build the full route tree: a public health route plus the authenticated
/// chat surface, with request-ID and CORS layers over everything.
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/ping", get(handlers::ping))
        .with_state(state.clone());

    let chat_routes = Router::new()
        .route(
            "/chat/sessions",
            post(handlers::create_session).get(handlers::list_sessions),
        )
        .route(
            "/chat/sessions/:session_id",
            axum::routing::patch(handlers::update_session_title)
                .delete(handlers::delete_session),
        )
        .route("/chat/messages", post(handlers::send_message))
        .route("/chat/messages/stream", post(sse::stream_message))
        .route("/chat/messages/async", post(handlers::send_message_async))
        .route(
            "/chat/sessions/:session_id/messages",
            get(handlers::list_messages),
        )
        .route("/chat/jobs/:job_id", get(handlers::get_job))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(chat_routes)
        .fallback(handlers::route_not_found)
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the token is cancelled.
pub async fn serve(
    addr: &str,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), CourierError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CourierError::Internal(format!("failed to bind {addr}: {e}")))?;

    info!(addr, "gateway listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| CourierError::Internal(format!("gateway server error: {e}")))
}
