// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Courier inference broker.
//!
//! An axum server exposing the chat surface behind bearer-token auth, with
//! the `{code, message, data}` response envelope and a line-framed SSE
//! endpoint for streaming replies.

pub mod auth;
pub mod envelope;
pub mod handlers;
pub mod request_id;
pub mod server;
pub mod sse;

pub use auth::AuthState;
pub use server::{build_router, serve, GatewayState};
