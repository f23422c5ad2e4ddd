// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Language-model provider adapters for the Courier inference broker.
//!
//! Two concrete adapters share the [`Provider`](courier_core::Provider)
//! contract: [`OllamaProvider`] (NDJSON streaming against a self-hosted
//! backend) and [`OpenRouterProvider`] (SSE against an OpenAI-compatible
//! API). [`ProviderRegistry`] routes a session's provider name to a factory
//! that materializes a client for its configured model.

pub mod ollama;
pub mod openrouter;
pub mod registry;

pub use ollama::OllamaProvider;
pub use openrouter::OpenRouterProvider;
pub use registry::{ProviderFactory, ProviderRegistry};

use courier_core::CourierError;

/// Upper bound on how much of an error response body is kept as error text.
pub(crate) const MAX_ERROR_BODY_BYTES: usize = 4 * 1024;

/// Streaming frames may carry long JSON lines; accept up to this many bytes.
pub(crate) const MAX_LINE_BYTES: usize = 2 * 1024 * 1024;

/// Timeout for blocking chat calls. Streaming calls have no overall timeout;
/// dropping the stream aborts the request.
pub(crate) const CHAT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(90);

/// Convert a non-2xx response into a terminal provider error, keeping at
/// most [`MAX_ERROR_BODY_BYTES`] of the body as the error text.
pub(crate) async fn status_error(
    provider: &str,
    response: reqwest::Response,
) -> CourierError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let mut msg = body.trim().to_string();
    if msg.len() > MAX_ERROR_BODY_BYTES {
        let mut cut = MAX_ERROR_BODY_BYTES;
        while !msg.is_char_boundary(cut) {
            cut -= 1;
        }
        msg.truncate(cut);
    }
    if msg.is_empty() {
        msg = format!("status {}", status.as_u16());
    }
    CourierError::Provider {
        message: format!("{provider}: {msg}"),
        source: None,
    }
}
