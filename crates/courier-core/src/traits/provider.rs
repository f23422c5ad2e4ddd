// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider trait for language-model backends.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::CourierError;
use crate::types::ChatMessage;

/// A lazy sequence of textual deltas from a streaming provider.
///
/// Yields zero or more non-empty chunks in provider-sent order, then either
/// ends cleanly or yields exactly one terminal `Err` item. Chunks delivered
/// before a terminal error remain valid.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, CourierError>> + Send>>;

/// Uniform client for language-model backends.
///
/// Every provider supports blocking chat; streaming is optional and gated
/// behind [`Provider::supports_streaming`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Sends the conversation and returns the complete assistant reply.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, CourierError>;

    /// Whether [`Provider::stream_chat`] is implemented.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Sends the conversation and returns a stream of reply deltas.
    ///
    /// Connection-phase failures surface as the outer error; failures after
    /// the stream is established arrive as the stream's terminal item.
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChunkStream, CourierError> {
        let _ = messages;
        Err(CourierError::Provider {
            message: "provider does not support streaming".into(),
            source: None,
        })
    }
}
