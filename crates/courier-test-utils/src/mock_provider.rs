// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider with pre-scripted responses.
//!
//! Blocking replies pop from a FIFO queue (empty queue falls back to
//! `"mock reply"`). Streaming responses pop scripted chunk sequences that may
//! end in a terminal error. Every call records the messages it received so
//! tests can assert on the exact context a caller assembled.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use courier_core::{ChatMessage, ChunkStream, CourierError, Provider};

const DEFAULT_REPLY: &str = "mock reply";

type ChunkScript = Vec<Result<String, String>>;

#[derive(Default)]
struct Inner {
    replies: VecDeque<String>,
    chat_errors: VecDeque<String>,
    streams: VecDeque<ChunkScript>,
    recorded: Vec<Vec<ChatMessage>>,
}

/// A scripted provider. Clones share state, so a test can keep a handle for
/// assertions while the service owns another.
#[derive(Clone, Default)]
pub struct MockProvider {
    inner: Arc<Mutex<Inner>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load blocking replies, returned in order.
    pub fn with_replies(replies: Vec<&str>) -> Self {
        let provider = Self::new();
        for reply in replies {
            provider.queue_reply(reply);
        }
        provider
    }

    /// Append a blocking reply.
    pub fn queue_reply(&self, text: &str) {
        self.lock().replies.push_back(text.to_string());
    }

    /// Make the next `chat` call fail with a provider error.
    pub fn queue_chat_error(&self, message: &str) {
        self.lock().chat_errors.push_back(message.to_string());
    }

    /// Script the next `stream_chat` call: the given chunks, then clean end.
    pub fn queue_stream(&self, chunks: Vec<&str>) {
        self.lock()
            .streams
            .push_back(chunks.into_iter().map(|c| Ok(c.to_string())).collect());
    }

    /// Script the next `stream_chat` call: the given chunks, then a terminal
    /// error.
    pub fn queue_stream_error(&self, chunks: Vec<&str>, error: &str) {
        let mut script: ChunkScript = chunks.into_iter().map(|c| Ok(c.to_string())).collect();
        script.push(Err(error.to_string()));
        self.lock().streams.push_back(script);
    }

    /// The messages received by the most recent call, if any.
    pub fn last_messages(&self) -> Option<Vec<ChatMessage>> {
        self.lock().recorded.last().cloned()
    }

    /// Total number of `chat` + `stream_chat` calls observed.
    pub fn call_count(&self) -> usize {
        self.lock().recorded.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("mock provider lock poisoned")
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, CourierError> {
        let mut inner = self.lock();
        inner.recorded.push(messages.to_vec());
        if let Some(message) = inner.chat_errors.pop_front() {
            return Err(CourierError::Provider {
                message,
                source: None,
            });
        }
        Ok(inner
            .replies
            .pop_front()
            .unwrap_or_else(|| DEFAULT_REPLY.to_string()))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChunkStream, CourierError> {
        let mut inner = self.lock();
        inner.recorded.push(messages.to_vec());
        let script = inner.streams.pop_front().unwrap_or_else(|| {
            vec![Ok(inner
                .replies
                .pop_front()
                .unwrap_or_else(|| DEFAULT_REPLY.to_string()))]
        });
        let items: Vec<Result<String, CourierError>> = script
            .into_iter()
            .map(|item| {
                item.map_err(|message| CourierError::Provider {
                    message,
                    source: None,
                })
            })
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Role;
    use futures::StreamExt;

    #[tokio::test]
    async fn replies_pop_in_order_then_default() {
        let provider = MockProvider::with_replies(vec!["first", "second"]);
        assert_eq!(provider.chat(&[]).await.unwrap(), "first");
        assert_eq!(provider.chat(&[]).await.unwrap(), "second");
        assert_eq!(provider.chat(&[]).await.unwrap(), DEFAULT_REPLY);
    }

    #[tokio::test]
    async fn records_received_messages() {
        let provider = MockProvider::new();
        let messages = vec![ChatMessage::new(Role::User, "hi")];
        provider.chat(&messages).await.unwrap();
        assert_eq!(provider.last_messages().unwrap(), messages);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn scripted_stream_ends_with_error_when_requested() {
        let provider = MockProvider::new();
        provider.queue_stream_error(vec!["a", "b"], "boom");

        let mut stream = provider.stream_chat(&[]).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert_eq!(stream.next().await.unwrap().unwrap(), "b");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn queued_chat_error_fires_once() {
        let provider = MockProvider::with_replies(vec!["ok"]);
        provider.queue_chat_error("down");
        assert!(provider.chat(&[]).await.is_err());
        assert_eq!(provider.chat(&[]).await.unwrap(), "ok");
    }
}
