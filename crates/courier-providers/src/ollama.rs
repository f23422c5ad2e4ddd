// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter for a self-hosted Ollama backend.
//!
//! Blocking chat POSTs `{model, messages, stream:false}` to `/api/chat`.
//! Streaming chat sets `stream:true` and reads the response body as NDJSON:
//! one JSON object per line carrying a partial `message.content` delta and a
//! `done` flag. Emission stops at the first `done:true` or body EOF.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::debug;

use courier_core::{ChatMessage, ChunkStream, CourierError, Provider};

use crate::{status_error, CHAT_TIMEOUT, MAX_LINE_BYTES};

/// Client for an Ollama-compatible `/api/chat` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default = "empty_message")]
    message: WireMessage,
    #[serde(default)]
    error: String,
}

#[derive(Deserialize)]
struct StreamFrame {
    #[serde(default = "empty_message")]
    message: WireMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: String,
}

fn empty_message() -> WireMessage {
    WireMessage {
        content: String::new(),
    }
}

impl OllamaProvider {
    /// Create a new adapter. Empty arguments fall back to the stock local
    /// deployment (`http://localhost:11434`, `llama3:latest`).
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if base_url.is_empty() {
            base_url = "http://localhost:11434".to_string();
        }
        let mut model = model.into();
        if model.is_empty() {
            model = "llama3:latest".to_string();
        }
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, CourierError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint())
            .timeout(CHAT_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| CourierError::Provider {
                message: format!("ollama: request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            return Err(status_error("ollama", response).await);
        }

        let body = response.text().await.map_err(|e| CourierError::Provider {
            message: format!("ollama: failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;
        let decoded: ChatResponse =
            serde_json::from_str(&body).map_err(|e| CourierError::Provider {
                message: format!("ollama: failed to parse response: {e}"),
                source: Some(Box::new(e)),
            })?;
        if !decoded.error.is_empty() {
            return Err(CourierError::Provider {
                message: format!("ollama: {}", decoded.error),
                source: None,
            });
        }
        Ok(decoded.message.content)
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChunkStream, CourierError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| CourierError::Provider {
                message: format!("ollama: request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            return Err(status_error("ollama", response).await);
        }

        debug!(model = self.model.as_str(), "ollama stream opened");

        let reader = StreamReader::new(
            response
                .bytes_stream()
                .map(|r| r.map_err(std::io::Error::other)),
        );
        let lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

        let stream = futures::stream::unfold(
            (lines, false),
            |(mut lines, finished)| async move {
                if finished {
                    return None;
                }
                loop {
                    match lines.next().await {
                        None => return None,
                        Some(Err(e)) => {
                            return Some((
                                Err(CourierError::Provider {
                                    message: format!("ollama: stream read failed: {e}"),
                                    source: Some(Box::new(e)),
                                }),
                                (lines, true),
                            ));
                        }
                        Some(Ok(line)) => {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            let frame: StreamFrame = match serde_json::from_str(line) {
                                Ok(f) => f,
                                Err(e) => {
                                    return Some((
                                        Err(CourierError::Provider {
                                            message: format!("ollama: malformed frame: {e}"),
                                            source: Some(Box::new(e)),
                                        }),
                                        (lines, true),
                                    ));
                                }
                            };
                            if !frame.error.is_empty() {
                                return Some((
                                    Err(CourierError::Provider {
                                        message: format!("ollama: {}", frame.error),
                                        source: None,
                                    }),
                                    (lines, true),
                                ));
                            }
                            if frame.done {
                                if frame.message.content.is_empty() {
                                    return None;
                                }
                                return Some((Ok(frame.message.content), (lines, true)));
                            }
                            if frame.message.content.is_empty() {
                                continue;
                            }
                            return Some((Ok(frame.message.content), (lines, false)));
                        }
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}
