// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter for OpenRouter (OpenAI-compatible chat completions).
//!
//! Blocking chat POSTs to `/chat/completions`; streaming chat additionally
//! requests `text/event-stream` and parses `data:` frames, where each JSON
//! payload's `choices[0].delta.content` is the chunk and a literal
//! `data: [DONE]` terminates the stream.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use courier_core::{ChatMessage, ChunkStream, CourierError, Provider};

use crate::{status_error, CHAT_TIMEOUT};

/// Client for the OpenRouter chat completions API.
#[derive(Debug, Clone)]
pub struct OpenRouterProvider {
    base_url: String,
    api_key: String,
    model: String,
    /// Optional `HTTP-Referer` attribution header.
    site_url: String,
    /// Optional `X-Title` attribution header.
    app_name: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct WireError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    error: Option<WireError>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct StreamFrame {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<WireError>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: String,
}

impl OpenRouterProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        site_url: impl Into<String>,
        app_name: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        if base_url.is_empty() {
            base_url = "https://openrouter.ai/api/v1".to_string();
        }
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            site_url: site_url.into(),
            app_name: app_name.into(),
            client: reqwest::Client::new(),
        }
    }

    fn validate(&self) -> Result<(), CourierError> {
        if self.api_key.trim().is_empty() {
            return Err(CourierError::Provider {
                message: "openrouter: api key is required".into(),
                source: None,
            });
        }
        if self.model.trim().is_empty() {
            return Err(CourierError::Provider {
                message: "openrouter: model is required".into(),
                source: None,
            });
        }
        Ok(())
    }

    fn request(&self, stream: bool, messages: &[ChatMessage]) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: self.model.trim(),
                messages,
                stream,
            });
        if !self.site_url.is_empty() {
            builder = builder.header("HTTP-Referer", &self.site_url);
        }
        if !self.app_name.is_empty() {
            builder = builder.header("X-Title", &self.app_name);
        }
        builder
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, CourierError> {
        self.validate()?;

        let response = self
            .request(false, messages)
            .timeout(CHAT_TIMEOUT)
            .send()
            .await
            .map_err(|e| CourierError::Provider {
                message: format!("openrouter: request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            return Err(status_error("openrouter", response).await);
        }

        let body = response.text().await.map_err(|e| CourierError::Provider {
            message: format!("openrouter: failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;
        let decoded: ChatResponse =
            serde_json::from_str(&body).map_err(|e| CourierError::Provider {
                message: format!("openrouter: failed to parse response: {e}"),
                source: Some(Box::new(e)),
            })?;
        if let Some(err) = decoded.error {
            if !err.message.is_empty() {
                return Err(CourierError::Provider {
                    message: format!("openrouter: {}", err.message),
                    source: None,
                });
            }
        }
        let Some(choice) = decoded.choices.into_iter().next() else {
            return Err(CourierError::Provider {
                message: "openrouter: empty response".into(),
                source: None,
            });
        };
        Ok(choice.message.content)
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChunkStream, CourierError> {
        self.validate()?;

        let response = self
            .request(true, messages)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| CourierError::Provider {
                message: format!("openrouter: request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            return Err(status_error("openrouter", response).await);
        }

        debug!(model = self.model.as_str(), "openrouter stream opened");

        let events = response.bytes_stream().eventsource();

        let stream = futures::stream::unfold(
            (events, false),
            |(mut events, finished)| async move {
                if finished {
                    return None;
                }
                loop {
                    match events.next().await {
                        None => return None,
                        Some(Err(e)) => {
                            return Some((
                                Err(CourierError::Provider {
                                    message: format!("openrouter: stream read failed: {e}"),
                                    source: Some(Box::new(e)),
                                }),
                                (events, true),
                            ));
                        }
                        Some(Ok(event)) => {
                            let data = event.data.trim();
                            if data.is_empty() {
                                continue;
                            }
                            if data == "[DONE]" {
                                return None;
                            }
                            let frame: StreamFrame = match serde_json::from_str(data) {
                                Ok(f) => f,
                                Err(e) => {
                                    return Some((
                                        Err(CourierError::Provider {
                                            message: format!(
                                                "openrouter: malformed frame: {e}"
                                            ),
                                            source: Some(Box::new(e)),
                                        }),
                                        (events, true),
                                    ));
                                }
                            };
                            if let Some(err) = frame.error {
                                if !err.message.is_empty() {
                                    return Some((
                                        Err(CourierError::Provider {
                                            message: format!("openrouter: {}", err.message),
                                            source: None,
                                        }),
                                        (events, true),
                                    ));
                                }
                            }
                            let Some(choice) = frame.choices.into_iter().next() else {
                                continue;
                            };
                            if choice.delta.content.is_empty() {
                                continue;
                            }
                            return Some((Ok(choice.delta.content), (events, false)));
                        }
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}
