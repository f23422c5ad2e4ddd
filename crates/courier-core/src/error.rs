// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier inference broker.

use thiserror::Error;

/// The primary error type used across all Courier crates.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid values, missing required settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed input rejected at a boundary (API request, header).
    #[error("validation error: {0}")]
    Validation(String),

    /// Entity absent, or owned by a different user. Ownership mismatches are
    /// deliberately indistinguishable from absence.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// Storage backend errors (connection, query failure, constraint).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Broker errors (connection, declare, publish, ack).
    #[error("broker error: {message}")]
    Broker {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider errors (HTTP failure, non-2xx status, malformed frame).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No factory registered under the requested provider name.
    #[error("unknown ai provider: {0}")]
    UnknownProvider(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// True for [`CourierError::NotFound`], which callers map to 404-style
    /// responses without leaking whether the entity exists for another user.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CourierError::NotFound { .. })
    }
}
