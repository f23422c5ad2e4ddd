// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities.

use courier_core::JobStatus;
use serde::{Deserialize, Serialize};

/// A conversation session.
///
/// `id` is the numeric primary key used for keyset pagination; `session_id`
/// is the 26-character external identifier clients see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub session_id: String,
    pub user_id: i64,
    /// Provider name this session routes inference to.
    pub provider: String,
    /// Model identifier passed to the provider factory.
    pub model: String,
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A single message within a session.
///
/// The monotone primary key defines in-session chronology; rows are appended
/// and never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub session_id: String,
    pub user_id: i64,
    /// "user", "assistant", or "system".
    pub role: String,
    pub content: String,
    pub idempotency_key: Option<String>,
    pub created_at: String,
}

/// An asynchronous inference job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// 26-character external identifier, generated at submission.
    pub id: String,
    pub user_id: i64,
    pub session_id: String,
    pub prompt: String,
    pub idempotency_key: Option<String>,
    pub status: JobStatus,
    /// Set iff the job succeeded.
    pub result_message_id: Option<i64>,
    /// Set iff the job failed.
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
