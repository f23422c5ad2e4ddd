// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Courier workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use ulid::Ulid;

/// One turn of conversation as sent to a provider: a `(role, content)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Message author role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Job lifecycle status. Transitions form a one-way lattice:
/// `Queued -> Running -> {Succeeded, Failed}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// True once the job can no longer transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Mints a new 26-character, lexicographically sortable identifier.
///
/// Used for session and job IDs. Generated application-side so inserts never
/// round-trip to the database for identity.
pub fn new_id() -> String {
    Ulid::new().to_string()
}
