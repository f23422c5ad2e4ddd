// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier inference broker.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Courier workspace. Provider adapters and
//! the broker publisher implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use types::{new_id, ChatMessage, JobStatus, Role};

pub use traits::{ChunkStream, JobQueue, Provider};
