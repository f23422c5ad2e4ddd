// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits implemented by the provider and broker crates.

pub mod provider;
pub mod queue;

pub use provider::{ChunkStream, Provider};
pub use queue::JobQueue;
