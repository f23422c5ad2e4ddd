// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock adapters for deterministic, CI-runnable tests: a scripted
//! [`MockProvider`] and a recording [`MockJobQueue`]. No external services.

pub mod mock_provider;
pub mod mock_queue;

pub use mock_provider::MockProvider;
pub use mock_queue::MockJobQueue;
