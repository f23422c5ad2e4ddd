// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job queue trait: the submission side's view of the broker.

use async_trait::async_trait;

use crate::error::CourierError;

/// Publishes job identifiers onto the durable work queue.
///
/// The chat service enqueues through this seam so tests can observe exactly
/// how many publishes a submission produced.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Publishes one persistent envelope carrying `job_id` to the main queue.
    async fn publish_job(&self, job_id: &str) -> Result<(), CourierError>;
}
