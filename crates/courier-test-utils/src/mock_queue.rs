// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording job queue for idempotency assertions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use courier_core::{CourierError, JobQueue};

/// Records every published job ID instead of talking to a broker.
#[derive(Default)]
pub struct MockJobQueue {
    published: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MockJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// All job IDs published so far, in order.
    pub fn published(&self) -> Vec<String> {
        self.published
            .lock()
            .expect("mock queue lock poisoned")
            .clone()
    }

    /// When set, every publish fails with a broker error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobQueue for MockJobQueue {
    async fn publish_job(&self, job_id: &str) -> Result<(), CourierError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CourierError::Broker {
                message: "mock queue is failing".into(),
                source: None,
            });
        }
        self.published
            .lock()
            .expect("mock queue lock poisoned")
            .push(job_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_publishes_in_order() {
        let queue = MockJobQueue::new();
        queue.publish_job("a").await.unwrap();
        queue.publish_job("b").await.unwrap();
        assert_eq!(queue.published(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn failing_mode_rejects_publishes() {
        let queue = MockJobQueue::new();
        queue.set_failing(true);
        assert!(queue.publish_job("a").await.is_err());
        assert!(queue.published().is_empty());
    }
}
