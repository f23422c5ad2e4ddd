// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publishes job envelopes onto the main queue.

use std::time::Duration;

use async_trait::async_trait;
use courier_core::{CourierError, JobQueue};
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel};
use tracing::debug;

use crate::envelope::JobEnvelope;
use crate::map_amqp_err;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Publishes persistent `{"job_id":...}` envelopes to the main queue via the
/// default exchange (routing key = queue name).
#[derive(Clone)]
pub struct JobPublisher {
    channel: Channel,
    queue: String,
}

impl JobPublisher {
    pub fn new(channel: Channel, queue: impl Into<String>) -> Self {
        Self {
            channel,
            queue: queue.into(),
        }
    }
}

#[async_trait]
impl JobQueue for JobPublisher {
    async fn publish_job(&self, job_id: &str) -> Result<(), CourierError> {
        let payload = JobEnvelope::new(job_id).to_bytes();
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
            .with_timestamp(chrono::Utc::now().timestamp() as u64);

        let publish = async {
            self.channel
                .basic_publish(
                    "",
                    &self.queue,
                    BasicPublishOptions::default(),
                    &payload,
                    properties,
                )
                .await
                .map_err(|e| map_amqp_err("publish job", e))?
                .await
                .map_err(|e| map_amqp_err("publish job confirm", e))?;
            Ok::<(), CourierError>(())
        };

        tokio::time::timeout(PUBLISH_TIMEOUT, publish)
            .await
            .map_err(|_| CourierError::Broker {
                message: format!("publish job timed out after {PUBLISH_TIMEOUT:?}"),
                source: None,
            })??;

        debug!(job_id, queue = self.queue.as_str(), "job published");
        Ok(())
    }
}
