// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue consumer and worker pool for the Courier job pipeline.
//!
//! One channel consumes the main queue with prefetch equal to the pool size
//! and manual acknowledgements. A dispatcher task forwards deliveries into a
//! bounded internal channel drained by the pool. Per-delivery outcomes:
//!
//! - malformed envelope: reject (requeue=false) -> the main queue's
//!   dead-letter binding parks it in the DLQ;
//! - failure with retries left: republish to the retry queue with an
//!   incremented `x-retry-count` and an exponential per-message TTL, then
//!   ack the original;
//! - retries exhausted: publish to the DLQ with the final headers, then ack;
//! - a failed republish in either case falls back to reject (requeue=false).

pub mod backoff;
pub mod executor;
pub mod failpoints;
pub mod shutdown;

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use courier_broker::headers::{retry_count, with_retry_headers};
use courier_broker::{Broker, JobEnvelope, QueueNames};
use courier_chat::ChatService;
use courier_core::CourierError;
use courier_storage::Database;

use crate::backoff::retry_delay_ms;
use crate::executor::JobExecutor;
use crate::failpoints::Failpoints;

pub use crate::shutdown::install_signal_handler;

const DELIVERY_MODE_PERSISTENT: u8 = 2;
const CONSUMER_TAG: &str = "courier-worker";

/// The worker: consumes the main queue and drives jobs to a terminal state.
pub struct Worker {
    channel: Channel,
    queues: QueueNames,
    executor: JobExecutor,
    concurrency: usize,
    max_retries: u32,
    failpoints: Arc<Failpoints>,
}

impl Worker {
    pub fn new(
        broker: &Broker,
        db: Database,
        service: Arc<ChatService>,
        concurrency: usize,
        max_retries: u32,
    ) -> Self {
        Self {
            channel: broker.channel().clone(),
            queues: broker.queues().clone(),
            executor: JobExecutor::new(db, service),
            concurrency: concurrency.clamp(1, 50),
            max_retries: max_retries.min(20),
            failpoints: Arc::new(Failpoints::from_env()),
        }
    }

    /// Consume until the token is cancelled, then drain in-flight jobs.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), CourierError> {
        self.channel
            .basic_qos(self.concurrency as u16, BasicQosOptions::default())
            .await
            .map_err(|e| CourierError::Broker {
                message: format!("qos: {e}"),
                source: Some(Box::new(e)),
            })?;

        let mut consumer = self
            .channel
            .basic_consume(
                &self.queues.main,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| CourierError::Broker {
                message: format!("consume: {e}"),
                source: Some(Box::new(e)),
            })?;

        info!(
            queue = self.queues.main.as_str(),
            concurrency = self.concurrency,
            max_retries = self.max_retries,
            "worker started"
        );

        let (tx, rx) = mpsc::channel::<Delivery>(self.concurrency * 2);
        let rx = Arc::new(Mutex::new(rx));

        let mut pool = JoinSet::new();
        for worker_id in 0..self.concurrency {
            let rx = rx.clone();
            let handler = DeliveryHandler {
                channel: self.channel.clone(),
                queues: self.queues.clone(),
                executor: self.executor.clone(),
                max_retries: self.max_retries,
                failpoints: self.failpoints.clone(),
            };
            pool.spawn(async move {
                loop {
                    // The lock is held only while idle-waiting; processing
                    // happens with it released, so the pool runs N-wide.
                    let delivery = { rx.lock().await.recv().await };
                    let Some(delivery) = delivery else { break };
                    handler.handle(worker_id, delivery).await;
                }
            });
        }

        // Dispatcher: pull broker deliveries, forward to the pool.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("worker shutting down");
                    break;
                }
                delivery = consumer.next() => match delivery {
                    Some(Ok(delivery)) => {
                        if tx.send(delivery).await.is_err() {
                            error!("worker pool channel closed unexpectedly");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "consume error");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                    None => {
                        warn!("delivery channel closed");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        }

        // Close the pool channel and let in-flight jobs finish naturally.
        drop(tx);
        while pool.join_next().await.is_some() {}
        info!("worker stopped");
        Ok(())
    }
}

/// Per-delivery state machine, shared by every pool task.
#[derive(Clone)]
struct DeliveryHandler {
    channel: Channel,
    queues: QueueNames,
    executor: JobExecutor,
    max_retries: u32,
    failpoints: Arc<Failpoints>,
}

impl DeliveryHandler {
    async fn handle(&self, worker_id: usize, delivery: Delivery) {
        let envelope = match JobEnvelope::parse(&delivery.data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(worker_id, error = %e, "bad message, dead-lettering");
                self.reject(&delivery).await;
                return;
            }
        };
        let job_id = envelope.job_id.as_str();
        let started = Instant::now();

        // Failure injection runs before any processing so the injected
        // failure exercises the full retry path.
        let result = match self.failpoints.should_fail(job_id) {
            Some(reason) => Err(CourierError::Internal(reason)),
            None => self.executor.execute_job(job_id).await,
        };

        match result {
            Ok(()) => {
                // An ack failure means the broker will redeliver; the job
                // row's terminal state keeps the redelivery harmless.
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    error!(worker_id, job_id, error = %e, "ack failed");
                }
            }
            Err(err) => {
                self.handle_failure(worker_id, delivery, job_id, err, started)
                    .await;
            }
        }
    }

    async fn handle_failure(
        &self,
        worker_id: usize,
        delivery: Delivery,
        job_id: &str,
        err: CourierError,
        started: Instant,
    ) {
        let retries_so_far = retry_count(delivery.properties.headers().as_ref());
        warn!(
            worker_id,
            job_id,
            retry = retries_so_far,
            elapsed_ms = started.elapsed().as_millis() as u64,
            error = %err,
            "job attempt failed"
        );

        if retries_so_far < self.max_retries {
            let next_retry = retries_so_far + 1;
            let headers = with_retry_headers(
                delivery.properties.headers().as_ref(),
                next_retry,
                &err.to_string(),
            );
            let delay_ms = retry_delay_ms(next_retry);
            let properties = BasicProperties::default()
                .with_content_type("application/json".into())
                .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
                .with_headers(headers)
                .with_timestamp(chrono::Utc::now().timestamp() as u64)
                .with_expiration(delay_ms.to_string().into());

            if let Err(e) = self
                .publish(&self.queues.retry, &delivery.data, properties)
                .await
            {
                // Can't republish: reject so the main queue's DLX parks it.
                error!(worker_id, job_id, error = %e, "retry republish failed");
                self.reject(&delivery).await;
                return;
            }

            info!(worker_id, job_id, retry = next_retry, delay_ms, "job scheduled for retry");
            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                error!(worker_id, job_id, error = %e, "ack after republish failed");
            }
            return;
        }

        // Retries exhausted: park in the DLQ with the final headers.
        let headers = with_retry_headers(
            delivery.properties.headers().as_ref(),
            retries_so_far,
            &err.to_string(),
        );
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
            .with_headers(headers)
            .with_timestamp(chrono::Utc::now().timestamp() as u64);

        if let Err(e) = self
            .publish(&self.queues.dlq, &delivery.data, properties)
            .await
        {
            error!(worker_id, job_id, error = %e, "dlq publish failed");
            self.reject(&delivery).await;
            return;
        }

        warn!(worker_id, job_id, retries = retries_so_far, "job dead-lettered");
        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            error!(worker_id, job_id, error = %e, "ack after dlq failed");
        }
    }

    async fn publish(
        &self,
        queue: &str,
        body: &[u8],
        properties: BasicProperties,
    ) -> Result<(), CourierError> {
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                body,
                properties,
            )
            .await
            .map_err(|e| CourierError::Broker {
                message: format!("publish to {queue}: {e}"),
                source: Some(Box::new(e)),
            })?
            .await
            .map_err(|e| CourierError::Broker {
                message: format!("publish confirm to {queue}: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(())
    }

    async fn reject(&self, delivery: &Delivery) {
        if let Err(e) = delivery
            .reject(BasicRejectOptions { requeue: false })
            .await
        {
            error!(error = %e, "reject failed");
        }
    }
}
