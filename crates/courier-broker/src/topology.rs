// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection management and queue declaration.
//!
//! Three durable queues per configured prefix `Q`:
//! - `Q` (main): dead-letters to `Q.dlq` on reject/nack(requeue=false).
//! - `Q.retry`: dead-letters back to `Q`; per-message TTL supplies the delay.
//! - `Q.dlq`: terminal parking lot, no special arguments.
//!
//! Both the API process and the worker declare the same topology on startup,
//! so either may come up first.

use courier_core::CourierError;
use lapin::options::QueueDeclareOptions;
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, Connection, ConnectionProperties};
use tracing::info;

use crate::map_amqp_err;

/// The main / retry / dead-letter queue names derived from one prefix.
#[derive(Debug, Clone)]
pub struct QueueNames {
    pub main: String,
    pub retry: String,
    pub dlq: String,
}

impl QueueNames {
    pub fn new(prefix: &str) -> Self {
        Self {
            main: prefix.to_string(),
            retry: format!("{prefix}.retry"),
            dlq: format!("{prefix}.dlq"),
        }
    }
}

/// An open AMQP connection with the Courier topology declared.
pub struct Broker {
    connection: Connection,
    channel: Channel,
    queues: QueueNames,
}

impl Broker {
    /// Connect and declare the queue triangle (dead-letter queue first, so
    /// the bindings it backs always have a target).
    pub async fn connect(url: &str, queue_prefix: &str) -> Result<Self, CourierError> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| map_amqp_err("amqp connect", e))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| map_amqp_err("amqp channel", e))?;

        let queues = QueueNames::new(queue_prefix);
        declare_topology(&channel, &queues).await?;

        info!(
            main = queues.main.as_str(),
            retry = queues.retry.as_str(),
            dlq = queues.dlq.as_str(),
            "broker topology declared"
        );

        Ok(Self {
            connection,
            channel,
            queues,
        })
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn queues(&self) -> &QueueNames {
        &self.queues
    }

    pub async fn close(&self) -> Result<(), CourierError> {
        self.connection
            .close(0, "shutting down")
            .await
            .map_err(|e| map_amqp_err("amqp close", e))
    }
}

async fn declare_topology(channel: &Channel, queues: &QueueNames) -> Result<(), CourierError> {
    let durable = QueueDeclareOptions {
        durable: true,
        ..QueueDeclareOptions::default()
    };

    channel
        .queue_declare(&queues.dlq, durable, FieldTable::default())
        .await
        .map_err(|e| map_amqp_err("queue declare dlq", e))?;

    // Retry queue: expired messages dead-letter back to the main queue.
    // No queue-level TTL; each message carries its own expiration.
    let mut retry_args = FieldTable::default();
    retry_args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString("".into()),
    );
    retry_args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(queues.main.clone().into()),
    );
    channel
        .queue_declare(&queues.retry, durable, retry_args)
        .await
        .map_err(|e| map_amqp_err("queue declare retry", e))?;

    // Main queue: rejected or nacked (requeue=false) messages land in the DLQ.
    let mut main_args = FieldTable::default();
    main_args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString("".into()),
    );
    main_args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(queues.dlq.clone().into()),
    );
    channel
        .queue_declare(&queues.main, durable, main_args)
        .await
        .map_err(|e| map_amqp_err("queue declare main", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_names_derive_from_prefix() {
        let queues = QueueNames::new("chat_jobs");
        assert_eq!(queues.main, "chat_jobs");
        assert_eq!(queues.retry, "chat_jobs.retry");
        assert_eq!(queues.dlq, "chat_jobs.dlq");
    }
}
