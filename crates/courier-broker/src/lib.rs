// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AMQP plumbing for the Courier job pipeline.
//!
//! Declares the main / retry / dead-letter queue triangle and publishes
//! persistent job envelopes. The retry queue has no queue-level TTL; delay
//! is carried per message via the `expiration` property, and its dead-letter
//! binding routes expired messages back to the main queue.

pub mod envelope;
pub mod headers;
pub mod publisher;
pub mod topology;

pub use envelope::JobEnvelope;
pub use publisher::JobPublisher;
pub use topology::{Broker, QueueNames};

/// Map a lapin error into the workspace error type.
pub(crate) fn map_amqp_err(context: &str, e: lapin::Error) -> courier_core::CourierError {
    courier_core::CourierError::Broker {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}
