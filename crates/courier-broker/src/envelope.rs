// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The broker message body: a one-field JSON envelope naming the job.

use courier_core::CourierError;
use serde::{Deserialize, Serialize};

/// Body of every queue message: `{"job_id":"<26-char id>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job_id: String,
}

impl JobEnvelope {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }

    /// Parse a delivery body. Malformed JSON or an empty `job_id` is a
    /// validation error; such deliveries are rejected, never retried.
    pub fn parse(body: &[u8]) -> Result<Self, CourierError> {
        let envelope: JobEnvelope = serde_json::from_slice(body)
            .map_err(|e| CourierError::Validation(format!("malformed job envelope: {e}")))?;
        if envelope.job_id.is_empty() {
            return Err(CourierError::Validation(
                "job envelope has empty job_id".into(),
            ));
        }
        Ok(envelope)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("job envelope serialization cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let envelope = JobEnvelope::new("01ARZ3NDEKTSV4RRFFQ69G5FAV");
        let parsed = JobEnvelope::parse(&envelope.to_bytes()).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert!(JobEnvelope::parse(b"not json").is_err());
        assert!(JobEnvelope::parse(b"{}").is_err());
        assert!(JobEnvelope::parse(br#"{"job_id":""}"#).is_err());
    }
}
