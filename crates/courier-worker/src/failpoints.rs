// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test-only failure injection.
//!
//! Two environment switches allow CI to drive the retry and dead-letter
//! paths without a misbehaving provider:
//! - `FAIL_JOB_ID`: every attempt for this job fails (exercises the DLQ path).
//! - `FAIL_ONCE_JOB_ID`: only the first attempt fails (exercises
//!   retry-then-success).
//!
//! The once-switch is process-local memory and race-safe across the worker
//! pool. Neither has any effect unless its variable is set.

use dashmap::DashSet;

const FAIL_JOB_ENV: &str = "FAIL_JOB_ID";
const FAIL_ONCE_JOB_ENV: &str = "FAIL_ONCE_JOB_ID";

#[derive(Default)]
pub struct Failpoints {
    fail_job_id: Option<String>,
    fail_once_job_id: Option<String>,
    once_seen: DashSet<String>,
}

impl Failpoints {
    pub fn from_env() -> Self {
        Self::new(read_env(FAIL_JOB_ENV), read_env(FAIL_ONCE_JOB_ENV))
    }

    pub fn new(fail_job_id: Option<String>, fail_once_job_id: Option<String>) -> Self {
        Self {
            fail_job_id,
            fail_once_job_id,
            once_seen: DashSet::new(),
        }
    }

    /// Returns the simulated failure for this job, if one is armed.
    ///
    /// The once-switch trips for exactly one caller even under concurrent
    /// attempts; later attempts proceed normally.
    pub fn should_fail(&self, job_id: &str) -> Option<String> {
        if self.fail_once_job_id.as_deref() == Some(job_id)
            && self.once_seen.insert(job_id.to_string())
        {
            return Some(format!("simulated failure once (FAIL_ONCE_JOB_ID={job_id})"));
        }
        if self.fail_job_id.as_deref() == Some(job_id) {
            return Some(format!("simulated failure (FAIL_JOB_ID={job_id})"));
        }
        None
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn disarmed_failpoints_never_fire() {
        let fp = Failpoints::new(None, None);
        assert!(fp.should_fail("job-1").is_none());
    }

    #[test]
    fn always_fail_fires_on_every_attempt() {
        let fp = Failpoints::new(Some("job-1".into()), None);
        assert!(fp.should_fail("job-1").is_some());
        assert!(fp.should_fail("job-1").is_some());
        assert!(fp.should_fail("job-2").is_none());
    }

    #[test]
    fn fail_once_fires_exactly_once() {
        let fp = Failpoints::new(None, Some("job-1".into()));
        assert!(fp.should_fail("job-1").is_some());
        assert!(fp.should_fail("job-1").is_none());
        assert!(fp.should_fail("job-1").is_none());
    }

    #[test]
    fn fail_once_is_race_safe_across_threads() {
        let fp = Arc::new(Failpoints::new(None, Some("job-1".into())));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let fp = fp.clone();
                std::thread::spawn(move || fp.should_fail("job-1").is_some())
            })
            .collect();
        let fired: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(fired, 1, "exactly one attempt may observe the once-failure");
    }
}
