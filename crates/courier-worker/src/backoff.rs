// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry delay schedule.

const BASE_DELAY_MS: u64 = 1_000;
const MAX_DELAY_MS: u64 = 60_000;

/// Delay before retry attempt `attempt` (1-based), in milliseconds:
/// `min(60s, 1s * 2^(attempt - 1))`.
///
/// Carried as the per-message `expiration` on the retry queue, whose
/// dead-letter binding returns the expired envelope to the main queue.
pub fn retry_delay_ms(attempt: u32) -> u64 {
    let exp = attempt.saturating_sub(1).min(20);
    (BASE_DELAY_MS << exp).min(MAX_DELAY_MS)
}
