// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry-tracking headers carried on republished envelopes.
//!
//! Broker clients surface integer headers in several shapes (sized ints,
//! strings, byte strings), so reads coerce defensively: anything
//! unrecognized counts as zero retries.

use lapin::types::{AMQPValue, FieldTable, ShortString};

/// Number of retry republishes this envelope has been through.
pub const X_RETRY_COUNT: &str = "x-retry-count";

/// Most recent failure, flattened to one line and capped at 500 bytes.
pub const X_LAST_ERROR: &str = "x-last-error";

const MAX_ERROR_HEADER_BYTES: usize = 500;

/// Read `x-retry-count` from a delivery's headers, accepting integer and
/// textual representations. Missing, negative, or unrecognized values
/// read as zero.
pub fn retry_count(headers: Option<&FieldTable>) -> u32 {
    let Some(table) = headers else {
        return 0;
    };
    let Some(value) = table.inner().get(&ShortString::from(X_RETRY_COUNT)) else {
        return 0;
    };
    match value {
        AMQPValue::ShortShortInt(v) => non_negative(i64::from(*v)),
        AMQPValue::ShortShortUInt(v) => u32::from(*v),
        AMQPValue::ShortInt(v) => non_negative(i64::from(*v)),
        AMQPValue::ShortUInt(v) => u32::from(*v),
        AMQPValue::LongInt(v) => non_negative(i64::from(*v)),
        AMQPValue::LongUInt(v) => *v,
        AMQPValue::LongLongInt(v) => non_negative(*v),
        AMQPValue::ShortString(s) => parse_count(s.as_str()),
        AMQPValue::LongString(s) => parse_count(&String::from_utf8_lossy(s.as_bytes())),
        AMQPValue::ByteArray(b) => parse_count(&String::from_utf8_lossy(b.as_slice())),
        _ => 0,
    }
}

fn non_negative(v: i64) -> u32 {
    u32::try_from(v).unwrap_or(0)
}

fn parse_count(s: &str) -> u32 {
    s.trim().parse().unwrap_or(0)
}

/// Build the headers for a republished envelope: the original headers with
/// `x-retry-count` and `x-last-error` overwritten.
pub fn with_retry_headers(
    original: Option<&FieldTable>,
    retry_count: u32,
    error: &str,
) -> FieldTable {
    let mut table = original.cloned().unwrap_or_default();
    table.insert(
        X_RETRY_COUNT.into(),
        AMQPValue::LongInt(retry_count.min(i32::MAX as u32) as i32),
    );
    table.insert(
        X_LAST_ERROR.into(),
        AMQPValue::LongString(truncate_error(error).into()),
    );
    table
}

/// Flatten an error message for header transport: newlines become spaces and
/// the result is capped at 500 bytes on a character boundary.
pub fn truncate_error(error: &str) -> String {
    let mut flat = error.replace(['\n', '\r'], " ");
    if flat.len() > MAX_ERROR_HEADER_BYTES {
        let mut cut = MAX_ERROR_HEADER_BYTES;
        while !flat.is_char_boundary(cut) {
            cut -= 1;
        }
        flat.truncate(cut);
    }
    flat
}
