// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query operations, grouped by entity.

pub mod jobs;
pub mod messages;
pub mod sessions;
