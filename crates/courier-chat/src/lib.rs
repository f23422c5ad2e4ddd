// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat service for the Courier inference broker.
//!
//! [`ChatService`] enforces session ownership, assembles the provider
//! context window, and drives the three inference modes: synchronous,
//! streaming, and asynchronous (job-producing).

pub mod service;
pub mod stream;

pub use service::ChatService;
pub use stream::StreamEvent;
