// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Courier inference broker.
//!
//! The configuration is an immutable value materialized once at startup from
//! environment variables with documented defaults, then passed into
//! constructors. There are no ambient singletons.

pub mod loader;
pub mod model;

pub use loader::load_config;
pub use model::CourierConfig;
