// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - an asynchronous conversational inference broker.
//!
//! One binary, two roles: `serve` runs the HTTP gateway, `worker` runs the
//! queue consumer. Both share the same configuration, storage, provider
//! registry, and broker topology.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod serve;
mod wiring;
mod worker;

/// Courier - an asynchronous conversational inference broker.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API gateway.
    Serve,
    /// Start the job queue worker.
    Worker,
}

#[tokio::main]
async fn main() -> ExitCode {
    wiring::init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Serve => serve::run().await,
        Commands::Worker => worker::run().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            ExitCode::FAILURE
        }
    }
}
