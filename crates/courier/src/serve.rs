// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `serve` role: HTTP gateway in front of storage and the broker.

use std::sync::Arc;

use tracing::info;

use courier_broker::{Broker, JobPublisher};
use courier_chat::ChatService;
use courier_core::CourierError;
use courier_gateway::{serve, AuthState, GatewayState};
use courier_storage::Database;
use courier_worker::install_signal_handler;

use crate::wiring::build_registry;

pub async fn run() -> Result<(), CourierError> {
    let config = courier_config::load_config().map_err(|e| CourierError::Config(e.to_string()))?;

    let db = Database::open(&config.storage.database_path).await?;
    let registry = Arc::new(build_registry(&config.providers));

    let broker = Broker::connect(&config.broker.url, &config.broker.queue).await?;
    let publisher = Arc::new(JobPublisher::new(
        broker.channel().clone(),
        broker.queues().main.clone(),
    ));

    let service = Arc::new(ChatService::new(
        db.clone(),
        registry,
        publisher,
        config.chat.context_window_size,
    ));

    let state = GatewayState {
        service,
        auth: AuthState {
            jwt_secret: config.server.jwt_secret.clone(),
        },
        default_provider: config.providers.default_provider.clone(),
    };

    let shutdown = install_signal_handler();
    serve(&config.server.addr, state, shutdown).await?;

    info!("gateway stopped, closing resources");
    broker.close().await?;
    db.close().await?;
    Ok(())
}
