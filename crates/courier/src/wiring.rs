// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared startup wiring for the serve and worker roles.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use courier_config::model::ProvidersConfig;
use courier_core::Provider;
use courier_providers::{OllamaProvider, OpenRouterProvider, ProviderRegistry};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Register the configured backends. Each session routes by its stored
/// provider name; a session with a blank model gets the factory default.
pub fn build_registry(config: &ProvidersConfig) -> ProviderRegistry {
    let registry = ProviderRegistry::new();

    let ollama = config.ollama.clone();
    registry.register("ollama", move |model| {
        let model = if model.is_empty() {
            ollama.model.as_str()
        } else {
            model
        };
        Ok(Arc::new(OllamaProvider::new(ollama.base_url.clone(), model)) as Arc<dyn Provider>)
    });

    let openrouter = config.openrouter.clone();
    registry.register("openrouter", move |model| {
        let model = if model.is_empty() {
            openrouter.model.as_str()
        } else {
            model
        };
        Ok(Arc::new(OpenRouterProvider::new(
            openrouter.base_url.clone(),
            openrouter.api_key.clone(),
            model,
            openrouter.site_url.clone(),
            openrouter.app_name.clone(),
        )) as Arc<dyn Provider>)
    });

    registry
}
