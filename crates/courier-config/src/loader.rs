// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment to merge compiled defaults with
//! environment variables.
//!
//! The environment variable names are flat and unprefixed (`RABBIT_URL`,
//! `WORKER_CONCURRENCY`, ...), so each one is mapped explicitly onto its
//! dotted config path rather than split on underscores.

use figment::{
    providers::{Env, Serialized},
    Figment,
};

use crate::model::CourierConfig;

/// Load configuration from the environment over compiled defaults, then
/// clamp every ranged setting into its documented bounds.
pub fn load_config() -> Result<CourierConfig, figment::Error> {
    let config: CourierConfig = Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(env_provider())
        .extract()?;
    Ok(normalize(config))
}

/// Environment variable provider with explicit name-to-path mapping.
fn env_provider() -> Env {
    Env::raw()
        .only(&[
            "SERVER_ADDR",
            "JWT_SECRET",
            "DATABASE_PATH",
            "RABBIT_URL",
            "RABBIT_QUEUE",
            "CHAT_CONTEXT_WINDOW_SIZE",
            "WORKER_CONCURRENCY",
            "WORKER_MAX_RETRIES",
            "AI_PROVIDER",
            "OLLAMA_BASE_URL",
            "OLLAMA_MODEL",
            "OPENROUTER_BASE_URL",
            "OPENROUTER_API_KEY",
            "OPENROUTER_MODEL",
            "OPENROUTER_SITE_URL",
            "OPENROUTER_APP_NAME",
        ])
        .map(|key| {
            let mapped = match key.as_str().to_ascii_uppercase().as_str() {
                "SERVER_ADDR" => "server.addr",
                "JWT_SECRET" => "server.jwt_secret",
                "DATABASE_PATH" => "storage.database_path",
                "RABBIT_URL" => "broker.url",
                "RABBIT_QUEUE" => "broker.queue",
                "CHAT_CONTEXT_WINDOW_SIZE" => "chat.context_window_size",
                "WORKER_CONCURRENCY" => "worker.concurrency",
                "WORKER_MAX_RETRIES" => "worker.max_retries",
                "AI_PROVIDER" => "providers.default_provider",
                "OLLAMA_BASE_URL" => "providers.ollama.base_url",
                "OLLAMA_MODEL" => "providers.ollama.model",
                "OPENROUTER_BASE_URL" => "providers.openrouter.base_url",
                "OPENROUTER_API_KEY" => "providers.openrouter.api_key",
                "OPENROUTER_MODEL" => "providers.openrouter.model",
                "OPENROUTER_SITE_URL" => "providers.openrouter.site_url",
                "OPENROUTER_APP_NAME" => "providers.openrouter.app_name",
                other => return other.to_ascii_lowercase().into(),
            };
            mapped.into()
        })
}

/// Clamp ranged settings into their documented bounds. Out-of-range values
/// are coerced rather than rejected so a misconfigured deployment degrades
/// instead of refusing to boot.
fn normalize(mut config: CourierConfig) -> CourierConfig {
    config.worker.concurrency = config.worker.concurrency.clamp(1, 50);
    config.worker.max_retries = config.worker.max_retries.min(20);
    config.chat.context_window_size = config.chat.context_window_size.clamp(1, 100);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_with_empty_environment() {
        figment::Jail::expect_with(|_jail| {
            let config = load_config().expect("defaults should load");
            assert_eq!(config.server.addr, "0.0.0.0:8080");
            assert_eq!(config.broker.queue, "chat_jobs");
            assert_eq!(config.worker.concurrency, 2);
            assert_eq!(config.worker.max_retries, 5);
            assert_eq!(config.chat.context_window_size, 20);
            assert_eq!(config.providers.default_provider, "ollama");
            assert_eq!(config.providers.ollama.model, "llama3:latest");
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RABBIT_QUEUE", "jobs_test");
            jail.set_env("WORKER_CONCURRENCY", "8");
            jail.set_env("OPENROUTER_API_KEY", "sk-test");
            let config = load_config().expect("env should load");
            assert_eq!(config.broker.queue, "jobs_test");
            assert_eq!(config.worker.concurrency, 8);
            assert_eq!(config.providers.openrouter.api_key, "sk-test");
            Ok(())
        });
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("WORKER_CONCURRENCY", "500");
            jail.set_env("WORKER_MAX_RETRIES", "99");
            jail.set_env("CHAT_CONTEXT_WINDOW_SIZE", "0");
            let config = load_config().expect("env should load");
            assert_eq!(config.worker.concurrency, 50);
            assert_eq!(config.worker.max_retries, 20);
            assert_eq!(config.chat.context_window_size, 1);
            Ok(())
        });
    }
}
