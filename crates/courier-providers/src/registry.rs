// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider registry: lowercase name -> factory.
//!
//! Each session stores a provider name and model; the registry materializes
//! a client per call so the session's model (or the factory's default)
//! always wins. Reads never block each other; registration takes the write
//! lock briefly.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use courier_core::{CourierError, Provider};

/// Builds a provider for the given model identifier. An empty, trimmed
/// model means "use the factory's configured default".
pub type ProviderFactory =
    Box<dyn Fn(&str) -> Result<Arc<dyn Provider>, CourierError> + Send + Sync>;

/// Thread-safe mapping from provider name to factory.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: RwLock<HashMap<String, ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name` (trimmed, lowercased). Re-registering
    /// a name replaces the previous factory.
    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn(&str) -> Result<Arc<dyn Provider>, CourierError> + Send + Sync + 'static,
    {
        let name = name.trim().to_lowercase();
        self.factories
            .write()
            .expect("provider registry lock poisoned")
            .insert(name, Box::new(factory));
    }

    /// Look up `name` and materialize a provider for `model`.
    pub fn get(&self, name: &str, model: &str) -> Result<Arc<dyn Provider>, CourierError> {
        let name = name.trim().to_lowercase();
        let factories = self
            .factories
            .read()
            .expect("provider registry lock poisoned");
        let factory = factories
            .get(&name)
            .ok_or_else(|| CourierError::UnknownProvider(name.clone()))?;
        factory(model.trim())
    }
}
