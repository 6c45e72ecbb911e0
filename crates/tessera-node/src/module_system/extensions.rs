// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-suffix load handlers
//!
//! A handler receives the reserved [`ModuleRecord`] and populates its exports,
//! either by mutating the exports object in place or by replacing the slot in
//! the cache.

use super::cache::ModuleRecord;
use super::loader::ModuleLoader;
use super::require::ModuleHandle;
use crate::error::{LoaderError, Result};
use crate::path::extension_of;
use crate::script::ModuleScope;
use crate::value::Value;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Suffix of primary source modules
pub const SOURCE_SUFFIX: &str = ".js";

/// Loads one module kind into its reserved record
pub trait ExtensionHandler: Send + Sync {
    /// Populate the exports of `module`
    fn load(&self, loader: &ModuleLoader, module: &ModuleRecord) -> Result<()>;
}

impl<F> ExtensionHandler for F
where
    F: Fn(&ModuleLoader, &ModuleRecord) -> Result<()> + Send + Sync,
{
    fn load(&self, loader: &ModuleLoader, module: &ModuleRecord) -> Result<()> {
        self(loader, module)
    }
}

/// Compiles and runs a source module once
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceHandler;

impl ExtensionHandler for SourceHandler {
    fn load(&self, loader: &ModuleLoader, module: &ModuleRecord) -> Result<()> {
        let source = loader.bridge().read_text_file(&module.filename)?;
        let filename = module.filename.to_string_lossy().to_string();
        let dirname = module.dirname();

        let unit = loader.engine().compile(&source, &filename)?;
        trace!("compiled {}", filename);

        let scope = ModuleScope {
            exports: module.exports.clone(),
            require: loader
                .require_fn(dirname.clone(), Some(module.id.clone()))
                .into_value(),
            module: ModuleHandle::new(loader.cache().clone(), module.id.clone()).into_value(),
            filename,
            dirname: dirname.to_string_lossy().to_string(),
        };

        unit.invoke(scope)?;
        Ok(())
    }
}

/// Parses a JSON data module into its exports
#[derive(Debug, Clone, Copy, Default)]
pub struct DataHandler;

impl ExtensionHandler for DataHandler {
    fn load(&self, loader: &ModuleLoader, module: &ModuleRecord) -> Result<()> {
        let text = loader.bridge().read_text_file(&module.filename)?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

        let json: serde_json::Value =
            serde_json::from_str(text).map_err(|source| LoaderError::Json {
                path: module.filename.clone(),
                source,
            })?;

        loader.cache().set_exports(&module.id, Value::from_json(&json));
        Ok(())
    }
}

/// Native addons resolve, but loading them always fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeAddonHandler;

impl ExtensionHandler for NativeAddonHandler {
    fn load(&self, _loader: &ModuleLoader, module: &ModuleRecord) -> Result<()> {
        Err(LoaderError::NativeAddon(module.filename.clone()))
    }
}

/// Suffix to handler table; clones share one table
#[derive(Clone)]
pub struct ExtensionRegistry {
    handlers: Arc<RwLock<Vec<(String, Arc<dyn ExtensionHandler>)>>>,
}

impl ExtensionRegistry {
    /// An empty registry; unknown suffixes still fall back to [`SourceHandler`]
    pub fn empty() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Registry with the `.js`, `.json` and `.node` handlers
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register(SOURCE_SUFFIX, SourceHandler);
        registry.register(".json", DataHandler);
        registry.register(".node", NativeAddonHandler);
        registry
    }

    /// Register or replace the handler for `suffix` (e.g. `".txt"`)
    pub fn register(&self, suffix: impl Into<String>, handler: impl ExtensionHandler + 'static) {
        let suffix = suffix.into();
        let handler: Arc<dyn ExtensionHandler> = Arc::new(handler);
        let mut handlers = self.handlers.write();

        match handlers.iter_mut().find(|(s, _)| *s == suffix) {
            Some(entry) => entry.1 = handler,
            None => handlers.push((suffix, handler)),
        }
    }

    /// Handler for an identity, falling back to the source handler
    pub fn handler_for(&self, id: &Path) -> Arc<dyn ExtensionHandler> {
        let suffix = extension_of(id);
        let handlers = self.handlers.read();

        if let Some(suffix) = &suffix {
            if let Some((_, handler)) = handlers.iter().find(|(s, _)| s == suffix) {
                return handler.clone();
            }
        }

        debug!(
            "No handler for suffix {:?} of {}, treating it as source",
            suffix.as_deref().unwrap_or(""),
            id.display()
        );
        match handlers.iter().find(|(s, _)| s == SOURCE_SUFFIX) {
            Some((_, handler)) => handler.clone(),
            None => Arc::new(SourceHandler),
        }
    }

    /// Registered suffixes in registration order
    pub fn suffixes(&self) -> Vec<String> {
        self.handlers.read().iter().map(|(s, _)| s.clone()).collect()
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
