// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module loader - resolves, caches and executes modules

use super::builtins::{create_builtin, BUILTIN_MODULES};
use super::cache::{ModuleCache, ModuleRecord};
use super::extensions::ExtensionRegistry;
use super::require::{ModuleHandle, Require};
use super::resolver::{ModuleResolver, ResolveResult};
use crate::bridge::{NativeBridge, OsBridge};
use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::path::absolutize;
use crate::script::{Interpreter, ModuleScope, ScriptEngine};
use crate::value::{ObjectRef, Value};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Identity used for snippets run through [`ModuleLoader::eval`]
pub const EVAL_ID: &str = "[eval]";

/// Module loader; clones share the cache, builtins and registry
#[derive(Clone)]
pub struct ModuleLoader {
    inner: Arc<LoaderInner>,
}

struct LoaderInner {
    config: Arc<LoaderConfig>,
    bridge: Arc<dyn NativeBridge>,
    engine: Arc<dyn ScriptEngine>,
    resolver: ModuleResolver,
    cache: ModuleCache,
    extensions: ExtensionRegistry,
    builtins: Arc<DashMap<String, Value>>,
    main: RwLock<Option<PathBuf>>,
}

impl ModuleLoader {
    /// Create a loader with default configuration over the real file system
    pub fn new() -> Self {
        Self::from_parts(
            LoaderConfig::default(),
            Arc::new(OsBridge::new()),
            Arc::new(Interpreter::new()),
            ModuleCache::new(),
            ExtensionRegistry::new(),
        )
    }

    /// Start building a customized loader
    pub fn builder() -> ModuleLoaderBuilder {
        ModuleLoaderBuilder::default()
    }

    fn from_parts(
        config: LoaderConfig,
        bridge: Arc<dyn NativeBridge>,
        engine: Arc<dyn ScriptEngine>,
        cache: ModuleCache,
        extensions: ExtensionRegistry,
    ) -> Self {
        let config = Arc::new(config);
        let builtins = Arc::new(DashMap::new());

        if config.builtins {
            for name in BUILTIN_MODULES {
                if let Some(exports) = create_builtin(name, &bridge) {
                    builtins.insert(name.to_string(), exports);
                }
            }
        }

        let resolver = ModuleResolver::new(config.clone(), bridge.clone(), builtins.clone());

        Self {
            inner: Arc::new(LoaderInner {
                config,
                bridge,
                engine,
                resolver,
                cache,
                extensions,
                builtins,
                main: RwLock::new(None),
            }),
        }
    }

    /// Load `specifier` as required from a module in `base_dir`.
    ///
    /// A cached module, loaded or still loading, is returned without running
    /// again. On failure the module is removed from the cache and the error
    /// is returned unchanged.
    #[instrument(level = "debug", skip(self))]
    pub fn require(
        &self,
        specifier: &str,
        base_dir: &Path,
        parent: Option<&Path>,
    ) -> Result<Value> {
        match self.inner.resolver.resolve(specifier, base_dir)? {
            ResolveResult::Builtin(name) => self
                .builtin(&name)
                .ok_or_else(|| LoaderError::not_found(specifier, base_dir)),
            ResolveResult::File(id) => self.load(id, parent),
        }
    }

    fn load(&self, id: PathBuf, parent: Option<&Path>) -> Result<Value> {
        let cache = &self.inner.cache;

        if let Some(record) = cache.get(&id) {
            trace!(loaded = record.loaded, "cache hit for {}", id.display());
            if let Some(parent) = parent {
                cache.add_child(parent, &id);
            }
            return Ok(record.exports);
        }

        debug!("Loading {}", id.display());
        let record = cache.reserve(id.clone(), parent.map(Path::to_path_buf));
        if let Some(parent) = parent {
            cache.add_child(parent, &id);
        }

        let handler = self.inner.extensions.handler_for(&id);
        if let Err(e) = handler.load(self, &record) {
            debug!("Loading {} failed, rolling back: {}", id.display(), e);
            cache.delete(&id);
            return Err(e);
        }

        cache.mark_loaded(&id);
        Ok(cache.exports(&id).unwrap_or_default())
    }

    /// Run `path` as the entry module; `require.main` points at it while
    /// it loads and afterwards. A failed entry clears `require.main` again.
    #[instrument(level = "debug", skip(self))]
    pub fn run_main(&self, path: &Path) -> Result<Value> {
        let cwd = self.inner.bridge.current_dir();
        let target = absolutize(path, &cwd);
        let specifier = target.to_string_lossy().to_string();

        let id = match self.inner.resolver.resolve(&specifier, &cwd)? {
            ResolveResult::File(id) => id,
            ResolveResult::Builtin(_) => return Err(LoaderError::not_found(specifier, cwd)),
        };

        *self.inner.main.write() = Some(id.clone());
        let result = self.load(id, None);
        if result.is_err() {
            *self.inner.main.write() = None;
        }
        result
    }

    /// Evaluate a snippet with a `require` bound to `dir`.
    ///
    /// The snippet is not cached; its completion value is returned.
    pub fn eval(&self, source: &str, dir: &Path) -> Result<Value> {
        let dir = absolutize(dir, &self.inner.bridge.current_dir());
        let filename = dir.join(EVAL_ID).to_string_lossy().to_string();
        let unit = self.inner.engine.compile(source, EVAL_ID)?;

        let exports = Value::object();
        let module = ObjectRef::from_entries([
            ("id", Value::string(EVAL_ID)),
            ("filename", Value::string(filename.clone())),
            ("exports", exports.clone()),
            ("loaded", Value::Boolean(false)),
        ]);

        unit.invoke(ModuleScope {
            exports,
            require: self.require_fn(dir.clone(), None).into_value(),
            module: Value::Object(module),
            filename,
            dirname: dir.to_string_lossy().to_string(),
        })
    }

    /// Create a load function bound to `dir`; loads record `parent` as parent
    pub fn require_fn(&self, dir: impl Into<PathBuf>, parent: Option<PathBuf>) -> Require {
        Require::new(self.clone(), dir.into(), parent)
    }

    /// Resolve without loading, returning the identity string
    pub fn resolve(&self, specifier: &str, base_dir: &Path) -> Result<String> {
        self.inner.resolver.resolve_path(specifier, base_dir)
    }

    /// Register (or replace) a builtin module by bare name
    pub fn register_builtin(&self, name: impl Into<String>, exports: Value) {
        self.inner.builtins.insert(name.into(), exports);
    }

    /// Exports of a registered builtin
    pub fn builtin(&self, name: &str) -> Option<Value> {
        self.inner.builtins.get(name).map(|entry| entry.clone())
    }

    /// The entry module record, if one was run
    pub fn main(&self) -> Option<ModuleRecord> {
        self.main_id().and_then(|id| self.inner.cache.get(&id))
    }

    /// Identity of the entry module, if one was run
    pub fn main_id(&self) -> Option<PathBuf> {
        self.inner.main.read().clone()
    }

    /// Script view of the entry module, or `null`
    pub fn main_value(&self) -> Value {
        match self.main_id() {
            Some(id) => ModuleHandle::new(self.inner.cache.clone(), id).into_value(),
            None => Value::Null,
        }
    }

    /// Get the module cache
    pub fn cache(&self) -> &ModuleCache {
        &self.inner.cache
    }

    /// Get the extension registry
    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.inner.extensions
    }

    /// Get the resolver
    pub fn resolver(&self) -> &ModuleResolver {
        &self.inner.resolver
    }

    /// Active configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// The native bridge used for all host access
    pub fn bridge(&self) -> &dyn NativeBridge {
        self.inner.bridge.as_ref()
    }

    /// The engine that compiles source modules
    pub fn engine(&self) -> &dyn ScriptEngine {
        self.inner.engine.as_ref()
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`ModuleLoader`]
#[derive(Default)]
pub struct ModuleLoaderBuilder {
    config: Option<LoaderConfig>,
    bridge: Option<Arc<dyn NativeBridge>>,
    engine: Option<Arc<dyn ScriptEngine>>,
    cache: Option<ModuleCache>,
    extensions: Option<ExtensionRegistry>,
}

impl ModuleLoaderBuilder {
    /// Use this configuration
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use this native bridge
    pub fn bridge(mut self, bridge: impl NativeBridge + 'static) -> Self {
        self.bridge = Some(Arc::new(bridge));
        self
    }

    /// Use this script engine
    pub fn engine(mut self, engine: impl ScriptEngine + 'static) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    /// Share an existing cache
    pub fn cache(mut self, cache: ModuleCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Share an existing extension registry
    pub fn extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Validate the configuration and build the loader
    pub fn build(self) -> Result<ModuleLoader> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(ModuleLoader::from_parts(
            config,
            self.bridge.unwrap_or_else(|| Arc::new(OsBridge::new())),
            self.engine.unwrap_or_else(|| Arc::new(Interpreter::new())),
            self.cache.unwrap_or_default(),
            self.extensions.unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn loader() -> ModuleLoader {
        ModuleLoader::builder()
            .bridge(OsBridge::new().with_env([("NODE_PATH", "")]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builtins_are_registered() {
        let loader = loader();
        let fs_module = loader.require("fs", Path::new("/"), None).unwrap();
        let again = loader.require("node:fs", Path::new("/"), None).unwrap();
        assert!(fs_module.strict_equals(&again));
        assert!(loader.cache().is_empty());
    }

    #[test]
    fn test_builtins_can_be_disabled() {
        let loader = ModuleLoader::builder()
            .config(LoaderConfig {
                builtins: false,
                ..LoaderConfig::default()
            })
            .bridge(OsBridge::new().with_env([("NODE_PATH", "")]))
            .build()
            .unwrap();
        let dir = tempdir().unwrap();
        let err = loader.require("fs", dir.path(), None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_register_builtin() {
        let loader = loader();
        loader.register_builtin("answer", Value::Number(42.0));
        assert_eq!(
            loader.require("answer", Path::new("/"), None).unwrap(),
            Value::Number(42.0)
        );
        assert_eq!(loader.resolve("node:answer", Path::new("/")).unwrap(), "answer");
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = ModuleLoader::builder()
            .config(LoaderConfig {
                max_search_depth: 0,
                ..LoaderConfig::default()
            })
            .build();
        assert!(matches!(result, Err(LoaderError::Config(_))));
    }

    #[test]
    fn test_eval_uses_bound_require() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("data.json"), r#"{"n": 3}"#).unwrap();

        let loader = loader();
        let value = loader
            .eval("const d = require('./data'); d.n * 2", &root)
            .unwrap();
        assert_eq!(value, Value::Number(6.0));
        assert_eq!(loader.cache().keys(), vec![root.join("data.json")]);
    }

    #[test]
    fn test_custom_handler() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("notes.txt"), "plain text").unwrap();

        let loader = loader();
        loader
            .extensions()
            .register(".txt", |loader: &ModuleLoader, module: &ModuleRecord| -> Result<()> {
                let text = loader.bridge().read_text_file(&module.filename)?;
                loader.cache().set_exports(&module.id, Value::String(text));
                Ok(())
            });

        let value = loader.require("./notes.txt", &root, None).unwrap();
        assert_eq!(value, Value::string("plain text"));
    }

    #[test]
    fn test_loader_clones_share_cache() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("a.js"), "exports.x = 1").unwrap();

        let loader = loader();
        let other = loader.clone();
        let first = loader.require("./a", &root, None).unwrap();
        let second = other.require("./a", &root, None).unwrap();
        assert!(first.strict_equals(&second));
    }
}
