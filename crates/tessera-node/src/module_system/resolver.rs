// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module path resolution (Node.js algorithm)

use super::search_paths::search_paths;
use crate::bridge::NativeBridge;
use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::path::{absolutize, normalize_path, resolve_from};
use crate::value::Value;
use dashmap::DashMap;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Prefix accepted in front of builtin module names
pub const BUILTIN_PREFIX: &str = "node:";

/// Result of module resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveResult {
    /// Built-in module (fs, path)
    Builtin(String),
    /// File module (resolved identity)
    File(PathBuf),
}

impl ResolveResult {
    /// Identity string reported by `require.resolve`
    pub fn identity(&self) -> String {
        match self {
            ResolveResult::Builtin(name) => name.clone(),
            ResolveResult::File(path) => path.to_string_lossy().to_string(),
        }
    }
}

/// Module resolver implementing the CommonJS resolution algorithm
#[derive(Clone)]
pub struct ModuleResolver {
    config: Arc<LoaderConfig>,
    bridge: Arc<dyn NativeBridge>,
    /// Registered builtin modules, shared with the loader
    builtins: Arc<DashMap<String, Value>>,
}

impl ModuleResolver {
    /// Create a new module resolver
    pub fn new(
        config: Arc<LoaderConfig>,
        bridge: Arc<dyn NativeBridge>,
        builtins: Arc<DashMap<String, Value>>,
    ) -> Self {
        Self {
            config,
            bridge,
            builtins,
        }
    }

    /// Resolve `specifier` as written in a module located in `base_dir`.
    pub fn resolve(&self, specifier: &str, base_dir: &Path) -> Result<ResolveResult> {
        if specifier.is_empty() {
            return Err(LoaderError::type_error(
                "The argument 'id' must be a non-empty string",
            ));
        }

        if let Some(name) = self.builtin_name(specifier) {
            trace!("{} resolved to builtin {}", specifier, name);
            return Ok(ResolveResult::Builtin(name));
        }

        let base = absolutize(base_dir, &self.bridge.current_dir());

        // Path specifiers never fall through to package search
        if is_path_specifier(specifier) {
            let target = resolve_from(&base, specifier);
            return self
                .resolve_candidate(&target)
                .map(ResolveResult::File)
                .ok_or_else(|| LoaderError::not_found(specifier, base.clone()));
        }

        for dir in search_paths(&base, &self.config, self.bridge.as_ref()) {
            let candidate = resolve_from(&dir, specifier);
            if let Some(hit) = self.resolve_candidate(&candidate) {
                debug!("Resolved {} to {}", specifier, hit.display());
                return Ok(ResolveResult::File(hit));
            }
        }

        Err(LoaderError::not_found(specifier, base))
    }

    /// Resolve to the identity string (`require.resolve`)
    pub fn resolve_path(&self, specifier: &str, base_dir: &Path) -> Result<String> {
        self.resolve(specifier, base_dir).map(|r| r.identity())
    }

    /// Builtin name for a specifier, accepting the `node:` prefix
    pub fn builtin_name(&self, specifier: &str) -> Option<String> {
        if !self.config.builtins {
            return None;
        }
        let name = specifier.strip_prefix(BUILTIN_PREFIX).unwrap_or(specifier);
        self.builtins.contains_key(name).then(|| name.to_string())
    }

    /// File resolution, then directory resolution, then identity
    ///
    /// Targets are normalized first, so a trailing separator (`./dir/`)
    /// still tries `dir.js` before `dir/index.js`.
    fn resolve_candidate(&self, target: &Path) -> Option<PathBuf> {
        self.resolve_as_file(target)
            .or_else(|| self.resolve_as_directory(target))
            .map(|hit| self.identity(hit))
    }

    /// `p` itself if it is a file, else `p` plus each extension in order
    pub fn resolve_as_file(&self, path: &Path) -> Option<PathBuf> {
        if self.bridge.is_file(path) {
            return Some(path.to_path_buf());
        }

        self.config
            .extensions
            .iter()
            .map(|ext| with_suffix(path, ext))
            .find(|candidate| self.bridge.is_file(candidate))
    }

    /// Descriptor `main`, then `main/index`, then `index`
    pub fn resolve_as_directory(&self, dir: &Path) -> Option<PathBuf> {
        if !self.bridge.is_directory(dir) {
            return None;
        }

        let descriptor = dir.join(&self.config.descriptor);
        if self.bridge.is_file(&descriptor) {
            match self.read_main(&descriptor) {
                Ok(Some(main)) => {
                    let main_path = resolve_from(dir, &main);
                    if let Some(hit) = self.resolve_as_file(&main_path) {
                        return Some(hit);
                    }
                    if let Some(hit) = self.resolve_as_file(&main_path.join("index")) {
                        return Some(hit);
                    }
                    trace!("main '{}' of {} did not resolve", main, descriptor.display());
                }
                Ok(None) => {}
                Err(e) => warn!("{}", e),
            }
        }

        self.resolve_as_file(&dir.join("index"))
    }

    /// Read the descriptor's `main` field; non-string values are ignored
    fn read_main(&self, descriptor: &Path) -> Result<Option<String>> {
        let parse_error = |reason: String| LoaderError::DescriptorParse {
            path: descriptor.to_path_buf(),
            reason,
        };

        let content = self
            .bridge
            .read_text_file(descriptor)
            .map_err(|e| parse_error(e.to_string()))?;
        let package: PackageDescriptor =
            serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?;

        Ok(package
            .main
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .filter(|main| !main.is_empty())
            .map(str::to_string))
    }

    /// Canonical identity for a resolved file
    fn identity(&self, hit: PathBuf) -> PathBuf {
        let hit = normalize_path(&hit);
        if self.config.preserve_symlinks {
            return hit;
        }
        self.bridge.real_path(&hit).unwrap_or(hit)
    }
}

/// Minimal package descriptor structure for resolution
#[derive(Debug, Deserialize)]
struct PackageDescriptor {
    #[serde(default)]
    main: Option<serde_json::Value>,
}

/// Relative (`./x`, `../x`, `.`, `..`) or absolute specifiers
pub fn is_path_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || (cfg!(windows) && (specifier.starts_with(".\\") || specifier.starts_with("..\\")))
        || Path::new(specifier).has_root()
}

/// Append a suffix without replacing an existing extension (`a.b` -> `a.b.js`)
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
