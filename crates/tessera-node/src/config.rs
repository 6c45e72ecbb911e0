// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader configuration.
//!
//! Defaults follow Node's conventions. Values can be layered from the user
//! config file, a project `tessera.toml`, and `TESSERA_*` environment
//! variables, in that order.

use crate::error::{LoaderError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the project-level configuration file
pub const PROJECT_CONFIG_FILE: &str = "tessera.toml";

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "TESSERA_";

/// Configuration for module resolution and loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoaderConfig {
    /// Directory name that holds installed packages
    pub package_root: String,

    /// Package descriptor file name
    pub descriptor: String,

    /// Environment variable holding extra search directories
    pub path_env: String,

    /// Upper bound on ancestor directories visited per search
    pub max_search_depth: usize,

    /// Suffixes tried during file resolution, in priority order
    pub extensions: Vec<String>,

    /// Search directories appended after the environment ones
    pub extra_paths: Vec<PathBuf>,

    /// Keep symlinked paths as identities instead of their real paths
    pub preserve_symlinks: bool,

    /// Expose the builtin `fs` and `path` modules
    pub builtins: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            package_root: "node_modules".to_string(),
            descriptor: "package.json".to_string(),
            path_env: "NODE_PATH".to_string(),
            max_search_depth: 100,
            extensions: vec![".js".to_string(), ".json".to_string(), ".node".to_string()],
            extra_paths: Vec::new(),
            preserve_symlinks: false,
            builtins: true,
        }
    }
}

impl LoaderConfig {
    /// Load configuration from default locations relative to `cwd`.
    pub fn load(cwd: &Path) -> Result<Self> {
        let mut config = LoaderConfig::default();

        if let Some(user_config_path) = user_config_path() {
            if user_config_path.is_file() {
                config.merge_from_file(&user_config_path)?;
            }
        }

        let project_config = cwd.join(PROJECT_CONFIG_FILE);
        if project_config.is_file() {
            config.merge_from_file(&project_config)?;
        }

        config.load_from_env(std::env::vars())?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a complete configuration document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: LoaderConfig =
            toml::from_str(content).map_err(|e| LoaderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Merge configuration from a TOML file; keys absent from the file keep
    /// their current value.
    pub fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| LoaderError::io(path, e))?;
        let table: toml::Table = content
            .parse()
            .map_err(|e| LoaderError::Config(format!("{}: {}", path.display(), e)))?;

        for (key, value) in &table {
            self.apply(key, value)?;
        }

        Ok(())
    }

    /// Apply `TESSERA_*` variables, e.g. `TESSERA_PACKAGE_ROOT=vendor`.
    pub fn load_from_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                let config_key = config_key.to_lowercase().replace('_', "-");
                self.set(&config_key, &value)?;
            }
        }
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &toml::Value) -> Result<()> {
        match value {
            toml::Value::String(s) => self.set(key, s),
            toml::Value::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| match item {
                        toml::Value::String(s) => Ok(s.clone()),
                        other => Err(LoaderError::Config(format!(
                            "{} entries must be strings, found {}",
                            key, other
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.set_list(key, items)
            }
            other => self.set(key, &other.to_string()),
        }
    }

    /// Set a configuration value from its string form.
    ///
    /// List values are separated by the platform path delimiter.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "package-root" => self.package_root = value.to_string(),
            "descriptor" => self.descriptor = value.to_string(),
            "path-env" => self.path_env = value.to_string(),
            "max-search-depth" => {
                self.max_search_depth = value.parse().map_err(|_| {
                    LoaderError::Config(format!("max-search-depth must be a number: {}", value))
                })?
            }
            "preserve-symlinks" => self.preserve_symlinks = parse_bool(key, value)?,
            "builtins" => self.builtins = parse_bool(key, value)?,
            "extensions" | "extra-paths" => {
                let items = value
                    .split(crate::path::DELIMITER)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                self.set_list(key, items)?;
            }
            _ => return Err(LoaderError::Config(format!("unknown key '{}'", key))),
        }
        Ok(())
    }

    fn set_list(&mut self, key: &str, items: Vec<String>) -> Result<()> {
        match key {
            "extensions" => self.extensions = items,
            "extra-paths" => self.extra_paths = items.into_iter().map(PathBuf::from).collect(),
            _ => return Err(LoaderError::Config(format!("'{}' is not a list", key))),
        }
        Ok(())
    }

    /// Check that the configuration can drive resolution.
    pub fn validate(&self) -> Result<()> {
        if self.package_root.is_empty() {
            return Err(LoaderError::Config("package-root must not be empty".into()));
        }
        if self.descriptor.is_empty() {
            return Err(LoaderError::Config("descriptor must not be empty".into()));
        }
        if self.max_search_depth == 0 {
            return Err(LoaderError::Config("max-search-depth must be at least 1".into()));
        }
        if let Some(bad) = self.extensions.iter().find(|e| !e.starts_with('.') || e.len() < 2) {
            return Err(LoaderError::Config(format!(
                "extension '{}' must start with a dot",
                bad
            )));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(LoaderError::Config(format!(
            "{} must be true or false: {}",
            key, value
        ))),
    }
}

/// Get the user config path.
fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tessera").join("config.toml"))
}
