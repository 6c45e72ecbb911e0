// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Native bridge: synchronous file system and environment primitives.
//!
//! Resolution and the builtin handlers only talk to the outside world
//! through [`NativeBridge`], so tests can pin the environment and the
//! working directory without touching process-global state.

use crate::error::{LoaderError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Synchronous host operations consumed by the loader
pub trait NativeBridge: Send + Sync {
    /// Whether anything exists at `path`
    fn file_exists(&self, path: &Path) -> bool;

    /// Whether `path` is a regular file (symlinks are followed)
    fn is_file(&self, path: &Path) -> bool;

    /// Whether `path` is a directory (symlinks are followed)
    fn is_directory(&self, path: &Path) -> bool;

    /// Read a UTF-8 text file
    fn read_text_file(&self, path: &Path) -> Result<String>;

    /// Write a UTF-8 text file, replacing existing content
    fn write_text_file(&self, path: &Path, text: &str) -> Result<()>;

    /// Entry names of a directory, sorted
    fn list_directory(&self, path: &Path) -> Result<Vec<String>>;

    /// Current working directory
    fn current_dir(&self) -> PathBuf;

    /// Canonical path with symlinks resolved, if it can be determined
    fn real_path(&self, path: &Path) -> Option<PathBuf>;

    /// Snapshot of the environment variables
    fn env_snapshot(&self) -> HashMap<String, String>;

    /// Single environment variable
    fn env_var(&self, name: &str) -> Option<String> {
        self.env_snapshot().remove(name)
    }
}

/// Bridge backed by `std::fs` and `std::env`
#[derive(Debug, Clone, Default)]
pub struct OsBridge {
    /// Replaces the process environment when set
    env: Option<HashMap<String, String>>,
    /// Replaces the process working directory when set
    cwd: Option<PathBuf>,
}

impl OsBridge {
    /// Bridge over the real process environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed environment instead of the process environment
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Use a fixed working directory instead of the process one
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

impl NativeBridge for OsBridge {
    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_text_file(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| LoaderError::io(path, e))
    }

    fn write_text_file(&self, path: &Path, text: &str) -> Result<()> {
        fs::write(path, text).map_err(|e| LoaderError::io(path, e))
    }

    fn list_directory(&self, path: &Path) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(path)
            .map_err(|e| LoaderError::io(path, e))?
            .map(|entry| {
                entry
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .map_err(|e| LoaderError::io(path, e))
            })
            .collect::<Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    }

    fn current_dir(&self) -> PathBuf {
        match &self.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    fn real_path(&self, path: &Path) -> Option<PathBuf> {
        fs::canonicalize(path).ok()
    }

    fn env_snapshot(&self) -> HashMap<String, String> {
        match &self.env {
            Some(env) => env.clone(),
            None => std::env::vars().collect(),
        }
    }

    fn env_var(&self, name: &str) -> Option<String> {
        match &self.env {
            Some(env) => env.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }
}
