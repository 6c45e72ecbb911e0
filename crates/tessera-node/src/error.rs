// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for module resolution and loading

use crate::value::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while resolving or loading modules
#[derive(Debug, Error)]
pub enum LoaderError {
    /// No resolution rule matched any candidate
    #[error("Cannot find module '{specifier}' from '{}'", base.display())]
    NotFound {
        /// The specifier as written by the requesting code
        specifier: String,
        /// Directory the specifier was resolved against
        base: PathBuf,
    },

    /// Package descriptor present but unreadable or malformed.
    ///
    /// Resolution logs this and continues past the descriptor.
    #[error("Invalid package descriptor {}: {reason}", path.display())]
    DescriptorParse {
        /// Descriptor file
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// File system error
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        /// Path involved in the failed operation
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Data module parse error
    #[error("Failed to parse {}: {source}", path.display())]
    Json {
        /// Data module path
        path: PathBuf,
        /// Underlying parser error
        #[source]
        source: serde_json::Error,
    },

    /// Source text could not be compiled
    #[error("SyntaxError: {message} ({filename}:{line})")]
    Syntax {
        /// File being compiled
        filename: String,
        /// 1-based line of the offending token
        line: usize,
        /// Description of the problem
        message: String,
    },

    /// A module body raised a value with `throw`
    #[error("Uncaught {}", .0.describe_error())]
    Thrown(Value),

    /// Type error raised while evaluating a module body
    #[error("TypeError: {0}")]
    Type(String),

    /// Reference to an undeclared binding
    #[error("ReferenceError: {0}")]
    Reference(String),

    /// Native addons resolve but cannot be loaded
    #[error("Native addons are not supported: {}", .0.display())]
    NativeAddon(PathBuf),

    /// Invalid loader configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LoaderError {
    /// Create a module not found error
    pub fn not_found(specifier: impl Into<String>, base: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            specifier: specifier.into(),
            base: base.into(),
        }
    }

    /// Create a new TypeError
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    /// Create a new ReferenceError
    pub fn reference_error(msg: impl Into<String>) -> Self {
        Self::Reference(msg.into())
    }

    /// Wrap an I/O error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this is a resolution failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
