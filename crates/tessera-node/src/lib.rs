// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tessera-node
//!
//! CommonJS module resolution and loading.
//!
//! This crate turns a module specifier into a file, loads it exactly once,
//! runs it in its own scope and shares its exports through a process-wide
//! cache:
//!
//! - Node's resolution algorithm (relative, absolute and bare specifiers,
//!   `node_modules` ancestor search, `NODE_PATH`, `package.json` `main`)
//! - `require()`, `module.exports`, `require.resolve`, `require.cache`,
//!   `require.main`
//! - Handlers per file suffix (`.js`, `.json`, `.node`), extensible at runtime
//! - Builtin `fs` and `path` modules
//! - A small interpreter for CommonJS module bodies, behind the
//!   [`ScriptEngine`] trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tessera_node::ModuleLoader;
//! use std::path::Path;
//!
//! let loader = ModuleLoader::new();
//! let exports = loader.run_main(Path::new("app/main.js"))?;
//! println!("{:?}", exports);
//! # Ok::<(), tessera_node::LoaderError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bridge;
pub mod config;
pub mod error;
pub mod module_system;
pub mod path;
pub mod script;
pub mod value;

// Re-exports
pub use bridge::{NativeBridge, OsBridge};
pub use config::LoaderConfig;
pub use error::{LoaderError, Result};
pub use module_system::{
    ExtensionHandler, ExtensionRegistry, ModuleCache, ModuleLoader, ModuleLoaderBuilder,
    ModuleRecord, Require, ResolveResult,
};
pub use script::{CompiledUnit, Interpreter, ModuleScope, ScriptEngine};
pub use value::{HostObject, NativeFunction, ObjectRef, Value};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
