// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS module system
//!
//! - `require()` with Node's resolution algorithm (relative, absolute and
//!   bare specifiers, `package.json` `main`, `index` fallback)
//! - `module.exports` / `exports`, `require.resolve`, `require.cache`,
//!   `require.main`
//! - Per-suffix handlers for `.js`, `.json` and `.node`
//! - Cycle tolerance: a module is cached before its body runs

mod builtins;
mod cache;
mod extensions;
mod loader;
mod require;
mod resolver;
mod search_paths;

pub use builtins::{create_builtin, create_fs_module, create_path_module, BUILTIN_MODULES};
pub use cache::{ModuleCache, ModuleRecord};
pub use extensions::{
    DataHandler, ExtensionHandler, ExtensionRegistry, NativeAddonHandler, SourceHandler,
    SOURCE_SUFFIX,
};
pub use loader::{ModuleLoader, ModuleLoaderBuilder, EVAL_ID};
pub use require::{CacheView, ModuleHandle, Require};
pub use resolver::{is_path_specifier, ModuleResolver, ResolveResult, BUILTIN_PREFIX};
pub use search_paths::search_paths;
