// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script evaluation seam.
//!
//! Source modules are compiled once into a [`CompiledUnit`] and invoked with
//! the five wrapper bindings (`exports`, `require`, `module`, `__filename`,
//! `__dirname`). [`Interpreter`] is the built-in engine; embedders can plug
//! in their own through [`ScriptEngine`].

pub mod ast;
pub mod environment;
pub mod globals;
pub mod interpreter;
pub mod lexer;
pub mod parser;

pub use interpreter::Interpreter;

use crate::error::Result;
use crate::value::Value;

/// Names bound in every module body, in wrapper parameter order
pub const WRAPPER_PARAMS: [&str; 5] = ["exports", "require", "module", "__filename", "__dirname"];

/// The values a module body is invoked with
#[derive(Debug, Clone)]
pub struct ModuleScope {
    /// Initial `module.exports`
    pub exports: Value,
    /// The module's `require` function
    pub require: Value,
    /// The module object
    pub module: Value,
    /// Absolute file name
    pub filename: String,
    /// Directory of the file
    pub dirname: String,
}

impl ModuleScope {
    /// Bindings paired with [`WRAPPER_PARAMS`]
    pub fn into_bindings(self) -> [(&'static str, Value); 5] {
        let [exports, require, module, filename, dirname] = WRAPPER_PARAMS;
        [
            (exports, self.exports),
            (require, self.require),
            (module, self.module),
            (filename, Value::String(self.filename)),
            (dirname, Value::String(self.dirname)),
        ]
    }
}

/// Compiles module source text
pub trait ScriptEngine: Send + Sync {
    /// Parse `source`; `filename` is used in syntax errors
    fn compile(&self, source: &str, filename: &str) -> Result<Box<dyn CompiledUnit>>;
}

/// A compiled module body
pub trait CompiledUnit {
    /// Run the body; returns the value of the last expression statement
    fn invoke(&self, scope: ModuleScope) -> Result<Value>;
}
