// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Lexical environments for variable binding.
//!
//! The outermost scope holds globals, the next one is the module function
//! scope (wrapper parameters and `var` declarations), and every block
//! pushes another scope for `let` and `const`. Calling a script function
//! pushes a fresh function scope on top of the environment it closed over.
//!
//! Scopes are shared handles, so a cloned environment (a closure) sees
//! later writes to the variables it captured.

use crate::error::{LoaderError, Result};
use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

type Scope = Arc<RwLock<FxHashMap<String, Binding>>>;

/// A stack of scopes, innermost last.
#[derive(Clone)]
pub struct Environment {
    scopes: Vec<Scope>,
    /// Index of the scope that receives `var` declarations
    function_scope: usize,
}

/// A variable binding.
struct Binding {
    /// The value
    value: Value,
    /// Whether the binding is mutable (let vs const)
    mutable: bool,
}

impl Environment {
    /// Creates an environment holding only the given globals.
    pub fn with_globals<I>(globals: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        let globals = globals
            .into_iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    Binding {
                        value,
                        mutable: true,
                    },
                )
            })
            .collect();
        Self {
            scopes: vec![Arc::new(RwLock::new(globals))],
            function_scope: 0,
        }
    }

    /// Enters a new innermost block scope.
    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Enters a new function scope; later `var` declarations land here.
    pub fn push_function_scope(&mut self) {
        self.push_scope();
        self.function_scope = self.scopes.len() - 1;
    }

    /// Leaves the innermost block scope. Function and global scopes are
    /// never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > self.function_scope + 1 {
            self.scopes.pop();
        }
    }

    /// Declares a `var` binding in the function scope.
    ///
    /// Redeclaring keeps the existing value unless an initializer is given.
    pub fn declare_var(&mut self, name: &str, value: Option<Value>) {
        let mut scope = self.scopes[self.function_scope].write();
        match scope.get_mut(name) {
            Some(binding) => {
                if let Some(value) = value {
                    binding.value = value;
                }
            }
            None => {
                scope.insert(
                    name.to_string(),
                    Binding {
                        value: value.unwrap_or_default(),
                        mutable: true,
                    },
                );
            }
        }
    }

    /// Declares a `let` or `const` binding in the innermost scope.
    pub fn declare_lexical(&mut self, name: &str, value: Value, mutable: bool) -> Result<()> {
        let depth = self.scopes.len();
        let Some(scope) = self.scopes.last() else {
            return Err(LoaderError::reference_error(format!("{} is not defined", name)));
        };
        let mut scope = scope.write();
        // Globals may be shadowed, module bindings may not be redeclared
        if depth > 1 && scope.contains_key(name) {
            return Err(LoaderError::type_error(format!(
                "Identifier '{}' has already been declared",
                name
            )));
        }
        scope.insert(name.to_string(), Binding { value, mutable });
        Ok(())
    }

    /// Looks up a binding, innermost scope first.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.read().get(name).map(|binding| binding.value.clone()))
    }

    /// Assigns to an existing binding.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        for scope in self.scopes.iter().rev() {
            let mut scope = scope.write();
            if let Some(binding) = scope.get_mut(name) {
                if !binding.mutable {
                    return Err(LoaderError::type_error("Assignment to constant variable."));
                }
                binding.value = value;
                return Ok(());
            }
        }
        Err(LoaderError::reference_error(format!("{} is not defined", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        let mut env = Environment::with_globals([("undefined", Value::Undefined)]);
        env.push_function_scope();
        env
    }

    #[test]
    fn test_block_scoping() {
        let mut env = env();
        env.declare_lexical("a", Value::Number(1.0), true).unwrap();
        env.push_scope();
        env.declare_lexical("a", Value::Number(2.0), true).unwrap();
        assert_eq!(env.get("a"), Some(Value::Number(2.0)));
        env.pop_scope();
        assert_eq!(env.get("a"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_var_is_function_scoped() {
        let mut env = env();
        env.push_scope();
        env.declare_var("v", Some(Value::string("x")));
        env.pop_scope();
        assert_eq!(env.get("v"), Some(Value::string("x")));

        env.declare_var("v", None);
        assert_eq!(env.get("v"), Some(Value::string("x")));
    }

    #[test]
    fn test_const_and_undeclared() {
        let mut env = env();
        env.declare_lexical("c", Value::Number(1.0), false).unwrap();
        let err = env.assign("c", Value::Number(2.0)).unwrap_err();
        assert!(matches!(err, LoaderError::Type(_)));

        let err = env.assign("missing", Value::Null).unwrap_err();
        assert!(matches!(err, LoaderError::Reference(_)));

        assert!(env.declare_lexical("c", Value::Null, true).is_err());
    }

    #[test]
    fn test_closure_shares_captured_scopes() {
        let mut env = env();
        env.declare_var("count", Some(Value::Number(0.0)));

        let mut closure = env.clone();
        closure.push_function_scope();
        closure.declare_var("local", Some(Value::Boolean(true)));
        closure.assign("count", Value::Number(1.0)).unwrap();

        assert_eq!(env.get("count"), Some(Value::Number(1.0)));
        assert_eq!(env.get("local"), None);
    }

    #[test]
    fn test_function_scope_is_never_popped() {
        let mut env = env();
        env.declare_var("v", Some(Value::Null));
        env.pop_scope();
        env.pop_scope();
        assert_eq!(env.get("v"), Some(Value::Null));
    }
}
