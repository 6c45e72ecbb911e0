// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS require() implementation
//!
//! [`Require`] is the load function bound to one directory and parent
//! module. [`ModuleHandle`] and [`CacheView`] expose cache records to script
//! code; both read the cache on every access, so `module.exports` and
//! `require.cache[id].exports` always reflect the current slot.

use super::cache::{ModuleCache, ModuleRecord};
use super::loader::ModuleLoader;
use crate::error::{LoaderError, Result};
use crate::value::{HostObject, NativeFunction, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A load function bound to a directory and an optional parent module
#[derive(Clone)]
pub struct Require {
    loader: ModuleLoader,
    dir: PathBuf,
    parent: Option<PathBuf>,
}

impl Require {
    pub(crate) fn new(loader: ModuleLoader, dir: PathBuf, parent: Option<PathBuf>) -> Self {
        Self {
            loader,
            dir,
            parent,
        }
    }

    /// require(specifier)
    pub fn call(&self, specifier: &str) -> Result<Value> {
        self.loader
            .require(specifier, &self.dir, self.parent.as_deref())
    }

    /// require.resolve(specifier) - get the resolved identity without loading
    pub fn resolve(&self, specifier: &str) -> Result<String> {
        self.loader.resolve(specifier, &self.dir)
    }

    /// require.cache
    pub fn cache(&self) -> &ModuleCache {
        self.loader.cache()
    }

    /// require.main - the entry module, if one was run
    pub fn main(&self) -> Option<ModuleRecord> {
        self.loader.main()
    }

    /// Directory specifiers are resolved against
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Wrap as a callable script value
    pub fn into_value(self) -> Value {
        Value::Host(Arc::new(self))
    }
}

impl HostObject for Require {
    fn class_name(&self) -> &str {
        "require"
    }

    fn get(&self, key: &str) -> Result<Value> {
        match key {
            "resolve" => {
                let require = self.clone();
                Ok(NativeFunction::new("resolve", move |args| {
                    let specifier = specifier_arg(args)?;
                    require.resolve(specifier).map(Value::String)
                }))
            }
            "cache" => Ok(CacheView::new(self.cache().clone()).into_value()),
            "main" => Ok(self.loader.main_value()),
            "name" => Ok(Value::string("require")),
            _ => Ok(Value::Undefined),
        }
    }

    fn call(&self, args: &[Value]) -> Result<Value> {
        let specifier = specifier_arg(args)?;
        Require::call(self, specifier)
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn keys(&self) -> Vec<String> {
        vec!["resolve".into(), "cache".into(), "main".into()]
    }
}

fn specifier_arg(args: &[Value]) -> Result<&str> {
    match args.first() {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(LoaderError::type_error(format!(
            "The \"id\" argument must be of type string. Received type {}",
            other.type_of()
        ))),
        None => Err(LoaderError::type_error(
            "The \"id\" argument must be of type string. Received undefined",
        )),
    }
}

/// Script view of one cached module (`module`, `require.cache[id]`)
#[derive(Clone)]
pub struct ModuleHandle {
    cache: ModuleCache,
    id: PathBuf,
}

impl ModuleHandle {
    /// View of the module with identity `id`
    pub fn new(cache: ModuleCache, id: PathBuf) -> Self {
        Self { cache, id }
    }

    /// The module's identity
    pub fn id(&self) -> &Path {
        &self.id
    }

    /// Wrap as a script value
    pub fn into_value(self) -> Value {
        Value::Host(Arc::new(self))
    }

    fn path_value(path: &Path) -> Value {
        Value::String(path.to_string_lossy().to_string())
    }
}

impl HostObject for ModuleHandle {
    fn class_name(&self) -> &str {
        "Module"
    }

    fn get(&self, key: &str) -> Result<Value> {
        let Some(record) = self.cache.get(&self.id) else {
            return Ok(Value::Undefined);
        };

        Ok(match key {
            "exports" => record.exports,
            "id" | "filename" => Self::path_value(&record.id),
            "path" => Self::path_value(&record.dirname()),
            "loaded" => Value::Boolean(record.loaded),
            "parent" => match record.parent {
                Some(parent) if self.cache.has(&parent) => {
                    ModuleHandle::new(self.cache.clone(), parent).into_value()
                }
                _ => Value::Null,
            },
            "children" => Value::array(
                record
                    .children
                    .into_iter()
                    .map(|child| ModuleHandle::new(self.cache.clone(), child).into_value())
                    .collect(),
            ),
            _ => Value::Undefined,
        })
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        match key {
            "exports" => {
                if !self.cache.set_exports(&self.id, value) {
                    return Err(LoaderError::type_error(format!(
                        "Module {} is no longer cached",
                        self.id.display()
                    )));
                }
                Ok(())
            }
            _ => Err(LoaderError::type_error(format!(
                "Cannot assign to read only property '{}' of Module",
                key
            ))),
        }
    }

    // `parent` and `children` are left out so serializing a module never
    // walks the graph
    fn keys(&self) -> Vec<String> {
        vec!["id".into(), "filename".into(), "loaded".into(), "exports".into()]
    }
}

/// Script view of the whole cache (`require.cache`)
#[derive(Clone)]
pub struct CacheView {
    cache: ModuleCache,
}

impl CacheView {
    /// View over `cache`
    pub fn new(cache: ModuleCache) -> Self {
        Self { cache }
    }

    /// Wrap as a script value
    pub fn into_value(self) -> Value {
        Value::Host(Arc::new(self))
    }
}

impl HostObject for CacheView {
    fn class_name(&self) -> &str {
        "ModuleCache"
    }

    fn get(&self, key: &str) -> Result<Value> {
        let id = Path::new(key);
        if self.cache.has(id) {
            Ok(ModuleHandle::new(self.cache.clone(), id.to_path_buf()).into_value())
        } else {
            Ok(Value::Undefined)
        }
    }

    fn keys(&self) -> Vec<String> {
        self.cache
            .keys()
            .into_iter()
            .map(|id| id.to_string_lossy().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(value: &Value) -> &dyn HostObject {
        match value {
            Value::Host(host) => host.as_ref(),
            other => panic!("expected host object, got {:?}", other),
        }
    }

    #[test]
    fn test_module_handle_reads_live_slot() {
        let cache = ModuleCache::new();
        let id = PathBuf::from("/app/a.js");
        cache.reserve(id.clone(), None);
        let module = ModuleHandle::new(cache.clone(), id.clone()).into_value();

        let replacement = Value::string("replaced");
        host(&module).set("exports", replacement.clone()).unwrap();
        assert_eq!(cache.exports(&id), Some(replacement.clone()));
        assert_eq!(host(&module).get("exports").unwrap(), replacement);
        assert_eq!(host(&module).get("filename").unwrap(), Value::string("/app/a.js"));
        assert_eq!(host(&module).get("loaded").unwrap(), Value::Boolean(false));
        assert!(host(&module).set("id", Value::Null).is_err());
    }

    #[test]
    fn test_module_handle_graph_views() {
        let cache = ModuleCache::new();
        let parent = PathBuf::from("/p.js");
        let child = PathBuf::from("/c.js");
        cache.reserve(parent.clone(), None);
        cache.reserve(child.clone(), Some(parent.clone()));
        cache.add_child(&parent, &child);

        let child_view = ModuleHandle::new(cache.clone(), child).into_value();
        let parent_view = host(&child_view).get("parent").unwrap();
        assert_eq!(host(&parent_view).get("id").unwrap(), Value::string("/p.js"));
        assert_eq!(host(&parent_view).get("parent").unwrap(), Value::Null);

        let Value::Array(children) = host(&parent_view).get("children").unwrap() else {
            panic!("children should be an array");
        };
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn test_cache_view() {
        let cache = ModuleCache::new();
        cache.reserve(PathBuf::from("/x.js"), None);
        let view = CacheView::new(cache).into_value();

        assert_eq!(host(&view).keys(), vec!["/x.js"]);
        assert!(host(&view).get("/missing.js").unwrap().is_undefined());
        let entry = host(&view).get("/x.js").unwrap();
        assert!(host(&entry).get("exports").unwrap().as_object().is_some());
    }

    #[test]
    fn test_specifier_must_be_string() {
        assert!(specifier_arg(&[Value::Number(1.0)]).is_err());
        assert!(specifier_arg(&[]).is_err());
        assert_eq!(specifier_arg(&[Value::string("./a")]).unwrap(), "./a");
    }
}
