// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module cache for require()
//!
//! The cache is the arena for every loaded module: records refer to their
//! parent and children by identity only. Accessors return clones so no map
//! guard outlives a call.

use crate::value::Value;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Cached module entry
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Resolved identity
    pub id: PathBuf,
    /// The module's filename
    pub filename: PathBuf,
    /// The module's exports
    pub exports: Value,
    /// Whether the module has finished loading
    pub loaded: bool,
    /// Module that first required this one
    pub parent: Option<PathBuf>,
    /// Child modules required by this module
    pub children: Vec<PathBuf>,
}

impl ModuleRecord {
    /// Directory containing the module file
    pub fn dirname(&self) -> PathBuf {
        self.filename
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"))
    }
}

/// Thread-safe module cache; clones share one table
#[derive(Clone, Default)]
pub struct ModuleCache {
    /// Cache mapping resolved identities to module records
    modules: Arc<DashMap<PathBuf, ModuleRecord>>,
}

impl ModuleCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached module by identity
    pub fn get(&self, id: &Path) -> Option<ModuleRecord> {
        self.modules.get(id).map(|entry| entry.clone())
    }

    /// Check if a module is cached
    pub fn has(&self, id: &Path) -> bool {
        self.modules.contains_key(id)
    }

    /// Insert an unloaded record with a fresh empty exports object.
    ///
    /// Called before the module body runs, so a cyclic `require` finds the
    /// partially populated exports instead of loading again.
    pub fn reserve(&self, id: PathBuf, parent: Option<PathBuf>) -> ModuleRecord {
        let record = ModuleRecord {
            filename: id.clone(),
            id: id.clone(),
            exports: Value::object(),
            loaded: false,
            parent,
            children: Vec::new(),
        };
        self.modules.insert(id, record.clone());
        record
    }

    /// Remove a module from the cache and from its parent's children
    pub fn delete(&self, id: &Path) -> Option<ModuleRecord> {
        let (_, record) = self.modules.remove(id)?;
        if let Some(parent) = &record.parent {
            if let Some(mut parent) = self.modules.get_mut(parent.as_path()) {
                parent.children.retain(|child| child != id);
            }
        }
        Some(record)
    }

    /// Current exports slot of a module
    pub fn exports(&self, id: &Path) -> Option<Value> {
        self.modules.get(id).map(|entry| entry.exports.clone())
    }

    /// Replace the exports slot; returns false if the module is not cached
    pub fn set_exports(&self, id: &Path, exports: Value) -> bool {
        match self.modules.get_mut(id) {
            Some(mut entry) => {
                entry.exports = exports;
                true
            }
            None => false,
        }
    }

    /// Mark a module as fully loaded
    pub fn mark_loaded(&self, id: &Path) {
        if let Some(mut entry) = self.modules.get_mut(id) {
            entry.loaded = true;
        }
    }

    /// Record that `parent` required `child`
    pub fn add_child(&self, parent: &Path, child: &Path) {
        if parent == child {
            return;
        }
        if let Some(mut entry) = self.modules.get_mut(parent) {
            if !entry.children.iter().any(|c| c == child) {
                entry.children.push(child.to_path_buf());
            }
        }
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.modules.clear();
    }

    /// Get all cached module identities, sorted
    pub fn keys(&self) -> Vec<PathBuf> {
        let mut keys: Vec<PathBuf> = self.modules.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Get the number of cached modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_creates_unloaded_record() {
        let cache = ModuleCache::new();
        let record = cache.reserve(PathBuf::from("/app/a.js"), None);

        assert!(!record.loaded);
        assert_eq!(record.dirname(), PathBuf::from("/app"));
        assert!(cache.has(Path::new("/app/a.js")));

        let exports = cache.exports(Path::new("/app/a.js")).unwrap();
        assert!(exports.strict_equals(&record.exports));
        assert!(exports.as_object().is_some_and(|o| o.is_empty()));
    }

    #[test]
    fn test_clones_share_state() {
        let cache = ModuleCache::new();
        let view = cache.clone();
        cache.reserve(PathBuf::from("/x.js"), None);
        view.mark_loaded(Path::new("/x.js"));

        assert!(cache.get(Path::new("/x.js")).unwrap().loaded);
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_set_exports_replaces_slot() {
        let cache = ModuleCache::new();
        cache.reserve(PathBuf::from("/x.js"), None);
        assert!(cache.set_exports(Path::new("/x.js"), Value::Number(7.0)));
        assert_eq!(cache.exports(Path::new("/x.js")), Some(Value::Number(7.0)));
        assert!(!cache.set_exports(Path::new("/missing.js"), Value::Null));
    }

    #[test]
    fn test_children_and_rollback() {
        let cache = ModuleCache::new();
        let parent = PathBuf::from("/p.js");
        let child = PathBuf::from("/c.js");
        cache.reserve(parent.clone(), None);
        cache.reserve(child.clone(), Some(parent.clone()));

        cache.add_child(&parent, &child);
        cache.add_child(&parent, &child);
        assert_eq!(cache.get(&parent).unwrap().children, vec![child.clone()]);

        let removed = cache.delete(&child).unwrap();
        assert_eq!(removed.parent.as_deref(), Some(parent.as_path()));
        assert!(cache.get(&parent).unwrap().children.is_empty());
        assert_eq!(cache.keys(), vec![parent]);
    }

    #[test]
    fn test_clear() {
        let cache = ModuleCache::new();
        cache.reserve(PathBuf::from("/b.js"), None);
        cache.reserve(PathBuf::from("/a.js"), None);
        assert_eq!(cache.keys(), vec![PathBuf::from("/a.js"), PathBuf::from("/b.js")]);

        cache.clear();
        assert!(cache.is_empty());
    }
}
