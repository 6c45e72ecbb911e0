// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Package search directory enumeration

use crate::bridge::NativeBridge;
use crate::config::LoaderConfig;
use crate::path::{absolutize, ends_with_segment, DELIMITER};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Directories searched for a bare specifier, nearest first.
///
/// Ancestor `node_modules` directories of `start_dir` come first, then the
/// entries of the path-list environment variable, then configured
/// `extra_paths`. Relative entries are resolved against the bridge's cwd.
pub fn search_paths(
    start_dir: &Path,
    config: &LoaderConfig,
    bridge: &dyn NativeBridge,
) -> Vec<PathBuf> {
    let cwd = bridge.current_dir();
    let mut paths = Vec::new();
    let mut visited = FxHashSet::default();
    let mut current = absolutize(start_dir, &cwd);

    for _ in 0..config.max_search_depth {
        if !visited.insert(current.clone()) {
            break;
        }

        // `node_modules/node_modules` is never a package directory
        if !ends_with_segment(&current, &config.package_root) {
            paths.push(current.join(&config.package_root));
        }

        match current.parent() {
            Some(parent) if parent != current => current = parent.to_path_buf(),
            _ => break,
        }
    }

    if let Some(list) = bridge.env_var(&config.path_env) {
        paths.extend(
            list.split(DELIMITER)
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(|entry| absolutize(Path::new(entry), &cwd)),
        );
    }

    paths.extend(config.extra_paths.iter().map(|p| absolutize(p, &cwd)));

    trace!("search paths for {}: {:?}", start_dir.display(), paths);
    paths
}
