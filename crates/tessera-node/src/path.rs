// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Pure path arithmetic used by resolution and by the builtin `path` module.
//!
//! Nothing in here touches the file system. Normalization is lexical: `..`
//! pops the previous segment, it never follows symlinks.

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// Path segment separator
pub const SEP: char = MAIN_SEPARATOR;

/// Path list delimiter (`:` on Unix, `;` on Windows)
pub const DELIMITER: char = if cfg!(windows) { ';' } else { ':' };

/// Lexically normalize a path: drop `.`, fold `..`, collapse separators.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(segment) => out.push(segment),
        }
    }

    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

/// Resolve `path` against `base`, returning a normalized path.
///
/// An absolute `path` ignores `base`.
pub fn resolve_from(base: &Path, path: impl AsRef<Path>) -> PathBuf {
    normalize_path(&base.join(path))
}

/// Make `path` absolute against `cwd` and normalize it.
pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        resolve_from(cwd, path)
    }
}

/// Extension of the final segment including the dot (`.js`), if any.
///
/// Dotfiles such as `.eslintrc` have no extension.
pub fn extension_of(path: &Path) -> Option<String> {
    let ext = extname(&path.to_string_lossy());
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// Returns true if the path ends with the given segment name
pub fn ends_with_segment(path: &Path, segment: &str) -> bool {
    matches!(
        path.components().next_back(),
        Some(Component::Normal(last)) if last == segment
    )
}

/// path.basename(path, ext?)
pub fn basename(path: &str, ext: Option<&str>) -> String {
    let p = Path::new(path);
    let name = p
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    match ext {
        Some(ext) if name.ends_with(ext) && name != ext => name[..name.len() - ext.len()].to_string(),
        _ => name,
    }
}

/// path.dirname(path)
pub fn dirname(path: &str) -> String {
    let p = Path::new(path);
    match p.parent() {
        Some(parent) if parent.as_os_str().is_empty() => ".".to_string(),
        Some(parent) => parent.to_string_lossy().to_string(),
        // The root is its own parent
        None if p.has_root() => path.to_string(),
        None => ".".to_string(),
    }
}

/// path.extname(path)
pub fn extname(path: &str) -> String {
    let base = basename(path, None);
    match base.rfind('.') {
        Some(0) | None => String::new(),
        Some(dot) => base[dot..].to_string(),
    }
}

/// path.isAbsolute(path)
pub fn is_absolute(path: &str) -> bool {
    Path::new(path).has_root()
}

/// path.join(...paths)
///
/// Unlike [`resolve`], later absolute segments do not reset the result.
pub fn join(paths: &[&str]) -> String {
    let joined = paths
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(&SEP.to_string());
    if joined.is_empty() {
        return ".".to_string();
    }
    normalize(&joined)
}

/// path.normalize(path)
pub fn normalize(path: &str) -> String {
    normalize_path(Path::new(path)).to_string_lossy().to_string()
}

/// path.resolve(...paths) against an explicit working directory
pub fn resolve(cwd: &Path, paths: &[&str]) -> String {
    let mut result = cwd.to_path_buf();
    for p in paths {
        // PathBuf::push replaces the buffer when `p` is absolute
        result.push(p);
    }
    normalize_path(&result).to_string_lossy().to_string()
}

/// path.parse(path)
pub fn parse(path: &str) -> ParsedPath {
    let p = Path::new(path);

    let root = match p.components().next() {
        Some(Component::Prefix(prefix)) => {
            let mut root = prefix.as_os_str().to_string_lossy().to_string();
            if p.has_root() {
                root.push(SEP);
            }
            root
        }
        Some(Component::RootDir) => SEP.to_string(),
        _ => String::new(),
    };

    let base = basename(path, None);
    let ext = extname(path);
    let name = base[..base.len() - ext.len()].to_string();
    let dir = if base.is_empty() {
        root.clone()
    } else {
        dirname(path)
    };

    ParsedPath {
        root,
        dir,
        base,
        ext,
        name,
    }
}

/// Parsed path object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    /// Root (e.g., "/" or "C:\\")
    pub root: String,
    /// Directory (e.g., "/home/user")
    pub dir: String,
    /// Base name with extension (e.g., "file.txt")
    pub base: String,
    /// Extension including dot (e.g., ".txt")
    pub ext: String,
    /// Name without extension (e.g., "file")
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basename() {
        assert_eq!(basename("/foo/bar/baz.txt", None), "baz.txt");
        assert_eq!(basename("/foo/bar/baz.txt", Some(".txt")), "baz");
        assert_eq!(basename("/foo/bar/", None), "bar");
    }

    #[test]
    fn test_dirname() {
        assert_eq!(dirname("/foo/bar/baz.txt"), "/foo/bar");
        assert_eq!(dirname("/foo/bar"), "/foo");
        assert_eq!(dirname("foo"), ".");
        assert_eq!(dirname("/"), "/");
    }

    #[test]
    fn test_extname() {
        assert_eq!(extname("file.txt"), ".txt");
        assert_eq!(extname("file.tar.gz"), ".gz");
        assert_eq!(extname("file"), "");
        assert_eq!(extname(".hidden"), "");
        assert_eq!(extension_of(Path::new("/a/b.json")).as_deref(), Some(".json"));
        assert_eq!(extension_of(Path::new("/a/b")), None);
    }

    #[test]
    fn test_join() {
        assert_eq!(join(&["foo", "bar", "baz"]), "foo/bar/baz");
        assert_eq!(join(&["/foo", "bar", "baz"]), "/foo/bar/baz");
        assert_eq!(join(&["foo", "../bar"]), "bar");
        assert_eq!(join(&["/foo", "/bar"]), "/foo/bar");
        assert_eq!(join(&[]), ".");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/foo/bar//baz/asdf/quux/.."), "/foo/bar/baz/asdf");
        assert_eq!(normalize("foo/bar/../baz"), "foo/baz");
        assert_eq!(normalize("../foo"), "../foo");
        assert_eq!(normalize("/.."), "/");
        assert_eq!(normalize("./"), ".");
    }

    #[test]
    fn test_resolve() {
        let cwd = Path::new("/work/app");
        assert_eq!(resolve(cwd, &["lib", "./x.js"]), "/work/app/lib/x.js");
        assert_eq!(resolve(cwd, &["../other"]), "/work/other");
        assert_eq!(resolve(cwd, &["/abs", "y"]), "/abs/y");
        assert_eq!(
            resolve_from(Path::new("/a/b"), "../c/./d.js"),
            PathBuf::from("/a/c/d.js")
        );
        assert_eq!(
            absolutize(Path::new("rel"), Path::new("/cwd")),
            PathBuf::from("/cwd/rel")
        );
    }

    #[test]
    fn test_parse() {
        let parsed = parse("/home/user/file.txt");
        assert_eq!(parsed.root, "/");
        assert_eq!(parsed.dir, "/home/user");
        assert_eq!(parsed.base, "file.txt");
        assert_eq!(parsed.ext, ".txt");
        assert_eq!(parsed.name, "file");

        let root = parse("/");
        assert_eq!(root.root, "/");
        assert_eq!(root.dir, "/");
        assert_eq!(root.base, "");
    }

    #[test]
    fn test_is_absolute() {
        assert!(is_absolute("/foo/bar"));
        assert!(!is_absolute("foo/bar"));
        assert!(!is_absolute("./foo"));
    }

    #[test]
    fn test_ends_with_segment() {
        assert!(ends_with_segment(Path::new("/a/node_modules"), "node_modules"));
        assert!(!ends_with_segment(Path::new("/a/node_modules_x"), "node_modules"));
        assert!(!ends_with_segment(Path::new("/"), "node_modules"));
    }
}
