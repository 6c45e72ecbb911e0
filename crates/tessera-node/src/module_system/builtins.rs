// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Builtin `fs` and `path` modules
//!
//! Both are plain objects of native functions, registered on the loader by
//! bare name. File access goes through the [`NativeBridge`]; relative paths
//! are resolved against the bridge's working directory.

use crate::bridge::NativeBridge;
use crate::error::{LoaderError, Result};
use crate::path::{self as algebra, absolutize, DELIMITER, SEP};
use crate::value::{NativeFunction, ObjectRef, Value};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builtin module names, in registration order
pub const BUILTIN_MODULES: &[&str] = &["fs", "path"];

/// Create the exports of a builtin module by name
pub fn create_builtin(name: &str, bridge: &Arc<dyn NativeBridge>) -> Option<Value> {
    match name {
        "fs" => Some(create_fs_module(bridge.clone())),
        "path" => Some(create_path_module(bridge.clone())),
        _ => None,
    }
}

/// Create the fs module
pub fn create_fs_module(bridge: Arc<dyn NativeBridge>) -> Value {
    let fs = ObjectRef::new();

    let b = bridge.clone();
    fs.set(
        "readFileSync",
        NativeFunction::new("readFileSync", move |args| {
            let path = path_arg(b.as_ref(), args, 0)?;
            b.read_text_file(&path).map(Value::String)
        }),
    );

    let b = bridge.clone();
    fs.set(
        "writeFileSync",
        NativeFunction::new("writeFileSync", move |args| {
            let path = path_arg(b.as_ref(), args, 0)?;
            let data = match args.get(1) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => {
                    return Err(LoaderError::type_error(
                        "The \"data\" argument must be of type string",
                    ))
                }
            };
            b.write_text_file(&path, &data)?;
            Ok(Value::Undefined)
        }),
    );

    let b = bridge.clone();
    fs.set(
        "existsSync",
        NativeFunction::new("existsSync", move |args| {
            // Invalid arguments report false rather than throwing
            Ok(Value::Boolean(
                path_arg(b.as_ref(), args, 0).is_ok_and(|path| b.file_exists(&path)),
            ))
        }),
    );

    let b = bridge.clone();
    fs.set(
        "readdirSync",
        NativeFunction::new("readdirSync", move |args| {
            let path = path_arg(b.as_ref(), args, 0)?;
            let entries = b.list_directory(&path)?;
            Ok(Value::array(entries.into_iter().map(Value::String).collect()))
        }),
    );

    let b = bridge;
    fs.set(
        "statSync",
        NativeFunction::new("statSync", move |args| {
            let path = path_arg(b.as_ref(), args, 0)?;
            if !b.file_exists(&path) {
                return Err(LoaderError::io(
                    path,
                    io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
                ));
            }
            Ok(create_stats(b.is_file(&path), b.is_directory(&path)))
        }),
    );

    Value::Object(fs)
}

fn create_stats(is_file: bool, is_directory: bool) -> Value {
    Value::Object(ObjectRef::from_entries([
        (
            "isFile",
            NativeFunction::new("isFile", move |_| Ok(Value::Boolean(is_file))),
        ),
        (
            "isDirectory",
            NativeFunction::new("isDirectory", move |_| Ok(Value::Boolean(is_directory))),
        ),
    ]))
}

/// Create the path module
pub fn create_path_module(bridge: Arc<dyn NativeBridge>) -> Value {
    let path = ObjectRef::new();

    path.set("sep", Value::String(SEP.to_string()));
    path.set("delimiter", Value::String(DELIMITER.to_string()));

    path.set(
        "join",
        NativeFunction::new("join", |args| {
            let parts = string_args(args)?;
            Ok(Value::String(algebra::join(&as_strs(&parts))))
        }),
    );
    path.set(
        "resolve",
        NativeFunction::new("resolve", move |args| {
            let parts = string_args(args)?;
            Ok(Value::String(algebra::resolve(
                &bridge.current_dir(),
                &as_strs(&parts),
            )))
        }),
    );
    path.set(
        "normalize",
        NativeFunction::new("normalize", |args| {
            Ok(Value::String(algebra::normalize(&string_arg(args, 0)?)))
        }),
    );
    path.set(
        "dirname",
        NativeFunction::new("dirname", |args| {
            Ok(Value::String(algebra::dirname(&string_arg(args, 0)?)))
        }),
    );
    path.set(
        "basename",
        NativeFunction::new("basename", |args| {
            let p = string_arg(args, 0)?;
            let ext = match args.get(1) {
                Some(Value::String(ext)) => Some(ext.as_str()),
                _ => None,
            };
            Ok(Value::String(algebra::basename(&p, ext)))
        }),
    );
    path.set(
        "extname",
        NativeFunction::new("extname", |args| {
            Ok(Value::String(algebra::extname(&string_arg(args, 0)?)))
        }),
    );
    path.set(
        "isAbsolute",
        NativeFunction::new("isAbsolute", |args| {
            Ok(Value::Boolean(algebra::is_absolute(&string_arg(args, 0)?)))
        }),
    );

    Value::Object(path)
}

fn string_arg(args: &[Value], index: usize) -> Result<String> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(LoaderError::type_error(format!(
            "The \"path\" argument must be of type string. Received type {}",
            other.type_of()
        ))),
        None => Err(LoaderError::type_error(
            "The \"path\" argument must be of type string. Received undefined",
        )),
    }
}

fn string_args(args: &[Value]) -> Result<Vec<String>> {
    (0..args.len()).map(|i| string_arg(args, i)).collect()
}

fn as_strs(parts: &[String]) -> Vec<&str> {
    parts.iter().map(String::as_str).collect()
}

fn path_arg(bridge: &dyn NativeBridge, args: &[Value], index: usize) -> Result<PathBuf> {
    let raw = string_arg(args, index)?;
    Ok(absolutize(Path::new(&raw), &bridge.current_dir()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::OsBridge;
    use tempfile::tempdir;

    fn call(module: &Value, name: &str, args: &[Value]) -> Result<Value> {
        let function = module.as_object().and_then(|m| m.get(name)).unwrap();
        match function {
            Value::Host(host) => host.call(args),
            other => panic!("{} is not a function: {:?}", name, other),
        }
    }

    #[test]
    fn test_fs_roundtrip_relative_to_cwd() {
        let dir = tempdir().unwrap();
        let bridge: Arc<dyn NativeBridge> = Arc::new(OsBridge::new().with_cwd(dir.path()));
        let fs = create_fs_module(bridge);

        call(&fs, "writeFileSync", &["note.txt".into(), "hello".into()]).unwrap();
        assert_eq!(call(&fs, "readFileSync", &["note.txt".into()]).unwrap(), "hello".into());
        assert_eq!(call(&fs, "existsSync", &["note.txt".into()]).unwrap(), true.into());
        assert_eq!(call(&fs, "existsSync", &["nope".into()]).unwrap(), false.into());

        let listing = call(&fs, "readdirSync", &[".".into()]).unwrap();
        assert_eq!(listing.to_json(), serde_json::json!(["note.txt"]));
    }

    #[test]
    fn test_fs_stat() {
        let dir = tempdir().unwrap();
        let bridge: Arc<dyn NativeBridge> = Arc::new(OsBridge::new().with_cwd(dir.path()));
        let fs = create_fs_module(bridge);

        let stats = call(&fs, "statSync", &[".".into()]).unwrap();
        assert_eq!(call(&stats, "isDirectory", &[]).unwrap(), true.into());
        assert_eq!(call(&stats, "isFile", &[]).unwrap(), false.into());

        let err = call(&fs, "statSync", &["missing".into()]).unwrap_err();
        assert!(matches!(err, LoaderError::Io { .. }));
    }

    #[test]
    fn test_path_module() {
        let bridge: Arc<dyn NativeBridge> = Arc::new(OsBridge::new().with_cwd("/srv"));
        let path = create_path_module(bridge);

        assert_eq!(
            call(&path, "join", &["a".into(), "../b".into(), "c.js".into()]).unwrap(),
            "b/c.js".into()
        );
        assert_eq!(call(&path, "resolve", &["x".into()]).unwrap(), "/srv/x".into());
        assert_eq!(
            call(&path, "basename", &["/a/b.js".into(), ".js".into()]).unwrap(),
            "b".into()
        );
        assert_eq!(call(&path, "extname", &["/a/b.json".into()]).unwrap(), ".json".into());
        assert_eq!(call(&path, "isAbsolute", &["rel".into()]).unwrap(), false.into());
        assert!(call(&path, "dirname", &[Value::Number(1.0)]).is_err());
    }

    #[test]
    fn test_create_builtin_by_name() {
        let bridge: Arc<dyn NativeBridge> = Arc::new(OsBridge::new());
        for name in BUILTIN_MODULES {
            assert!(create_builtin(name, &bridge).is_some());
        }
        assert!(create_builtin("http", &bridge).is_none());
    }
}
