// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module loading integration tests
//!
//! Each test builds a small module tree in a temporary directory and loads it
//! through a fresh loader with an empty environment.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tessera_node::{LoaderError, ModuleLoader, OsBridge, Value};

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        // Identities are real paths, so compare against the canonical root
        let root = dir.path().canonicalize().unwrap();
        Self { _dir: dir, root }
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn loader(&self) -> ModuleLoader {
        ModuleLoader::builder()
            .bridge(
                OsBridge::new()
                    .with_env(Vec::<(String, String)>::new())
                    .with_cwd(&self.root),
            )
            .build()
            .unwrap()
    }

    fn require(&self, loader: &ModuleLoader, specifier: &str) -> tessera_node::Result<Value> {
        loader.require(specifier, &self.root, None)
    }
}

fn prop(value: &Value, key: &str) -> Value {
    match value {
        Value::Object(obj) => obj.get(key).unwrap_or_default(),
        Value::Host(host) => host.get(key).unwrap(),
        other => panic!("not an object: {:?}", other),
    }
}

fn same_object(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
        _ => false,
    }
}

#[test]
fn test_module_runs_once_per_identity() {
    let fx = Fixture::new();
    fx.write("counter.js", "module.exports = { n: 0 };");
    fx.write(
        "lib/util.js",
        "var c = require('../counter');\nc.n = c.n + 1;\nexports.name = 'util';",
    );

    let loader = fx.loader();
    let first = fx.require(&loader, "./lib/util").unwrap();
    let second = fx.require(&loader, "./lib/util.js").unwrap();
    let third = loader
        .require(&fx.root.join("lib/util.js").to_string_lossy(), Path::new("/"), None)
        .unwrap();

    assert!(same_object(&first, &second));
    assert!(same_object(&first, &third));
    assert_eq!(prop(&first, "name"), "util".into());

    let counter = fx.require(&loader, "./counter").unwrap();
    assert_eq!(prop(&counter, "n"), Value::Number(1.0));
}

#[test]
fn test_cycle_sees_partial_exports() {
    let fx = Fixture::new();
    let a = fx.write(
        "a.js",
        "exports.early = 'a-early';\n\
         var b = require('./b');\n\
         exports.fromB = b.seen;\n\
         exports.done = true;",
    );
    let b = fx.write(
        "b.js",
        "var a = require('./a');\n\
         exports.seen = a.early;\n\
         exports.aDone = a.done === true;",
    );

    let loader = fx.loader();
    let a_exports = fx.require(&loader, "./a").unwrap();

    assert_eq!(prop(&a_exports, "fromB"), "a-early".into());
    assert_eq!(prop(&a_exports, "done"), true.into());

    let b_exports = loader.cache().exports(&b).unwrap();
    assert_eq!(prop(&b_exports, "seen"), "a-early".into());
    assert_eq!(prop(&b_exports, "aDone"), false.into());

    assert!(loader.cache().get(&a).unwrap().loaded);
    assert!(loader.cache().get(&b).unwrap().loaded);
    assert_eq!(loader.cache().get(&a).unwrap().children, vec![b.clone()]);
    assert_eq!(loader.cache().get(&b).unwrap().children, vec![a]);
}

#[test]
fn test_resolution_precedence() {
    let fx = Fixture::new();
    fx.write("thing.js", "exports.kind = 'source';");
    fx.write("thing.json", "{ \"kind\": \"data\" }");
    fx.write("exact", "exports.kind = 'exact';");
    fx.write("exact.js", "exports.kind = 'suffixed';");
    fx.write("dir.js", "exports.kind = 'file';");
    fx.write("dir/index.js", "exports.kind = 'directory';");

    let loader = fx.loader();
    assert_eq!(prop(&fx.require(&loader, "./thing").unwrap(), "kind"), "source".into());
    assert_eq!(prop(&fx.require(&loader, "./thing.json").unwrap(), "kind"), "data".into());
    assert_eq!(prop(&fx.require(&loader, "./exact").unwrap(), "kind"), "exact".into());
    assert_eq!(prop(&fx.require(&loader, "./dir").unwrap(), "kind"), "file".into());
    assert_eq!(prop(&fx.require(&loader, "./dir/").unwrap(), "kind"), "file".into());
    assert_eq!(prop(&fx.require(&loader, "./dir/index").unwrap(), "kind"), "directory".into());
}

#[test]
fn test_package_main_falls_back_to_index() {
    let fx = Fixture::new();
    fx.write("node_modules/pkg/package.json", r#"{ "main": "lib" }"#);
    let target = fx.write("node_modules/pkg/lib/index.js", "exports.from = 'lib/index';");
    fx.write("node_modules/broken/package.json", "{ not json");
    let broken = fx.write("node_modules/broken/index.js", "exports.from = 'index';");
    fx.write("node_modules/numeric/package.json", r#"{ "main": 42 }"#);
    fx.write("node_modules/numeric/index.js", "exports.from = 'index';");

    let loader = fx.loader();
    let src = fx.root.join("src");
    fs::create_dir_all(&src).unwrap();

    assert_eq!(loader.resolve("pkg", &src).unwrap(), target.to_string_lossy());
    assert_eq!(loader.resolve("broken", &src).unwrap(), broken.to_string_lossy());

    let exports = loader.require("numeric", &src, None).unwrap();
    assert_eq!(prop(&exports, "from"), "index".into());
}

#[test]
fn test_relative_specifier_does_not_fall_through() {
    let fx = Fixture::new();
    fx.write("node_modules/missing/index.js", "exports.found = true;");

    let loader = fx.loader();
    let err = fx.require(&loader, "./missing").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        err.to_string(),
        format!("Cannot find module './missing' from '{}'", fx.root.display())
    );

    // The same name as a bare specifier finds the package
    assert_eq!(prop(&fx.require(&loader, "missing").unwrap(), "found"), true.into());
}

#[test]
fn test_throwing_module_is_rolled_back() {
    let fx = Fixture::new();
    let bad = fx.write("bad.js", "exports.partial = 1;\nthrow new Error('boom');");
    let inner = fx.write("inner.js", "module.exports = require('./bad');");
    let outer = fx.write("outer.js", "exports.inner = require('./inner');");
    let ok = fx.write("ok.js", "exports.ok = true;");

    let loader = fx.loader();
    let err = fx.require(&loader, "./outer").unwrap_err();
    assert!(matches!(err, LoaderError::Thrown(_)));
    assert_eq!(err.to_string(), "Uncaught Error: boom");

    for id in [&bad, &inner, &outer] {
        assert!(!loader.cache().has(id), "{} should be rolled back", id.display());
    }

    // A loaded parent keeps no edge to the failed child
    fx.require(&loader, "./ok").unwrap();
    assert!(loader.require("./bad", &fx.root, Some(ok.as_path())).is_err());
    assert!(loader.cache().get(&ok).unwrap().children.is_empty());

    // Once fixed, the module runs again
    fx.write("bad.js", "exports.fixed = true;");
    let exports = fx.require(&loader, "./outer").unwrap();
    assert_eq!(prop(&prop(&exports, "inner"), "fixed"), true.into());
}

#[test]
fn test_syntax_error_reports_location() {
    let fx = Fixture::new();
    let broken = fx.write("broken.js", "var ok = 1;\nvar = 2;");

    let loader = fx.loader();
    match fx.require(&loader, "./broken") {
        Err(LoaderError::Syntax { filename, line, .. }) => {
            assert_eq!(filename, broken.to_string_lossy());
            assert_eq!(line, 2);
        }
        other => panic!("expected a syntax error, got {:?}", other),
    }
    assert!(!loader.cache().has(&broken));
}

#[test]
fn test_native_addon_resolves_but_fails() {
    let fx = Fixture::new();
    let addon = fx.write("addon.node", "\u{7f}ELF");

    let loader = fx.loader();
    assert_eq!(loader.resolve("./addon", &fx.root).unwrap(), addon.to_string_lossy());

    let err = fx.require(&loader, "./addon").unwrap_err();
    assert!(matches!(err, LoaderError::NativeAddon(ref path) if *path == addon));
    assert!(!loader.cache().has(&addon));
}

#[test]
fn test_data_module() {
    let fx = Fixture::new();
    fx.write("config.json", "\u{feff}{ \"name\": \"app\", \"ports\": [80, 443] }");
    fx.write("bad.json", "{ \"name\": ");

    let loader = fx.loader();
    let exports = fx.require(&loader, "./config.json").unwrap();
    assert_eq!(
        exports.to_json(),
        serde_json::json!({ "name": "app", "ports": [80, 443] })
    );

    let err = fx.require(&loader, "./bad.json").unwrap_err();
    assert!(matches!(err, LoaderError::Json { .. }));
}

#[test]
fn test_require_main_is_visible_from_nested_modules() {
    let fx = Fixture::new();
    let main = fx.write(
        "main.js",
        "var child = require('./child');\n\
         module.exports = { childSaw: child.mainFile, selfSaw: require.main.filename };",
    );
    fx.write("child.js", "exports.mainFile = require.main.filename;");

    let loader = fx.loader();
    let exports = loader.run_main(Path::new("main.js")).unwrap();

    let expected: Value = main.to_string_lossy().to_string().into();
    assert_eq!(prop(&exports, "childSaw"), expected);
    assert_eq!(prop(&exports, "selfSaw"), expected);
    assert_eq!(loader.main_id(), Some(main));
    assert!(loader.main().unwrap().loaded);
}

#[test]
fn test_failed_main_clears_require_main() {
    let fx = Fixture::new();
    fx.write("main.js", "throw new TypeError('nope');");

    let loader = fx.loader();
    let err = loader.run_main(Path::new("main.js")).unwrap_err();
    assert_eq!(err.to_string(), "Uncaught TypeError: nope");
    assert!(loader.main().is_none());
    assert_eq!(loader.main_value(), Value::Null);
}

#[test]
fn test_reassigned_exports_are_observed_by_later_dependents() {
    let fx = Fixture::new();
    fx.write(
        "lib.js",
        "exports.kind = 'original';\nmodule.exports = { kind: 'replaced' };",
    );
    fx.write("first.js", "exports.kind = require('./lib').kind;");
    fx.write("second.js", "exports.kind = require('./lib').kind;");

    let loader = fx.loader();
    assert_eq!(prop(&fx.require(&loader, "./first").unwrap(), "kind"), "replaced".into());
    assert_eq!(prop(&fx.require(&loader, "./second").unwrap(), "kind"), "replaced".into());
}

#[test]
fn test_builtins_with_and_without_prefix() {
    let fx = Fixture::new();
    fx.write(
        "main.js",
        "var path = require('node:path');\n\
         exports.joined = path.join('a', 'b', '..', 'c.js');\n\
         exports.same = require('fs') === require('node:fs');\n\
         exports.exists = require('fs').existsSync('main.js');",
    );

    let loader = fx.loader();
    let exports = fx.require(&loader, "./main").unwrap();
    assert_eq!(prop(&exports, "joined"), "a/c.js".into());
    assert_eq!(prop(&exports, "same"), true.into());
    assert_eq!(prop(&exports, "exists"), true.into());
    assert!(fx.require(&loader, "node:http").unwrap_err().is_not_found());
}

#[test]
fn test_require_cache_and_resolve_from_module() {
    let fx = Fixture::new();
    let counter = fx.write("counter.js", "module.exports = { n: 0 };");
    fx.write(
        "main.js",
        "require('./counter');\n\
         var id = require.resolve('./counter');\n\
         exports.id = id;\n\
         exports.loaded = require.cache[id].loaded;\n\
         exports.same = require.cache[id].exports === require('./counter');",
    );

    let loader = fx.loader();
    let exports = fx.require(&loader, "./main").unwrap();
    assert_eq!(prop(&exports, "id"), counter.to_string_lossy().to_string().into());
    assert_eq!(prop(&exports, "loaded"), true.into());
    assert_eq!(prop(&exports, "same"), true.into());
}

#[test]
fn test_eval_binds_require_to_directory() {
    let fx = Fixture::new();
    fx.write("lib/answer.js", "module.exports = { value: 42 };");

    let loader = fx.loader();
    let result = loader
        .eval("require('./answer').value + 1", &fx.root.join("lib"))
        .unwrap();
    assert_eq!(result, Value::Number(43.0));
    assert_eq!(loader.cache().len(), 1);
}

#[test]
fn test_node_path_is_searched_after_ancestors() {
    let fx = Fixture::new();
    fx.write("shared/tool/index.js", "exports.origin = 'shared';");
    fx.write("app/node_modules/tool/index.js", "exports.origin = 'local';");
    fx.write("other/main.js", "exports.origin = require('tool').origin;");

    let loader = ModuleLoader::builder()
        .bridge(
            OsBridge::new()
                .with_env([("NODE_PATH", fx.root.join("shared").to_string_lossy().to_string())])
                .with_cwd(&fx.root),
        )
        .build()
        .unwrap();

    let app = fx.root.join("app");
    assert_eq!(prop(&loader.require("tool", &app, None).unwrap(), "origin"), "local".into());
    assert_eq!(
        prop(&fx.require(&loader, "./other/main").unwrap(), "origin"),
        "shared".into()
    );
}

#[test]
fn test_exported_function_retries_a_failed_require() {
    let fx = Fixture::new();
    fx.write("identity.js", "module.exports = function (x) { return x; };");
    let flaky = fx.write("flaky.js", "throw new Error('not yet');");
    let main = fx.write(
        "main.js",
        "const identity = require('./identity');\n\
         function load() {\n\
           try { return require('./flaky').state } catch (e) { return 'caught ' + e.message }\n\
         }\n\
         exports.first = load();\n\
         exports.load = load;\n\
         exports.same = identity(exports) === exports;\n\
         try { require('./absent') } catch (e) { exports.code = e.code }",
    );

    let loader = fx.loader();
    let exports = fx.require(&loader, "./main").unwrap();
    assert_eq!(prop(&exports, "first"), "caught not yet".into());
    assert_eq!(prop(&exports, "same"), true.into());
    assert_eq!(prop(&exports, "code"), "MODULE_NOT_FOUND".into());
    assert!(!loader.cache().has(&flaky));
    assert!(loader.cache().has(&main));

    fx.write("flaky.js", "exports.state = 'ready';");
    let Value::Host(load) = prop(&exports, "load") else {
        panic!("load should be a function");
    };
    assert_eq!(load.call(&[]).unwrap(), "ready".into());
    assert!(loader.cache().get(&flaky).unwrap().loaded);
}

#[test]
fn test_out_of_range_array_write_fails_the_load() {
    let fx = Fixture::new();
    let huge = fx.write("huge.js", "const a = [];\na['18446744073709551615'] = 1;");
    let sparse = fx.write("sparse.js", "const a = [];\na['4000000000'] = 1;");

    let loader = fx.loader();
    for (specifier, id) in [("./huge", &huge), ("./sparse", &sparse)] {
        let err = fx.require(&loader, specifier).unwrap_err();
        assert!(matches!(err, LoaderError::Type(_)), "unexpected error: {}", err);
        assert!(!loader.cache().has(id));
    }

    let err = loader
        .eval("const a = []; a['18446744073709551615'] = 1; 1", &fx.root)
        .unwrap_err();
    assert!(matches!(err, LoaderError::Type(_)));
}

#[test]
fn test_self_containing_array_stringifies() {
    let fx = Fixture::new();
    let loader = fx.loader();
    let value = loader
        .eval("const a = [1]; a[1] = a; 'x' + a", &fx.root)
        .unwrap();
    assert_eq!(value, "x1,".into());
}
