// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Global bindings visible to every module body: `console`, `JSON`, and
//! the error constructors.

use crate::error::{LoaderError, Result};
use crate::value::{format_number, NativeFunction, ObjectRef, Value};

/// Nesting depth printed by `console.log` before objects collapse
const INSPECT_DEPTH: u32 = 2;

/// Build the global bindings
pub fn create_globals() -> Vec<(&'static str, Value)> {
    vec![
        ("undefined", Value::Undefined),
        ("NaN", Value::Number(f64::NAN)),
        ("Infinity", Value::Number(f64::INFINITY)),
        ("console", create_console_object()),
        ("JSON", create_json_object()),
        ("Error", error_constructor("Error")),
        ("TypeError", error_constructor("TypeError")),
        ("RangeError", error_constructor("RangeError")),
        ("SyntaxError", error_constructor("SyntaxError")),
    ]
}

/// Create an error object (`{ name, message }`)
pub fn make_error(name: &str, message: impl Into<String>) -> Value {
    Value::Object(ObjectRef::from_entries([
        ("name", Value::string(name)),
        ("message", Value::String(message.into())),
    ]))
}

/// The value a `catch` clause binds for a failure.
///
/// Thrown values pass through unchanged. Evaluation errors become error
/// objects named after their kind, and resolution failures carry
/// `code: 'MODULE_NOT_FOUND'`.
pub fn error_value(error: &LoaderError) -> Value {
    match error {
        LoaderError::Thrown(value) => value.clone(),
        LoaderError::Type(message) => make_error("TypeError", message.clone()),
        LoaderError::Reference(message) => make_error("ReferenceError", message.clone()),
        LoaderError::Syntax {
            filename,
            line,
            message,
        } => make_error("SyntaxError", format!("{} ({}:{})", message, filename, line)),
        LoaderError::NotFound { .. } => {
            let value = make_error("Error", error.to_string());
            if let Value::Object(object) = &value {
                object.set("code", Value::string("MODULE_NOT_FOUND"));
            }
            value
        }
        other => make_error("Error", other.to_string()),
    }
}

fn error_constructor(name: &'static str) -> Value {
    NativeFunction::new(name, move |args| {
        let message = match args.first() {
            None | Some(Value::Undefined) => String::new(),
            Some(value) => value.to_string(),
        };
        Ok(make_error(name, message))
    })
}

/// Create the console object
fn create_console_object() -> Value {
    let console = ObjectRef::new();
    console.set(
        "log",
        NativeFunction::new("log", |args| {
            println!("{}", format_args(args));
            Ok(Value::Undefined)
        }),
    );
    console.set(
        "info",
        NativeFunction::new("info", |args| {
            println!("{}", format_args(args));
            Ok(Value::Undefined)
        }),
    );
    console.set(
        "warn",
        NativeFunction::new("warn", |args| {
            eprintln!("{}", format_args(args));
            Ok(Value::Undefined)
        }),
    );
    console.set(
        "error",
        NativeFunction::new("error", |args| {
            eprintln!("{}", format_args(args));
            Ok(Value::Undefined)
        }),
    );
    Value::Object(console)
}

fn create_json_object() -> Value {
    let json = ObjectRef::new();
    json.set("stringify", NativeFunction::new("stringify", json_stringify));
    json.set(
        "parse",
        NativeFunction::new("parse", |args| {
            let text = args.first().map(Value::to_string).unwrap_or_default();
            serde_json::from_str::<serde_json::Value>(&text)
                .map(|parsed| Value::from_json(&parsed))
                .map_err(|e| LoaderError::Thrown(make_error("SyntaxError", e.to_string())))
        }),
    );
    Value::Object(json)
}

/// JSON.stringify(value, replacer, space); the replacer is ignored
fn json_stringify(args: &[Value]) -> Result<Value> {
    let value = args.first().cloned().unwrap_or_default();
    if value.is_undefined() || value.is_callable() {
        return Ok(Value::Undefined);
    }

    let pretty = match args.get(2) {
        Some(Value::Number(n)) => *n >= 1.0,
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    };

    let json = value.to_json();
    let text = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    }
    .map_err(|e| LoaderError::type_error(e.to_string()))?;

    Ok(Value::String(text))
}

/// Join console arguments the way `console.log` prints them
pub fn format_args(args: &[Value]) -> String {
    args.iter()
        .map(|arg| match arg {
            Value::String(s) => s.clone(),
            other => format_value(other, INSPECT_DEPTH),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format a value with depth limit
pub fn format_value(value: &Value, depth: u32) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => format!("'{}'", s),
        Value::Array(arr) => {
            if arr.is_empty() {
                return "[]".to_string();
            }
            if depth == 0 {
                return "[Array]".to_string();
            }
            let items: Vec<String> = arr
                .to_vec()
                .iter()
                .map(|v| format_value(v, depth - 1))
                .collect();
            format!("[ {} ]", items.join(", "))
        }
        Value::Object(obj) => {
            if obj.contains("message") && obj.contains("name") {
                return value.describe_error();
            }
            if obj.is_empty() {
                return "{}".to_string();
            }
            if depth == 0 {
                return "[Object]".to_string();
            }
            let items: Vec<String> = obj
                .entries()
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v, depth - 1)))
                .collect();
            format!("{{ {} }}", items.join(", "))
        }
        Value::Host(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        let obj = Value::Object(ObjectRef::from_entries([
            ("a", Value::Number(1.0)),
            ("b", Value::array(vec![Value::string("x")])),
        ]));
        assert_eq!(format_value(&obj, 2), "{ a: 1, b: [ 'x' ] }");
        assert_eq!(format_value(&obj, 0), "[Object]");
        assert_eq!(format_args(&[Value::string("n ="), Value::Number(2.5)]), "n = 2.5");
    }

    #[test]
    fn test_json_stringify() {
        let obj = Value::Object(ObjectRef::from_entries([("k", Value::string("v"))]));
        assert_eq!(json_stringify(&[obj]).unwrap(), Value::string(r#"{"k":"v"}"#));
        assert!(json_stringify(&[Value::Undefined]).unwrap().is_undefined());
    }

    #[test]
    fn test_error_constructor() {
        let ctor = error_constructor("TypeError");
        let Value::Host(host) = ctor else {
            panic!("expected host function");
        };
        let err = host.call(&[Value::string("bad")]).unwrap();
        assert_eq!(err.describe_error(), "TypeError: bad");
    }

    #[test]
    fn test_error_value() {
        let thrown = Value::string("plain");
        assert_eq!(error_value(&LoaderError::Thrown(thrown.clone())), thrown);

        let err = error_value(&LoaderError::reference_error("x is not defined"));
        assert_eq!(err.describe_error(), "ReferenceError: x is not defined");

        let err = error_value(&LoaderError::not_found("./gone", "/app"));
        let object = err.as_object().unwrap();
        assert_eq!(object.get("code"), Some(Value::string("MODULE_NOT_FOUND")));
        assert_eq!(
            err.describe_error(),
            "Error: Cannot find module './gone' from '/app'"
        );
    }
}
