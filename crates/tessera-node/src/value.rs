// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Values exchanged between the loader and module bodies.
//!
//! Objects and arrays are shared handles: cloning a [`Value`] never copies the
//! underlying storage, so a module's `exports` keeps one identity for its whole
//! lifetime and every dependent observes later mutations. Host objects let the
//! loader expose Rust state (`require`, `module`, `require.cache`, builtin
//! functions) to script code.

use crate::error::{LoaderError, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A dynamic value.
#[derive(Clone, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Shared array
    Array(ArrayRef),
    /// Shared plain object
    Object(ObjectRef),
    /// Object implemented by the host
    Host(HostRef),
}

/// Shared reference to a host object
pub type HostRef = Arc<dyn HostObject>;

/// An object whose properties and call behavior are implemented in Rust.
pub trait HostObject: Send + Sync {
    /// Name used when the object is printed or reported in errors
    fn class_name(&self) -> &str;

    /// Read a property
    fn get(&self, _key: &str) -> Result<Value> {
        Ok(Value::Undefined)
    }

    /// Write a property
    fn set(&self, key: &str, _value: Value) -> Result<()> {
        Err(LoaderError::type_error(format!(
            "Cannot assign to read only property '{}' of {}",
            key,
            self.class_name()
        )))
    }

    /// Invoke the object as a function
    fn call(&self, _args: &[Value]) -> Result<Value> {
        Err(LoaderError::type_error(format!(
            "{} is not a function",
            self.class_name()
        )))
    }

    /// Whether [`HostObject::call`] is supported
    fn is_callable(&self) -> bool {
        false
    }

    /// Enumerable property names
    fn keys(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Shared, mutable key-value object with stable identity.
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<BTreeMap<String, Value>>>);

impl ObjectRef {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object from existing entries
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self(Arc::new(RwLock::new(map)))
    }

    /// Read a property
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.read().get(key).cloned()
    }

    /// Write a property
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.write().insert(key.into(), value);
    }

    /// Remove a property
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.write().remove(key)
    }

    /// Check whether a property exists
    pub fn contains(&self, key: &str) -> bool {
        self.0.read().contains_key(key)
    }

    /// Property names in key order
    pub fn keys(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }

    /// Snapshot of all entries
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Check if the object has no properties
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

/// Largest valid array index (2^32 - 2)
pub const MAX_ARRAY_INDEX: usize = 4_294_967_294;

/// Most holes a single write may open past the end of an array
pub const MAX_ARRAY_GAP: usize = 1 << 16;

/// Shared, mutable array with stable identity.
#[derive(Clone, Default)]
pub struct ArrayRef(Arc<RwLock<Vec<Value>>>);

impl ArrayRef {
    /// Create an array from values
    pub fn new(values: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(values)))
    }

    /// Read an element
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.read().get(index).cloned()
    }

    /// Write an element, padding with `undefined` when writing past the end.
    ///
    /// Storage is dense, so indices beyond [`MAX_ARRAY_INDEX`] or more than
    /// [`MAX_ARRAY_GAP`] past the current length are rejected.
    pub fn set(&self, index: usize, value: Value) -> Result<()> {
        let mut items = self.0.write();
        if index < items.len() {
            items[index] = value;
            return Ok(());
        }

        let length = index
            .checked_add(1)
            .filter(|_| index <= MAX_ARRAY_INDEX)
            .ok_or_else(|| LoaderError::type_error(format!("Invalid array index {}", index)))?;
        if index - items.len() > MAX_ARRAY_GAP {
            return Err(LoaderError::type_error(format!(
                "Sparse array write at index {} (length {})",
                index,
                items.len()
            )));
        }

        items.resize(length, Value::Undefined);
        items[index] = value;
        Ok(())
    }

    /// Append an element
    pub fn push(&self, value: Value) {
        self.0.write().push(value);
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Check if the array is empty
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Snapshot of the elements
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.read().clone()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

/// A host function backed by a Rust closure.
pub struct NativeFunction {
    name: String,
    func: Box<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>,
}

impl NativeFunction {
    /// Wrap a closure as a callable value
    pub fn new<F>(name: impl Into<String>, func: F) -> Value
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Value::Host(Arc::new(Self {
            name: name.into(),
            func: Box::new(func),
        }))
    }
}

impl HostObject for NativeFunction {
    fn class_name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Result<Value> {
        match key {
            "name" => Ok(Value::String(self.name.clone())),
            _ => Ok(Value::Undefined),
        }
    }

    fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }

    fn is_callable(&self) -> bool {
        true
    }
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Create an empty object
    pub fn object() -> Self {
        Value::Object(ObjectRef::new())
    }

    /// Create an array
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(ArrayRef::new(values))
    }

    /// Returns true if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true if this value is nullish (null or undefined).
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns true if the value can be called.
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Host(host) if host.is_callable())
    }

    /// Borrow the string contents
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric contents
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Borrow the object handle
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Converts the value to a boolean (ToBoolean).
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Host(_) => true,
        }
    }

    /// Converts the value to a number (ToNumber), NaN when not numeric.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(_) | Value::Object(_) | Value::Host(_) => f64::NAN,
        }
    }

    /// Returns the type of this value as a string.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) | Value::Object(_) => "object",
            Value::Host(host) if host.is_callable() => "function",
            Value::Host(_) => "object",
        }
    }

    /// Strict equality (`===`): objects compare by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Host(a), Value::Host(b)) => host_addr(a) == host_addr(b),
            _ => false,
        }
    }

    /// Loose equality (`==`), limited to the nullish and primitive coercions.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_) | Value::String(_) | Value::Boolean(_), Value::Number(_))
            | (Value::Number(_), Value::String(_) | Value::Boolean(_)) => {
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }

    /// Message for an uncaught thrown value (`Error: message` for error objects)
    pub fn describe_error(&self) -> String {
        if let Value::Object(obj) = self {
            if let Some(Value::String(message)) = obj.get("message") {
                let name = obj
                    .get("name")
                    .and_then(|n| n.as_str().map(str::to_string))
                    .unwrap_or_else(|| "Error".to_string());
                return format!("{}: {}", name, message);
            }
        }
        self.to_string()
    }

    /// Convert parsed JSON into a value
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(arr) => {
                Value::array(arr.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(obj) => Value::Object(ObjectRef::from_entries(
                obj.iter().map(|(k, v)| (k.clone(), Value::from_json(v))),
            )),
        }
    }

    /// Convert to JSON. Functions and `undefined` become `null` inside
    /// arrays and are omitted from objects; cycles become `"[Circular]"`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut seen = HashSet::new();
        self.to_json_inner(&mut seen)
            .unwrap_or(serde_json::Value::Null)
    }

    fn to_json_inner(&self, seen: &mut HashSet<usize>) -> Option<serde_json::Value> {
        let json = match self {
            Value::Undefined => return None,
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(arr) => {
                if !seen.insert(arr.addr()) {
                    return Some(circular());
                }
                let items = arr
                    .to_vec()
                    .iter()
                    .map(|v| v.to_json_inner(seen).unwrap_or(serde_json::Value::Null))
                    .collect();
                seen.remove(&arr.addr());
                serde_json::Value::Array(items)
            }
            Value::Object(obj) => {
                if !seen.insert(obj.addr()) {
                    return Some(circular());
                }
                let mut map = serde_json::Map::new();
                for (key, value) in obj.entries() {
                    if let Some(json) = value.to_json_inner(seen) {
                        map.insert(key, json);
                    }
                }
                seen.remove(&obj.addr());
                serde_json::Value::Object(map)
            }
            Value::Host(host) => {
                if host.is_callable() {
                    return None;
                }
                let addr = host_addr(host);
                if !seen.insert(addr) {
                    return Some(circular());
                }
                let mut map = serde_json::Map::new();
                for key in host.keys() {
                    let value = host.get(&key).unwrap_or_default();
                    if let Some(json) = value.to_json_inner(seen) {
                        map.insert(key, json);
                    }
                }
                seen.remove(&addr);
                serde_json::Value::Object(map)
            }
        };
        Some(json)
    }
}

/// `Array.prototype.join(',')`: an array already being joined prints empty
fn join_array(arr: &ArrayRef, seen: &mut HashSet<usize>) -> String {
    if !seen.insert(arr.addr()) {
        return String::new();
    }
    let parts: Vec<String> = arr
        .to_vec()
        .iter()
        .map(|v| match v {
            Value::Undefined | Value::Null => String::new(),
            Value::Array(inner) => join_array(inner, seen),
            other => other.to_string(),
        })
        .collect();
    seen.remove(&arr.addr());
    parts.join(",")
}

fn host_addr(host: &HostRef) -> usize {
    Arc::as_ptr(host) as *const () as usize
}

fn circular() -> serde_json::Value {
    serde_json::Value::String("[Circular]".to_string())
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Format a number the way JavaScript's `String(n)` does for common cases
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(arr) => write!(f, "{}", join_array(arr, &mut HashSet::new())),
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Host(host) if host.is_callable() => {
                write!(f, "[Function: {}]", host.class_name())
            }
            Value::Host(host) => write!(f, "[object {}]", host.class_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
            Value::Host(host) => write!(f, "Host({})", host.class_name()),
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", Value::Object(self.clone()))
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", Value::Array(self.clone()))
    }
}
