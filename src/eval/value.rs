//! Runtime values.
//!
//! Arrays and dicts are shared references: cloning a [`Value`] clones the
//! handle, so a mutation through one alias is visible through every other.
//! Locks are only ever held for the duration of a single read or write and
//! never across an `.await`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;

use super::context::Scope;
use super::evaluator::{EvalError, EvalResult, Evaluator};
use crate::ast::{ClassDef, FunctionDef};

/// Key marking the trailing dict that carries named call arguments.
pub const NAMED_ARGS_KEY: &str = "__named__";

/// Longest string, in bytes, that repetition and padding may build.
pub const MAX_STRING_LENGTH: usize = 1 << 28;

/// Longest array that `range` or an index assignment may produce.
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

const MAX_RENDER_DEPTH: usize = 32;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Arc<RwLock<Vec<Value>>>),
    Object(Arc<RwLock<Dict>>),
    Function(Arc<Function>),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(RwLock::new(items)))
    }

    pub fn object(dict: Dict) -> Self {
        Value::Object(Arc::new(RwLock::new(dict)))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn function(function: Function) -> Self {
        Value::Function(Arc::new(function))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// `===`: primitives by value, arrays, dicts and functions by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Numeric view used by arithmetic: booleans and null coerce, nothing else does.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null => Some(0.0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Snapshot of an array's items.
    pub fn array_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items.read().clone()),
            _ => None,
        }
    }

    /// Dict lookup without binding `this`.
    pub fn get_property(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(dict) => dict.read().get(key).cloned(),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_at(0)
    }

    fn to_json_at(&self, depth: usize) -> serde_json::Value {
        if depth > MAX_RENDER_DEPTH {
            return serde_json::Value::String("[Circular]".to_string());
        }
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                let items = items.read().clone();
                serde_json::Value::Array(items.iter().map(|v| v.to_json_at(depth + 1)).collect())
            }
            Value::Object(dict) => {
                let dict = dict.read().clone();
                serde_json::Value::Object(
                    dict.iter()
                        .map(|(k, v)| (k.clone(), v.to_json_at(depth + 1)))
                        .collect(),
                )
            }
            Value::Function(function) => serde_json::Value::String(function.to_string()),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize, nested: bool) -> fmt::Result {
        if depth > MAX_RENDER_DEPTH {
            return write!(f, "[Circular]");
        }
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) if nested => write!(f, "{}", serde_json::Value::String(s.clone())),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                let items = items.read().clone();
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    item.render(f, depth + 1, true)?;
                }
                write!(f, "]")
            }
            Value::Object(dict) => {
                let dict = dict.read().clone();
                write!(f, "{{")?;
                for (i, (key, value)) in dict.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:", serde_json::Value::String(key.clone()))?;
                    value.render(f, depth + 1, true)?;
                }
                write!(f, "}}")
            }
            Value::Function(function) => write!(f, "{}", function),
        }
    }
}

/// `text` repeated `count` times, refusing results past
/// [`MAX_STRING_LENGTH`].
pub fn repeat_string(text: &str, count: usize) -> EvalResult<String> {
    match text.len().checked_mul(count) {
        Some(length) if length <= MAX_STRING_LENGTH => Ok(text.repeat(count)),
        _ => Err(EvalError::runtime("Invalid string length")),
    }
}

/// Integral numbers print without a fraction, like the scripts expect.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        String::from(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0, false)
    }
}

/// Structural equality, used by tests and by `includes`/`indexOf`/`unique`
/// on primitive-heavy data. Script `==` goes through [`Value::strict_equals`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                Arc::ptr_eq(a, b) || a.read().clone() == b.read().clone()
            }
            (Value::Object(a), Value::Object(b)) => {
                Arc::ptr_eq(a, b) || a.read().clone() == b.read().clone()
            }
            _ => self.strict_equals(other),
        }
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

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
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

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<Dict> for Value {
    fn from(dict: Dict) -> Self {
        Value::object(dict)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// String-keyed map that remembers insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Inserts or replaces; a replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let position = self.index.remove(key)?;
        let (_, value) = self.entries.remove(position);
        for (_, i) in self.index.iter_mut() {
            if *i > position {
                *i -= 1;
            }
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl FromIterator<(String, Value)> for Dict {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut dict = Dict::new();
        for (key, value) in iter {
            dict.insert(key, value);
        }
        dict
    }
}

impl IntoIterator for Dict {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

pub type SyncNative = Arc<dyn Fn(&Evaluator, Vec<Value>) -> EvalResult<Value> + Send + Sync>;
pub type AsyncNative =
    Arc<dyn for<'a> Fn(&'a Evaluator, Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> + Send + Sync>;

/// Host function callable from scripts.
#[derive(Clone)]
pub enum NativeFunction {
    Sync(SyncNative),
    Async(AsyncNative),
}

#[derive(Clone)]
pub enum FunctionKind {
    /// Declared function or lambda, closing over its defining scope.
    User {
        def: Arc<FunctionDef>,
        closure: Arc<Scope>,
    },
    /// Calling a class value instantiates it.
    Class {
        def: Arc<ClassDef>,
        closure: Arc<Scope>,
    },
    Native(NativeFunction),
}

#[derive(Clone)]
pub struct Function {
    pub name: String,
    pub kind: FunctionKind,
    /// Receiver: `this` for user functions, the implicit first argument for
    /// natives reached through method syntax (`arr.map(f)`).
    pub this: Option<Value>,
}

impl Function {
    pub fn user(def: Arc<FunctionDef>, closure: Arc<Scope>) -> Self {
        Self {
            name: def.display_name().to_string(),
            kind: FunctionKind::User { def, closure },
            this: None,
        }
    }

    pub fn class(def: Arc<ClassDef>, closure: Arc<Scope>) -> Self {
        Self {
            name: def.name.clone(),
            kind: FunctionKind::Class { def, closure },
            this: None,
        }
    }

    pub fn native<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Evaluator, Vec<Value>) -> EvalResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: FunctionKind::Native(NativeFunction::Sync(Arc::new(f))),
            this: None,
        }
    }

    pub fn native_async<F>(name: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(&'a Evaluator, Vec<Value>) -> BoxFuture<'a, EvalResult<Value>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            kind: FunctionKind::Native(NativeFunction::Async(Arc::new(f))),
            this: None,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.kind, FunctionKind::Native(_))
    }

    pub fn is_user(&self) -> bool {
        matches!(self.kind, FunctionKind::User { .. })
    }

    /// Copy of this function with `receiver` attached.
    pub fn bind(&self, receiver: Value) -> Function {
        Function {
            this: Some(receiver),
            ..self.clone()
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FunctionKind::Class { .. } => write!(f, "[Class {}]", self.name),
            _ => write!(f, "[Function {}]", self.name),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FunctionKind::User { .. } => "user",
            FunctionKind::Class { .. } => "class",
            FunctionKind::Native(_) => "native",
        };
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("bound", &self.this.is_some())
            .finish()
    }
}
