use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use super::value::Value;

const SHARDS: usize = 4;

/// One level of the variable chain.
///
/// `functions` mirrors every binding whose value is callable so both views
/// agree; calls resolve callees through `variables`.
pub struct Scope {
    variables: DashMap<String, Value>,
    functions: DashMap<String, Value>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_parent(None))
    }

    pub fn child(parent: &Arc<Scope>) -> Arc<Self> {
        Arc::new(Self::with_parent(Some(parent.clone())))
    }

    fn with_parent(parent: Option<Arc<Scope>>) -> Self {
        Self {
            variables: DashMap::with_shard_amount(SHARDS),
            functions: DashMap::with_shard_amount(SHARDS),
            parent,
        }
    }

    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }

    /// Binds `name` in this scope, shadowing any outer binding.
    pub fn declare(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if matches!(value, Value::Function(_)) {
            self.functions.insert(name.clone(), value.clone());
        } else {
            self.functions.remove(&name);
        }
        self.variables.insert(name, value);
    }

    pub fn declare_function(&self, name: impl Into<String>, function: Value) {
        self.declare(name, function);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        match self.variables.get(name) {
            Some(value) => Some(value.clone()),
            None => self.parent.as_ref().and_then(|p| p.lookup(name)),
        }
    }

    pub fn lookup_function(&self, name: &str) -> Option<Value> {
        match self.functions.get(name) {
            Some(value) => Some(value.clone()),
            None => self.parent.as_ref().and_then(|p| p.lookup_function(name)),
        }
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.has_own(name) || self.parent.as_ref().is_some_and(|p| p.is_defined(name))
    }

    /// Rebinds `name` in the nearest scope that defines it. The value is
    /// handed back when no scope in the chain does.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), Value> {
        if self.has_own(name) {
            self.declare(name, value);
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(value),
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.variables.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("variables", &self.names())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::value::Function;

    #[test]
    fn test_lookup_walks_outward() {
        let global = Scope::new();
        global.declare("a", Value::from(1.0));
        let inner = Scope::child(&Scope::child(&global));
        assert_eq!(inner.lookup("a"), Some(Value::from(1.0)));
        assert_eq!(inner.lookup("missing"), None);
    }

    #[test]
    fn test_declare_shadows() {
        let global = Scope::new();
        global.declare("a", Value::from(1.0));
        let inner = Scope::child(&global);
        inner.declare("a", Value::from(2.0));
        assert_eq!(inner.lookup("a"), Some(Value::from(2.0)));
        assert_eq!(global.lookup("a"), Some(Value::from(1.0)));
    }

    #[test]
    fn test_assign_targets_nearest_definition() {
        let global = Scope::new();
        global.declare("a", Value::from(1.0));
        let middle = Scope::child(&global);
        middle.declare("b", Value::from(1.0));
        let inner = Scope::child(&middle);

        assert!(inner.assign("a", Value::from(10.0)).is_ok());
        assert!(inner.assign("b", Value::from(20.0)).is_ok());
        assert_eq!(global.lookup("a"), Some(Value::from(10.0)));
        assert_eq!(middle.lookup("b"), Some(Value::from(20.0)));
        assert!(!inner.has_own("a"));

        assert_eq!(inner.assign("c", Value::from(3.0)), Err(Value::from(3.0)));
    }

    #[test]
    fn test_function_view_stays_in_sync() {
        let scope = Scope::new();
        let f = Value::function(Function::native("f", |_, _| Ok(Value::Null)));
        scope.declare_function("f", f);
        assert!(scope.lookup_function("f").is_some());
        assert!(scope.lookup("f").is_some());

        scope.declare("f", Value::from(1.0));
        assert!(scope.lookup_function("f").is_none());
    }
}
