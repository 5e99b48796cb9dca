//! Builtin function library
//!
//! Everything a script can call without declaring it. The core groups are
//! always installed; file, shell and AI groups only when their config flag is
//! on.
//!
//! Each group exposes a `register` function that adds its entries to a
//! [`Builtins`] table. Natives receive the evaluator and their arguments; when
//! called with method syntax (`arr.map(f)`) the receiver arrives as the first
//! argument, so `map(arr, f)` and `arr.map(f)` are the same call.

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tracing::debug;

use crate::config::ScriptConfig;
use crate::eval::{Dict, EvalError, EvalResult, Evaluator, Function, Scope, Value};

mod ai;
mod collection;
mod file;
mod io;
mod json;
mod math;
mod shell;
mod string;
mod time;
mod types;

pub type SyncBuiltin = fn(&Evaluator, Vec<Value>) -> EvalResult<Value>;
pub type AsyncBuiltin = for<'a> fn(&'a Evaluator, Vec<Value>) -> BoxFuture<'a, EvalResult<Value>>;

/// Named builtin values, in registration order.
#[derive(Default)]
pub struct Builtins {
    entries: Vec<(String, Value)>,
}

impl Builtins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_sync(&mut self, name: &str, f: SyncBuiltin) -> &mut Self {
        self.register_value(name, Value::function(Function::native(name, f)))
    }

    pub fn register_async(&mut self, name: &str, f: AsyncBuiltin) -> &mut Self {
        self.register_value(name, Value::function(Function::native_async(name, f)))
    }

    pub fn register_value(&mut self, name: &str, value: Value) -> &mut Self {
        self.entries.push((name.to_string(), value));
        self
    }

    /// Registers `namespace` as a dict value, e.g. `bash.run`.
    pub fn register_namespace(&mut self, name: &str, namespace: Builtins) -> &mut Self {
        let object = namespace.into_object();
        self.register_value(name, object)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_object(self) -> Value {
        Value::object(self.entries.into_iter().collect::<Dict>())
    }

    pub fn install_into(self, scope: &Scope) {
        for (name, value) in self.entries {
            scope.declare(name, value);
        }
    }
}

/// Installs every builtin the configuration enables into `scope`.
pub fn install(scope: &Scope, config: &ScriptConfig) {
    let mut builtins = Builtins::new();
    io::register(&mut builtins);
    types::register(&mut builtins);
    collection::register(&mut builtins);
    string::register(&mut builtins);
    math::register(&mut builtins);
    time::register(&mut builtins);
    json::register(&mut builtins);

    if config.enable_file_ops {
        file::register(&mut builtins);
    }
    if config.enable_bash {
        shell::register(&mut builtins);
    }
    if config.enable_ai {
        ai::register(&mut builtins);
    }

    debug!(
        count = builtins.len(),
        file_ops = config.enable_file_ops,
        bash = config.enable_bash,
        ai = config.enable_ai,
        "installing builtins"
    );
    builtins.install_into(scope);
}

// 引数ヘルパー

pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn unexpected(name: &str, index: usize, expected: &str, got: &Value) -> EvalError {
    EvalError::type_error(format!(
        "{}() expects {} as argument {}, got {}",
        name,
        expected,
        index + 1,
        got.type_name()
    ))
}

pub(crate) fn expect_string(args: &[Value], index: usize, name: &str) -> EvalResult<String> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        other => Err(unexpected(name, index, "a string", other.unwrap_or(&Value::Null))),
    }
}

pub(crate) fn expect_number(args: &[Value], index: usize, name: &str) -> EvalResult<f64> {
    match args.get(index) {
        Some(Value::Number(n)) => Ok(*n),
        other => Err(unexpected(name, index, "a number", other.unwrap_or(&Value::Null))),
    }
}

pub(crate) fn expect_array(
    args: &[Value],
    index: usize,
    name: &str,
) -> EvalResult<Arc<RwLock<Vec<Value>>>> {
    match args.get(index) {
        Some(Value::Array(items)) => Ok(items.clone()),
        other => Err(unexpected(name, index, "an array", other.unwrap_or(&Value::Null))),
    }
}

pub(crate) fn expect_object(
    args: &[Value],
    index: usize,
    name: &str,
) -> EvalResult<Arc<RwLock<Dict>>> {
    match args.get(index) {
        Some(Value::Object(dict)) => Ok(dict.clone()),
        other => Err(unexpected(name, index, "an object", other.unwrap_or(&Value::Null))),
    }
}

pub(crate) fn expect_function(
    args: &[Value],
    index: usize,
    name: &str,
) -> EvalResult<Arc<Function>> {
    match args.get(index) {
        Some(Value::Function(function)) => Ok(function.clone()),
        other => Err(unexpected(name, index, "a function", other.unwrap_or(&Value::Null))),
    }
}

pub(crate) fn optional_number(args: &[Value], index: usize) -> Option<f64> {
    match args.get(index) {
        Some(Value::Number(n)) => Some(*n),
        _ => None,
    }
}

pub(crate) fn optional_string(args: &[Value], index: usize) -> Option<String> {
    match args.get(index) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::analyzer::parse_program;
    use crate::config::ScriptConfig;
    use crate::eval::{EvalResult, Evaluator, Value};

    /// Runs `source` and returns the evaluator with the top-level return.
    pub async fn run_with(
        source: &str,
        config: ScriptConfig,
    ) -> (Evaluator, EvalResult<Option<Value>>) {
        let program = parse_program(source).unwrap();
        let evaluator = Evaluator::new(config);
        let result = evaluator.execute(&program).await;
        (evaluator, result)
    }

    /// Evaluates `return <expression>` with the default configuration.
    pub async fn eval(expression: &str) -> EvalResult<Value> {
        let (_, result) = run_with(&format!("return {}", expression), ScriptConfig::default()).await;
        result.map(Option::unwrap_or_default)
    }

    /// Rendered result of [`eval`], panicking on error.
    pub async fn render(expression: &str) -> String {
        match eval(expression).await {
            Ok(value) => value.to_string(),
            Err(e) => panic!("{} failed: {}", expression, e),
        }
    }
}
