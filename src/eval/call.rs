use std::sync::Arc;

use async_recursion::async_recursion;
use tracing::trace;

use super::{
    context::Scope,
    evaluator::{EvalError, EvalResult, Evaluator},
    statement::{ControlFlow, StatementResult},
    value::{Dict, Function, FunctionKind, NativeFunction, Value, NAMED_ARGS_KEY},
};
use crate::ast::{ClassDef, FunctionBody, FunctionDef};

/// Splits a trailing `__named__` bundle off the argument list.
pub fn split_named(mut args: Vec<Value>) -> (Vec<Value>, Option<Dict>) {
    let is_bundle = args
        .last()
        .and_then(|last| last.get_property(NAMED_ARGS_KEY))
        .is_some_and(|marker| marker.strict_equals(&Value::Boolean(true)));
    if !is_bundle {
        return (args, None);
    }
    match args.pop() {
        Some(Value::Object(dict)) => {
            let mut named = dict.read().clone();
            named.remove(NAMED_ARGS_KEY);
            (args, Some(named))
        }
        _ => (args, None),
    }
}

impl Evaluator {
    pub async fn call_function(&self, function: &Function, args: Vec<Value>) -> EvalResult<Value> {
        self.check_timeout()?;
        self.enter_call()?;
        let result = self.dispatch_call(function, args).await;
        self.exit_call();
        result
    }

    #[async_recursion]
    async fn dispatch_call(&self, function: &Function, args: Vec<Value>) -> EvalResult<Value> {
        trace!(name = %function.name, args = args.len(), "call");

        match &function.kind {
            FunctionKind::Native(native) => {
                let mut args = args;
                if let Some(receiver) = &function.this {
                    args.insert(0, receiver.clone());
                }
                match native {
                    NativeFunction::Sync(f) => f(self, args),
                    NativeFunction::Async(f) => f(self, args).await,
                }
            }
            FunctionKind::User { def, closure } => {
                self.call_user(def, closure, function.this.as_ref(), args)
                    .await
            }
            FunctionKind::Class { def, closure } => self.instantiate(def, closure, args).await,
        }
    }

    /// Calls any value, failing unless it is a function.
    pub async fn call_value(&self, callee: &Value, args: Vec<Value>) -> EvalResult<Value> {
        match callee {
            Value::Function(function) => self.call_function(function, args).await,
            other => Err(EvalError::NotCallable(other.to_string())),
        }
    }

    async fn call_user(
        &self,
        def: &Arc<FunctionDef>,
        closure: &Arc<Scope>,
        this: Option<&Value>,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        let scope = Scope::child(closure);
        if let Some(receiver) = this {
            scope.declare("this", receiver.clone());
        }

        let (positional, named) = split_named(args);
        for (index, param) in def.params.iter().enumerate() {
            let supplied = named
                .as_ref()
                .and_then(|n| n.get(&param.name))
                .or_else(|| positional.get(index))
                .cloned();
            let value = match (supplied, &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval_expression(default, &scope).await?,
                (None, None) => Value::Null,
            };
            scope.declare(param.name.clone(), value);
        }

        match &def.body {
            FunctionBody::Expression(expression) => self.eval_expression(expression, &scope).await,
            FunctionBody::Block(statements) => match self.eval_block(statements, &scope).await? {
                StatementResult::Control(ControlFlow::Return(value)) => Ok(value),
                _ => Ok(Value::Null),
            },
        }
    }

    /// Builds an instance dict: fields first, then methods bound to the
    /// instance, then `constructor` if the class has one.
    async fn instantiate(
        &self,
        def: &Arc<ClassDef>,
        closure: &Arc<Scope>,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        let instance = Value::object(Dict::new());
        let instance_scope = Scope::child(closure);
        instance_scope.declare("this", instance.clone());

        for field in &def.fields {
            let value = match &field.initializer {
                Some(initializer) => self.eval_expression(initializer, &instance_scope).await?,
                None => Value::Null,
            };
            set_field(&instance, &field.name, value);
        }

        let mut constructor = None;
        for method in &def.methods {
            let function = Function::user(method.clone(), instance_scope.clone());
            if method.name.as_deref() == Some("constructor") {
                constructor = Some(function);
            } else {
                set_field(&instance, method.display_name(), Value::function(function));
            }
        }

        if let Some(constructor) = constructor {
            self.call_function(&constructor, args).await?;
        }
        Ok(instance)
    }
}

fn set_field(instance: &Value, name: &str, value: Value) {
    if let Value::Object(dict) = instance {
        dict.write().insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parse_program;
    use crate::config::ScriptConfig;
    use pretty_assertions::assert_eq;

    async fn run(source: &str) -> (Vec<String>, EvalResult<Option<Value>>) {
        let program = parse_program(source).unwrap();
        let evaluator = Evaluator::new(ScriptConfig::default());
        let result = evaluator.execute(&program).await;
        (evaluator.output(), result)
    }

    #[test]
    fn test_split_named() {
        let mut bundle = Dict::new();
        bundle.insert("b", Value::from(2.0));
        bundle.insert(NAMED_ARGS_KEY, Value::from(true));
        let (positional, named) = split_named(vec![Value::from(1.0), Value::object(bundle)]);
        assert_eq!(positional, vec![Value::from(1.0)]);
        let named = named.unwrap();
        assert_eq!(named.get("b"), Some(&Value::from(2.0)));
        assert!(!named.contains_key(NAMED_ARGS_KEY));

        let plain = Value::object(Dict::new());
        let (positional, named) = split_named(vec![plain.clone()]);
        assert_eq!(positional, vec![plain]);
        assert!(named.is_none());
    }

    #[tokio::test]
    async fn test_named_and_default_parameters() {
        let (_, result) = run(
            "function f(a, b = 10, c = a + 1) { return [a, b, c] }\nreturn [f(1), f(1, 2, 3), f(c: 9, a: 5)]",
        )
        .await;
        assert_eq!(
            result.unwrap().unwrap().to_string(),
            "[[1,10,2],[1,2,3],[5,10,9]]"
        );
    }

    #[tokio::test]
    async fn test_missing_parameter_is_null() {
        let (_, result) = run("function f(a, b) { return b }\nreturn f(1)").await;
        assert_eq!(result.unwrap(), Some(Value::Null));
    }

    #[tokio::test]
    async fn test_closures_capture_scope() {
        let (_, result) = run(
            "function counter() { let n = 0\n return () => { n = n + 1\n return n } }\nlet c = counter()\nc()\nc()\nreturn c()",
        )
        .await;
        assert_eq!(result.unwrap(), Some(Value::from(3.0)));
    }

    #[tokio::test]
    async fn test_recursion() {
        let (_, result) =
            run("function fib(n) { if (n < 2) return n\n return fib(n - 1) + fib(n - 2) }\nreturn fib(15)")
                .await;
        assert_eq!(result.unwrap(), Some(Value::from(610.0)));
    }

    #[tokio::test]
    async fn test_class_instantiation() {
        let (_, result) = run(
            r#"
class Counter {
    count = 0
    constructor(start) { this.count = start }
    increment(by = 1) {
        this.count = this.count + by
        return this.count
    }
}
let c = new Counter(5)
c.increment()
c.increment(by: 3)
return c.count
"#,
        )
        .await;
        assert_eq!(result.unwrap(), Some(Value::from(9.0)));
    }

    #[tokio::test]
    async fn test_method_called_through_dict() {
        let (_, result) = run(
            "let o = { n: 2, double() { return this.n * 2 } }\nreturn o.double()",
        )
        .await;
        assert_eq!(result.unwrap(), Some(Value::from(4.0)));
    }

    #[tokio::test]
    async fn test_call_value_rejects_non_function() {
        let evaluator = Evaluator::new(ScriptConfig::default());
        let error = evaluator
            .call_value(&Value::from(1.0), vec![])
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "1 is not a function");
    }
}
