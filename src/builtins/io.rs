use super::{arg, expect_string, Builtins};
use crate::eval::{EvalResult, Evaluator, Value};

pub(super) fn register(builtins: &mut Builtins) {
    builtins
        .register_sync("print", print)
        .register_sync("println", print)
        .register_sync("log", print)
        .register_sync("env", env);
}

/// Joins the arguments with spaces into one output line.
fn print(evaluator: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let line = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    evaluator.print(line);
    Ok(Value::Null)
}

fn env(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let name = expect_string(&args, 0, "env")?;
    Ok(match std::env::var(&name) {
        Ok(value) => Value::String(value),
        Err(_) => arg(&args, 1),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::run_with;
    use crate::config::ScriptConfig;
    use crate::eval::Value;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_print_joins_arguments() {
        let (evaluator, result) = run_with(
            "print(\"a\", 1, true, null, [1, \"b\"], {k: \"v\"})\nprintln()\nlog(\"x\")",
            ScriptConfig::default(),
        )
        .await;
        result.unwrap();
        assert_eq!(
            evaluator.output(),
            vec![r#"a 1 true null [1,"b"] {"k":"v"}"#, "", "x"]
        );
    }

    #[tokio::test]
    async fn test_env_default() {
        let (_, result) = run_with(
            "return env(\"CODEBUDDY_SURELY_UNSET_VARIABLE\", \"fallback\")",
            ScriptConfig::default(),
        )
        .await;
        assert_eq!(result.unwrap(), Some(Value::from("fallback")));
    }
}
