use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use super::{arg, expect_string, optional_number, Builtins};
use crate::eval::{EvalError, EvalResult, Evaluator, Value};

pub(super) fn register(builtins: &mut Builtins) {
    let mut namespace = Builtins::new();
    namespace
        .register_sync("stringify", stringify)
        .register_sync("parse", parse);

    builtins
        .register_namespace("JSON", namespace)
        .register_sync("toJSON", stringify)
        .register_sync("fromJSON", parse);
}

/// Compact unless an indent width is given.
pub(crate) fn to_json_string(value: &Value, indent: usize) -> EvalResult<String> {
    let json = value.to_json();
    if indent == 0 {
        return Ok(serde_json::to_string(&json)?);
    }
    let indent = " ".repeat(indent);
    let mut buffer = Vec::new();
    let mut serializer =
        Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(indent.as_bytes()));
    json.serialize(&mut serializer)?;
    String::from_utf8(buffer).map_err(|e| EvalError::Json(e.to_string()))
}

fn stringify(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let indent = optional_number(&args, 1).unwrap_or(0.0).clamp(0.0, 10.0) as usize;
    Ok(Value::String(to_json_string(&arg(&args, 0), indent)?))
}

fn parse(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let text = expect_string(&args, 0, "JSON.parse")?;
    let json: serde_json::Value = serde_json::from_str(&text)?;
    Ok(Value::from_json(&json))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, render};
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_stringify() {
        assert_eq!(render("JSON.stringify({b: [1, 2.5], a: null})").await, r#"{"b":[1,2.5],"a":null}"#);
        assert_eq!(render("toJSON(\"x\")").await, r#""x""#);
        assert_eq!(render("JSON.stringify({a: 1}, 2)").await, "{\n  \"a\": 1\n}");
    }

    #[tokio::test]
    async fn test_parse() {
        assert_eq!(render("JSON.parse(\"{\\\"z\\\": 1, \\\"a\\\": [true]}\").a").await, "[true]");
        assert_eq!(render("fromJSON(\"[1, \\\"two\\\"]\")").await, r#"[1,"two"]"#);
        let error = eval("JSON.parse(\"{oops\")").await.unwrap_err();
        assert!(error.to_string().starts_with("JSON error:"));
    }

    #[test]
    fn test_parse_keeps_key_order() {
        let value = Value::from_json(&serde_json::json!({"z": 1, "a": 2}));
        let Value::Object(dict) = &value else {
            panic!("expected an object");
        };
        let keys: Vec<String> = dict.read().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert_eq!(to_json_string(&value, 0).unwrap(), r#"{"z":1,"a":2}"#);
    }
}
