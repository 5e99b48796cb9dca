use super::{arg, Builtins};
use crate::eval::{EvalResult, Evaluator, Value};

pub(super) fn register(builtins: &mut Builtins) {
    builtins
        .register_sync("typeOf", type_of)
        .register_sync("str", to_str)
        .register_sync("num", to_num)
        .register_sync("float", to_num)
        .register_sync("int", to_int)
        .register_sync("bool", to_bool)
        .register_sync("isNull", |_, args| Ok(Value::from(matches!(arg(&args, 0), Value::Null))))
        .register_sync("isArray", |_, args| {
            Ok(Value::from(matches!(arg(&args, 0), Value::Array(_))))
        })
        .register_sync("isObject", |_, args| {
            Ok(Value::from(matches!(arg(&args, 0), Value::Object(_))))
        })
        .register_sync("isString", |_, args| {
            Ok(Value::from(matches!(arg(&args, 0), Value::String(_))))
        })
        .register_sync("isNumber", |_, args| {
            Ok(Value::from(matches!(arg(&args, 0), Value::Number(_))))
        })
        .register_sync("isFunction", |_, args| {
            Ok(Value::from(matches!(arg(&args, 0), Value::Function(_))))
        });
}

fn type_of(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::from(arg(&args, 0).type_name()))
}

fn to_str(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::String(arg(&args, 0).to_string()))
}

/// Numeric conversion. Unparseable strings and containers give `NaN`.
pub(crate) fn number_of(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        other => other.as_number().unwrap_or(f64::NAN),
    }
}

fn to_num(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Number(number_of(&arg(&args, 0))))
}

fn to_int(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::Number(number_of(&arg(&args, 0)).trunc()))
}

fn to_bool(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    Ok(Value::from(arg(&args, 0).is_truthy()))
}
