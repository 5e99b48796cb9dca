use rand::Rng;

use super::{arg, expect_number, Builtins};
use crate::eval::{EvalError, EvalResult, Evaluator, Value};

pub(super) fn register(builtins: &mut Builtins) {
    builtins
        .register_sync("abs", |_, args| unary(&args, "abs", f64::abs))
        .register_sync("floor", |_, args| unary(&args, "floor", f64::floor))
        .register_sync("ceil", |_, args| unary(&args, "ceil", f64::ceil))
        .register_sync("round", |_, args| unary(&args, "round", f64::round))
        .register_sync("sqrt", |_, args| unary(&args, "sqrt", f64::sqrt))
        .register_sync("log10", |_, args| unary(&args, "log10", f64::log10))
        .register_sync("exp", |_, args| unary(&args, "exp", f64::exp))
        .register_sync("sign", |_, args| unary(&args, "sign", sign))
        .register_sync("pow", pow)
        .register_sync("min", |_, args| extremum(args, "min", f64::min))
        .register_sync("max", |_, args| extremum(args, "max", f64::max))
        .register_sync("clamp", clamp)
        .register_sync("random", random)
        .register_value("PI", Value::Number(std::f64::consts::PI))
        .register_value("E", Value::Number(std::f64::consts::E));
}

fn unary(args: &[Value], name: &str, op: fn(f64) -> f64) -> EvalResult<Value> {
    Ok(Value::Number(op(expect_number(args, 0, name)?)))
}

fn sign(n: f64) -> f64 {
    if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        n
    }
}

fn pow(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let base = expect_number(&args, 0, "pow")?;
    let exponent = expect_number(&args, 1, "pow")?;
    Ok(Value::Number(base.powf(exponent)))
}

/// Accepts either numbers as arguments or a single array of numbers.
fn extremum(args: Vec<Value>, name: &str, pick: fn(f64, f64) -> f64) -> EvalResult<Value> {
    let spread = match args.as_slice() {
        [Value::Array(items)] => Some(items.read().clone()),
        _ => None,
    };
    let numbers = spread.unwrap_or(args);
    let mut result: Option<f64> = None;
    for value in &numbers {
        let n = match value {
            Value::Number(n) => *n,
            other => {
                return Err(EvalError::type_error(format!(
                    "{}() expects numbers, got {}",
                    name,
                    other.type_name()
                )))
            }
        };
        result = Some(result.map_or(n, |current| pick(current, n)));
    }
    result
        .map(Value::Number)
        .ok_or_else(|| EvalError::type_error(format!("{}() needs at least one number", name)))
}

fn clamp(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let value = expect_number(&args, 0, "clamp")?;
    let low = expect_number(&args, 1, "clamp")?;
    let high = expect_number(&args, 2, "clamp")?;
    if low > high {
        return Err(EvalError::runtime(format!(
            "clamp() lower bound {} exceeds upper bound {}",
            arg(&args, 1),
            arg(&args, 2)
        )));
    }
    Ok(Value::Number(value.clamp(low, high)))
}

/// `random()` in `[0, 1)`, `random(max)` in `[0, max)` or `random(min, max)`.
fn random(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let mut rng = rand::thread_rng();
    let (low, high) = match args.len() {
        0 => return Ok(Value::Number(rng.gen::<f64>())),
        1 => (0.0, expect_number(&args, 0, "random")?),
        _ => (
            expect_number(&args, 0, "random")?,
            expect_number(&args, 1, "random")?,
        ),
    };
    if low >= high {
        return Ok(Value::Number(low));
    }
    Ok(Value::Number(rng.gen_range(low..high)))
}
