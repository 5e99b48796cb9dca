use regex::Regex;

use super::{arg, expect_number, expect_string, optional_number, optional_string, Builtins};
use crate::eval::value::{repeat_string, MAX_STRING_LENGTH};
use crate::eval::{EvalError, EvalResult, Evaluator, Value};

pub(super) fn register(builtins: &mut Builtins) {
    builtins
        .register_sync("upper", |_, args| Ok(Value::from(expect_string(&args, 0, "upper")?.to_uppercase())))
        .register_sync("lower", |_, args| Ok(Value::from(expect_string(&args, 0, "lower")?.to_lowercase())))
        .register_sync("trim", |_, args| Ok(Value::from(expect_string(&args, 0, "trim")?.trim())))
        .register_sync("trimStart", |_, args| {
            Ok(Value::from(expect_string(&args, 0, "trimStart")?.trim_start()))
        })
        .register_sync("trimEnd", |_, args| {
            Ok(Value::from(expect_string(&args, 0, "trimEnd")?.trim_end()))
        })
        .register_sync("replace", replace)
        .register_sync("replaceAll", replace_all)
        .register_sync("startsWith", starts_with)
        .register_sync("endsWith", ends_with)
        .register_sync("substring", substring)
        .register_sync("padStart", pad_start)
        .register_sync("padEnd", pad_end)
        .register_sync("repeat", repeat)
        .register_sync("charAt", char_at)
        .register_sync("chars", chars)
        .register_sync("match", match_regex)
        .register_sync("matches", matches_regex)
        .register_sync("format", format);
}

/// Replaces the first occurrence only.
fn replace(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let text = expect_string(&args, 0, "replace")?;
    let from = expect_string(&args, 1, "replace")?;
    let to = arg(&args, 2).to_string();
    Ok(Value::from(text.replacen(&from, &to, 1)))
}

fn replace_all(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let text = expect_string(&args, 0, "replaceAll")?;
    let from = expect_string(&args, 1, "replaceAll")?;
    let to = arg(&args, 2).to_string();
    if from.is_empty() {
        return Ok(Value::from(text));
    }
    Ok(Value::from(text.replace(&from, &to)))
}

fn starts_with(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let text = expect_string(&args, 0, "startsWith")?;
    let prefix = expect_string(&args, 1, "startsWith")?;
    Ok(Value::from(text.starts_with(&prefix)))
}

fn ends_with(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let text = expect_string(&args, 0, "endsWith")?;
    let suffix = expect_string(&args, 1, "endsWith")?;
    Ok(Value::from(text.ends_with(&suffix)))
}

/// Character offsets, clamped to the string. Swapped bounds are reordered.
fn substring(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let text: Vec<char> = expect_string(&args, 0, "substring")?.chars().collect();
    let bound = |n: f64| n.trunc().clamp(0.0, text.len() as f64) as usize;
    let start = bound(expect_number(&args, 1, "substring")?);
    let end = optional_number(&args, 2).map_or(text.len(), bound);
    let (start, end) = if start > end { (end, start) } else { (start, end) };
    Ok(Value::String(text[start..end].iter().collect()))
}

fn padding(args: &[Value], name: &str) -> EvalResult<(String, String)> {
    let text = expect_string(args, 0, name)?;
    let width = expect_number(args, 1, name)?.max(0.0) as usize;
    if width > MAX_STRING_LENGTH {
        return Err(EvalError::runtime("Invalid string length"));
    }
    let fill = optional_string(args, 2).unwrap_or_else(|| " ".to_string());
    let missing = width.saturating_sub(text.chars().count());
    if fill.is_empty() || missing == 0 {
        return Ok((text, String::new()));
    }
    let pad: String = fill.chars().cycle().take(missing).collect();
    Ok((text, pad))
}

fn pad_start(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let (text, pad) = padding(&args, "padStart")?;
    Ok(Value::String(pad + &text))
}

fn pad_end(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let (text, pad) = padding(&args, "padEnd")?;
    Ok(Value::String(text + &pad))
}

fn repeat(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let text = expect_string(&args, 0, "repeat")?;
    let count = expect_number(&args, 1, "repeat")?;
    if count < 0.0 || !count.is_finite() {
        return Err(EvalError::runtime(format!("Invalid repeat count: {}", count)));
    }
    Ok(Value::String(repeat_string(&text, count as usize)?))
}

fn char_at(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let text = expect_string(&args, 0, "charAt")?;
    let index = optional_number(&args, 1).unwrap_or(0.0);
    if index < 0.0 {
        return Ok(Value::from(""));
    }
    Ok(Value::String(
        text.chars()
            .nth(index as usize)
            .map(String::from)
            .unwrap_or_default(),
    ))
}

fn chars(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let text = expect_string(&args, 0, "chars")?;
    Ok(Value::array(
        text.chars().map(|c| Value::String(c.to_string())).collect(),
    ))
}

fn compile(pattern: &str) -> EvalResult<Regex> {
    Regex::new(pattern).map_err(|e| EvalError::runtime(format!("Invalid regex '{}': {}", pattern, e)))
}

/// Every match of the pattern, or `null` when nothing matches.
fn match_regex(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let text = expect_string(&args, 0, "match")?;
    let regex = compile(&expect_string(&args, 1, "match")?)?;
    let found: Vec<Value> = regex
        .find_iter(&text)
        .map(|m| Value::from(m.as_str()))
        .collect();
    if found.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::array(found))
}

fn matches_regex(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let text = expect_string(&args, 0, "matches")?;
    let regex = compile(&expect_string(&args, 1, "matches")?)?;
    Ok(Value::from(regex.is_match(&text)))
}

/// Fills `{}` placeholders with the remaining arguments in order. Surplus
/// placeholders stay as they are.
fn format(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let template = expect_string(&args, 0, "format")?;
    let mut values = args.iter().skip(1);
    let mut pieces = template.split("{}");
    let mut result = pieces.next().unwrap_or_default().to_string();
    for piece in pieces {
        match values.next() {
            Some(value) => result.push_str(&value.to_string()),
            None => result.push_str("{}"),
        }
        result.push_str(piece);
    }
    Ok(Value::String(result))
}
