//! Array, dict and sequence builtins.
//!
//! Higher-order builtins call their callback once per element, in index
//! order, awaiting each call before starting the next. Callbacks receive
//! `(item, index)`; `reduce` passes `(accumulator, item, index)`.

use std::cmp::Ordering;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{
    arg, expect_array, expect_function, expect_number, expect_object, optional_number,
    optional_string, Builtins,
};
use crate::eval::value::MAX_ARRAY_LENGTH;
use crate::eval::{Dict, EvalError, EvalResult, Evaluator, Function, Value};

pub(super) fn register(builtins: &mut Builtins) {
    builtins
        .register_sync("len", len)
        .register_sync("push", push)
        .register_sync("pop", pop)
        .register_sync("shift", shift)
        .register_sync("unshift", unshift)
        .register_sync("concat", concat)
        .register_sync("reverse", reverse)
        .register_sync("includes", includes)
        .register_sync("indexOf", index_of)
        .register_sync("slice", slice)
        .register_sync("join", join)
        .register_sync("split", split)
        .register_sync("keys", keys)
        .register_sync("values", values)
        .register_sync("entries", entries)
        .register_sync("has", has)
        .register_sync("merge", merge)
        .register_sync("unique", unique)
        .register_sync("flatten", flatten)
        .register_sync("sum", sum)
        .register_sync("range", range)
        .register_async("map", map)
        .register_async("filter", filter)
        .register_async("reduce", reduce)
        .register_async("find", find)
        .register_async("findIndex", find_index)
        .register_async("every", every)
        .register_async("some", some)
        .register_async("forEach", for_each)
        .register_async("sort", sort);
}

fn len(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let length = match arg(&args, 0) {
        Value::Array(items) => items.read().len(),
        Value::Object(dict) => dict.read().len(),
        Value::String(s) => s.chars().count(),
        Value::Null => 0,
        other => {
            return Err(EvalError::type_error(format!(
                "len() is not defined for {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::from(length))
}

fn push(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let items = expect_array(&args, 0, "push")?;
    let mut items = items.write();
    items.extend(args.into_iter().skip(1));
    Ok(Value::from(items.len()))
}

fn pop(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let items = expect_array(&args, 0, "pop")?;
    let popped = items.write().pop();
    Ok(popped.unwrap_or_default())
}

fn shift(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let items = expect_array(&args, 0, "shift")?;
    let mut items = items.write();
    if items.is_empty() {
        return Ok(Value::Null);
    }
    Ok(items.remove(0))
}

fn unshift(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let items = expect_array(&args, 0, "unshift")?;
    let mut items = items.write();
    let front: Vec<Value> = args.into_iter().skip(1).collect();
    items.splice(0..0, front);
    Ok(Value::from(items.len()))
}

fn concat(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    if let Some(Value::String(_)) = args.first() {
        let joined: String = args.iter().map(Value::to_string).collect();
        return Ok(Value::String(joined));
    }
    let mut result = Vec::new();
    for value in args {
        match value.array_items() {
            Some(items) => result.extend(items),
            None => result.push(value),
        }
    }
    Ok(Value::array(result))
}

/// A reversed copy; the input is left as is.
fn reverse(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    match arg(&args, 0) {
        Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
        Value::Array(items) => {
            let mut items = items.read().clone();
            items.reverse();
            Ok(Value::array(items))
        }
        other => Err(EvalError::type_error(format!(
            "reverse() is not defined for {}",
            other.type_name()
        ))),
    }
}

fn includes(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let needle = arg(&args, 1);
    let found = match arg(&args, 0) {
        Value::Array(items) => items.read().iter().any(|item| item.strict_equals(&needle)),
        Value::String(s) => s.contains(needle.to_string().as_str()),
        Value::Object(dict) => dict.read().contains_key(&needle.to_string()),
        _ => false,
    };
    Ok(Value::from(found))
}

fn index_of(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let needle = arg(&args, 1);
    let position = match arg(&args, 0) {
        Value::Array(items) => items
            .read()
            .iter()
            .position(|item| item.strict_equals(&needle)),
        Value::String(s) => s
            .find(needle.to_string().as_str())
            .map(|byte| s[..byte].chars().count()),
        _ => None,
    };
    Ok(position.map_or(Value::Number(-1.0), Value::from))
}

/// Resolves a possibly negative offset against `length`.
fn clamp_index(index: f64, length: usize) -> usize {
    let length = length as f64;
    let index = index.trunc();
    let resolved = if index < 0.0 { length + index } else { index };
    resolved.clamp(0.0, length) as usize
}

fn slice(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    match arg(&args, 0) {
        Value::Array(items) => {
            let items = items.read();
            let start = clamp_index(optional_number(&args, 1).unwrap_or(0.0), items.len());
            let end = optional_number(&args, 2)
                .map_or(items.len(), |end| clamp_index(end, items.len()));
            let slice = items.get(start..end.max(start)).unwrap_or_default().to_vec();
            Ok(Value::array(slice))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let start = clamp_index(optional_number(&args, 1).unwrap_or(0.0), chars.len());
            let end = optional_number(&args, 2)
                .map_or(chars.len(), |end| clamp_index(end, chars.len()));
            Ok(Value::String(chars[start..end.max(start)].iter().collect()))
        }
        other => Err(EvalError::type_error(format!(
            "slice() is not defined for {}",
            other.type_name()
        ))),
    }
}

fn join(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let items = expect_array(&args, 0, "join")?;
    let separator = optional_string(&args, 1).unwrap_or_else(|| ",".to_string());
    let joined = items
        .read()
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(&separator);
    Ok(Value::String(joined))
}

fn split(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let text = super::expect_string(&args, 0, "split")?;
    let separator = optional_string(&args, 1).unwrap_or_default();
    let parts: Vec<Value> = if separator.is_empty() {
        text.chars().map(|c| Value::from(c.to_string())).collect()
    } else {
        text.split(separator.as_str()).map(Value::from).collect()
    };
    Ok(Value::array(parts))
}

fn keys(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    match arg(&args, 0) {
        Value::Array(items) => Ok(Value::array(
            (0..items.read().len()).map(Value::from).collect(),
        )),
        _ => {
            let dict = expect_object(&args, 0, "keys")?;
            let keys = dict.read().keys().map(|k| Value::from(k.as_str())).collect();
            Ok(Value::array(keys))
        }
    }
}

fn values(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    match arg(&args, 0) {
        Value::Array(items) => Ok(Value::array(items.read().clone())),
        _ => {
            let dict = expect_object(&args, 0, "values")?;
            let values = dict.read().values().cloned().collect();
            Ok(Value::array(values))
        }
    }
}

/// `[key, value]` pairs in insertion order.
fn entries(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let dict = expect_object(&args, 0, "entries")?;
    let pairs = dict
        .read()
        .iter()
        .map(|(k, v)| Value::array(vec![Value::from(k.as_str()), v.clone()]))
        .collect();
    Ok(Value::array(pairs))
}

fn has(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let dict = expect_object(&args, 0, "has")?;
    let key = arg(&args, 1).to_string();
    let present = dict.read().contains_key(&key);
    Ok(Value::from(present))
}

/// Shallow merge into a new dict; later arguments win.
fn merge(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let mut merged = Dict::new();
    for index in 0..args.len() {
        let dict = expect_object(&args, index, "merge")?;
        for (key, value) in dict.read().iter() {
            merged.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::object(merged))
}

fn unique(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let items = expect_array(&args, 0, "unique")?;
    let mut seen: Vec<Value> = Vec::new();
    for item in items.read().iter() {
        if !seen.iter().any(|kept| kept.strict_equals(item)) {
            seen.push(item.clone());
        }
    }
    Ok(Value::array(seen))
}

fn flatten_into(items: &[Value], depth: usize, out: &mut Vec<Value>) {
    for item in items {
        match item.array_items() {
            Some(inner) if depth > 0 => flatten_into(&inner, depth - 1, out),
            _ => out.push(item.clone()),
        }
    }
}

fn flatten(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let items = expect_array(&args, 0, "flatten")?.read().clone();
    let depth = optional_number(&args, 1).unwrap_or(1.0).max(0.0) as usize;
    let mut flat = Vec::new();
    flatten_into(&items, depth, &mut flat);
    Ok(Value::array(flat))
}

fn sum(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let items = expect_array(&args, 0, "sum")?;
    let mut total = 0.0;
    for item in items.read().iter() {
        total += item.as_number().ok_or_else(|| {
            EvalError::type_error(format!("sum() cannot add {}", item.type_name()))
        })?;
    }
    Ok(Value::Number(total))
}

/// `range(end)`, `range(start, end)` or `range(start, end, step)`. A zero
/// step gives an empty range.
fn range(evaluator: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let (start, end, step) = match args.len() {
        0 | 1 => (0.0, expect_number(&args, 0, "range")?, 1.0),
        2 => (
            expect_number(&args, 0, "range")?,
            expect_number(&args, 1, "range")?,
            1.0,
        ),
        _ => (
            expect_number(&args, 0, "range")?,
            expect_number(&args, 1, "range")?,
            expect_number(&args, 2, "range")?,
        ),
    };
    if !(start.is_finite() && end.is_finite() && step.is_finite()) {
        return Err(EvalError::runtime("range() bounds must be finite numbers"));
    }
    if step != 0.0 && ((end - start) / step).ceil() > MAX_ARRAY_LENGTH as f64 {
        return Err(EvalError::runtime("Invalid array length"));
    }

    let mut values = Vec::new();
    let mut current = start;
    while (step > 0.0 && current < end) || (step < 0.0 && current > end) {
        evaluator.check_timeout()?;
        values.push(Value::Number(current));
        let next = current + step;
        if next == current {
            return Err(EvalError::runtime(format!(
                "range() step {} does not advance past {}",
                step, current
            )));
        }
        current = next;
    }
    Ok(Value::array(values))
}

/// Snapshot of the receiver and the callback for a higher-order builtin.
fn callback_args(args: &[Value], name: &str) -> EvalResult<(Vec<Value>, Arc<Function>)> {
    let items = expect_array(args, 0, name)?.read().clone();
    let callback = expect_function(args, 1, name)?;
    Ok((items, callback))
}

async fn call_each(
    evaluator: &Evaluator,
    callback: &Function,
    item: &Value,
    index: usize,
) -> EvalResult<Value> {
    evaluator
        .call_function(callback, vec![item.clone(), Value::from(index)])
        .await
}

fn map<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let (items, callback) = callback_args(&args, "map")?;
        let mut mapped = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            mapped.push(call_each(evaluator, &callback, item, index).await?);
        }
        Ok(Value::array(mapped))
    }
    .boxed()
}

fn filter<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let (items, callback) = callback_args(&args, "filter")?;
        let mut kept = Vec::new();
        for (index, item) in items.iter().enumerate() {
            if call_each(evaluator, &callback, item, index).await?.is_truthy() {
                kept.push(item.clone());
            }
        }
        Ok(Value::array(kept))
    }
    .boxed()
}

/// Without an initial value the first item seeds the accumulator.
fn reduce<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let (items, callback) = callback_args(&args, "reduce")?;
        let mut items = items.into_iter().enumerate();
        let mut accumulator = match args.get(2) {
            Some(initial) => initial.clone(),
            None => match items.next() {
                Some((_, first)) => first,
                None => {
                    return Err(EvalError::type_error(
                        "reduce() of empty array with no initial value",
                    ))
                }
            },
        };
        for (index, item) in items {
            accumulator = evaluator
                .call_function(&callback, vec![accumulator, item, Value::from(index)])
                .await?;
        }
        Ok(accumulator)
    }
    .boxed()
}

fn find<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let (items, callback) = callback_args(&args, "find")?;
        for (index, item) in items.iter().enumerate() {
            if call_each(evaluator, &callback, item, index).await?.is_truthy() {
                return Ok(item.clone());
            }
        }
        Ok(Value::Null)
    }
    .boxed()
}

fn find_index<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let (items, callback) = callback_args(&args, "findIndex")?;
        for (index, item) in items.iter().enumerate() {
            if call_each(evaluator, &callback, item, index).await?.is_truthy() {
                return Ok(Value::from(index));
            }
        }
        Ok(Value::Number(-1.0))
    }
    .boxed()
}

fn every<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let (items, callback) = callback_args(&args, "every")?;
        for (index, item) in items.iter().enumerate() {
            if !call_each(evaluator, &callback, item, index).await?.is_truthy() {
                return Ok(Value::from(false));
            }
        }
        Ok(Value::from(true))
    }
    .boxed()
}

fn some<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let (items, callback) = callback_args(&args, "some")?;
        for (index, item) in items.iter().enumerate() {
            if call_each(evaluator, &callback, item, index).await?.is_truthy() {
                return Ok(Value::from(true));
            }
        }
        Ok(Value::from(false))
    }
    .boxed()
}

fn for_each<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let (items, callback) = callback_args(&args, "forEach")?;
        for (index, item) in items.iter().enumerate() {
            call_each(evaluator, &callback, item, index).await?;
        }
        Ok(Value::Null)
    }
    .boxed()
}

fn default_order(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.partial_cmp(r).unwrap_or(Ordering::Equal),
        _ => left.to_string().cmp(&right.to_string()),
    }
}

/// True when `right` must come before `left`.
async fn out_of_order(
    evaluator: &Evaluator,
    comparator: Option<&Function>,
    left: &Value,
    right: &Value,
) -> EvalResult<bool> {
    match comparator {
        None => Ok(default_order(left, right) == Ordering::Greater),
        Some(comparator) => {
            let result = evaluator
                .call_function(comparator, vec![left.clone(), right.clone()])
                .await?;
            Ok(result.as_number().is_some_and(|n| n > 0.0))
        }
    }
}

/// Stable bottom-up merge sort; the comparator may be async.
async fn merge_sort(
    evaluator: &Evaluator,
    mut items: Vec<Value>,
    comparator: Option<&Function>,
) -> EvalResult<Vec<Value>> {
    let n = items.len();
    let mut width = 1;
    while width < n {
        let mut merged = Vec::with_capacity(n);
        let mut start = 0;
        while start < n {
            let middle = (start + width).min(n);
            let end = (start + 2 * width).min(n);
            let (mut i, mut j) = (start, middle);
            while i < middle && j < end {
                if out_of_order(evaluator, comparator, &items[i], &items[j]).await? {
                    merged.push(items[j].clone());
                    j += 1;
                } else {
                    merged.push(items[i].clone());
                    i += 1;
                }
            }
            merged.extend_from_slice(&items[i..middle]);
            merged.extend_from_slice(&items[j..end]);
            start = end;
        }
        items = merged;
        width *= 2;
    }
    Ok(items)
}

/// Sorts the array in place and returns it.
fn sort<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let array = expect_array(&args, 0, "sort")?;
        let comparator = match args.get(1) {
            None | Some(Value::Null) => None,
            Some(_) => Some(expect_function(&args, 1, "sort")?),
        };
        let items = array.read().clone();
        let sorted = merge_sort(evaluator, items, comparator.as_deref()).await?;
        *array.write() = sorted;
        Ok(Value::Array(array))
    }
    .boxed()
}
