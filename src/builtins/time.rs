use std::fmt::Write;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;

use super::{expect_number, optional_string, Builtins};
use crate::eval::{EvalError, EvalResult, Evaluator, Value};

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

pub(super) fn register(builtins: &mut Builtins) {
    builtins
        .register_sync("now", |_, _| Ok(Value::from(Utc::now().timestamp_millis())))
        .register_sync("timestamp", |_, _| Ok(Value::from(Utc::now().to_rfc3339())))
        .register_sync("date", date)
        .register_async("sleep", sleep);
}

/// Local date formatted with a strftime pattern.
fn date(_: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let pattern = optional_string(&args, 0).unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
    let items: Vec<Item> = StrftimeItems::new(&pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(EvalError::runtime(format!("Invalid date format: {}", pattern)));
    }
    let mut formatted = String::new();
    write!(formatted, "{}", Local::now().format_with_items(items.into_iter()))
        .map_err(|_| EvalError::runtime(format!("Invalid date format: {}", pattern)))?;
    Ok(Value::String(formatted))
}

fn sleep<'a>(_: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let ms = expect_number(&args, 0, "sleep")?.max(0.0);
        tokio::time::sleep(Duration::from_millis(ms as u64)).await;
        Ok(Value::Null)
    }
    .boxed()
}
