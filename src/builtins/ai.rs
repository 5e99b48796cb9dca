//! AI builtins, installed when `enableAI` is on.
//!
//! The agent is resolved on first use, so a missing API key only fails the
//! call that needed it.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::info;

use super::{expect_string, Builtins};
use crate::eval::call::split_named;
use crate::eval::{EvalResult, Evaluator, Value};

pub(super) fn register(builtins: &mut Builtins) {
    let mut ai = Builtins::new();
    ai.register_async("ask", ask)
        .register_async("chat", chat)
        .register_async("complete", complete);
    builtins.register_namespace("ai", ai);
}

async fn send(
    evaluator: &Evaluator,
    text: &str,
    options: Option<serde_json::Value>,
) -> EvalResult<Value> {
    let agent = evaluator.agent().await?;
    info!(chars = text.len(), "sending prompt to AI agent");
    let response = agent.process_user_input(text, options).await?;
    Ok(Value::String(response.content))
}

fn ask<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let prompt = expect_string(&args, 0, "ai.ask")?;
        send(evaluator, &prompt, None).await
    }
    .boxed()
}

fn complete<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let prompt = expect_string(&args, 0, "ai.complete")?;
        send(evaluator, &prompt, None).await
    }
    .boxed()
}

/// `ai.chat(message, options?)`; options may also be given as named
/// arguments, e.g. `ai.chat(msg, system: "Be brief")`.
fn chat<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let (args, named) = split_named(args);
        let message = expect_string(&args, 0, "ai.chat")?;
        let options = match (named, args.get(1)) {
            (Some(named), _) => Some(Value::object(named).to_json()),
            (None, Some(Value::Null)) | (None, None) => None,
            (None, Some(options)) => Some(options.to_json()),
        };
        send(evaluator, &message, options).await
    }
    .boxed()
}
