use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{
    context::Scope,
    statement::{ControlFlow, StatementResult},
    value::{Dict, Value},
};
use crate::ast::Program;
use crate::builtins;
use crate::config::ScriptConfig;
use crate::provider::{
    AiAgent, FileSystem, LocalFileSystem, LocalProcessLauncher, OpenAiCompatibleAgent,
    ProcessLauncher, ProviderError,
};

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("{0} is not a function")]
    NotCallable(String),

    #[error("TypeError: {0}")]
    TypeError(String),

    /// A non-string value raised by `throw`.
    #[error("{}", thrown_message(.0))]
    Thrown(Value),

    #[error("{0}")]
    Runtime(String),

    #[error("{0}")]
    Assertion(String),

    #[error("Script timeout after {0}ms")]
    Timeout(u128),

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

fn thrown_message(value: &Value) -> String {
    match value.get_property("message") {
        Some(Value::String(message)) => message,
        _ => value.to_string(),
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(error: serde_json::Error) -> Self {
        EvalError::Json(error.to_string())
    }
}

impl From<std::io::Error> for EvalError {
    fn from(error: std::io::Error) -> Self {
        EvalError::Io(error.to_string())
    }
}

impl EvalError {
    pub fn type_error(message: impl Into<String>) -> Self {
        EvalError::TypeError(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        EvalError::Runtime(message.into())
    }

    /// Name used as the `stack` of a caught error.
    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::UndefinedVariable(_) => "ReferenceError",
            EvalError::NotCallable(_) | EvalError::TypeError(_) => "TypeError",
            EvalError::Thrown(_) | EvalError::Runtime(_) => "Error",
            EvalError::Assertion(_) => "AssertionError",
            EvalError::Timeout(_) => "TimeoutError",
            EvalError::Provider(_) => "ProviderError",
            EvalError::Io(_) => "IOError",
            EvalError::Json(_) => "SyntaxError",
        }
    }

    /// Everything except the deadline can be handled by `catch` and `test`.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, EvalError::Timeout(_))
    }

    /// The value a `catch (e)` clause binds.
    pub fn into_catch_value(self) -> Value {
        match self {
            EvalError::Thrown(value) => value,
            other => {
                let message = other.to_string();
                let mut dict = Dict::new();
                dict.insert("stack", Value::from(format!("{}: {}", other.kind(), message)));
                dict.insert("message", Value::from(message));
                Value::object(dict)
            }
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Nested function calls allowed before a call fails.
pub const MAX_CALL_DEPTH: usize = 400;

/// Tree-walking interpreter state for one script run.
///
/// Builtins live in their own scope; the script's global scope is a child of
/// it, so user declarations shadow builtins without replacing them for
/// method-style calls.
pub struct Evaluator {
    config: Arc<ScriptConfig>,
    builtins: Arc<Scope>,
    globals: Arc<Scope>,
    output: Mutex<Vec<String>>,
    test_results: Mutex<Vec<TestResult>>,
    started_at: Mutex<Instant>,
    /// Non-zero while `finally` blocks run after the deadline passed.
    finalizing: AtomicUsize,
    /// Function calls currently on the interpreter stack.
    call_depth: AtomicUsize,
    agent: OnceCell<Option<Arc<dyn AiAgent>>>,
    file_system: Arc<dyn FileSystem>,
    process_launcher: Arc<dyn ProcessLauncher>,
}

impl Evaluator {
    pub fn new(config: ScriptConfig) -> Self {
        let builtins = Scope::new();
        builtins::install(&builtins, &config);

        let globals = Scope::child(&builtins);
        for (name, value) in &config.variables {
            globals.declare(name.clone(), Value::from_json(value));
        }

        let agent = match &config.agent {
            Some(agent) => OnceCell::new_with(Some(Some(agent.clone()))),
            None => OnceCell::new(),
        };
        let file_system = config
            .file_system
            .clone()
            .unwrap_or_else(|| Arc::new(LocalFileSystem));
        let process_launcher = config
            .process_launcher
            .clone()
            .unwrap_or_else(|| Arc::new(LocalProcessLauncher));

        Self {
            config: Arc::new(config),
            builtins,
            globals,
            output: Mutex::new(Vec::new()),
            test_results: Mutex::new(Vec::new()),
            started_at: Mutex::new(Instant::now()),
            finalizing: AtomicUsize::new(0),
            call_depth: AtomicUsize::new(0),
            agent,
            file_system,
            process_launcher,
        }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    pub fn globals(&self) -> &Arc<Scope> {
        &self.globals
    }

    /// A builtin by name, regardless of what the script has shadowed.
    pub fn builtin(&self, name: &str) -> Option<Value> {
        self.builtins.lookup(name)
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.file_system
    }

    pub fn process_launcher(&self) -> &Arc<dyn ProcessLauncher> {
        &self.process_launcher
    }

    pub fn resolve_path(&self, path: &str) -> PathBuf {
        self.config.resolve_path(path)
    }

    /// Appends one line to the script output.
    pub fn print(&self, line: impl Into<String>) {
        let line = line.into();
        debug!(target: "script::output", "{}", line);
        self.output.lock().push(line);
    }

    /// In dry-run mode, records `[DRY RUN] {action}` and returns true.
    pub fn dry_run(&self, action: impl AsRef<str>) -> bool {
        if self.config.dry_run {
            self.print(format!("[DRY RUN] {}", action.as_ref()));
        }
        self.config.dry_run
    }

    pub fn output(&self) -> Vec<String> {
        self.output.lock().clone()
    }

    pub fn test_results(&self) -> Vec<TestResult> {
        self.test_results.lock().clone()
    }

    pub(crate) fn record_test(&self, result: TestResult) {
        self.test_results.lock().push(result);
    }

    /// The AI agent: the injected one, or one built from the environment on
    /// first use.
    pub async fn agent(&self) -> EvalResult<Arc<dyn AiAgent>> {
        let agent = self
            .agent
            .get_or_init(|| async {
                let agent = OpenAiCompatibleAgent::from_env();
                if agent.is_none() {
                    warn!("no AI credentials configured");
                }
                agent.map(|a| Arc::new(a) as Arc<dyn AiAgent>)
            })
            .await;
        agent
            .clone()
            .ok_or_else(|| EvalError::runtime("AI agent not available"))
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.lock().elapsed()
    }

    /// Fails once the configured budget is spent. While `finally` blocks run
    /// after a timeout the budget is doubled so cleanup code gets a chance.
    pub fn check_timeout(&self) -> EvalResult<()> {
        let mut limit = self.config.timeout;
        if self.finalizing.load(Ordering::Relaxed) > 0 {
            limit *= 2;
        }
        if self.elapsed() > limit {
            return Err(EvalError::Timeout(self.config.timeout.as_millis()));
        }
        Ok(())
    }

    /// Claims one level of call depth, failing once the script recursed past
    /// [`MAX_CALL_DEPTH`]. Every successful call must be paired with
    /// [`Evaluator::exit_call`].
    pub(crate) fn enter_call(&self) -> EvalResult<()> {
        if self.call_depth.fetch_add(1, Ordering::Relaxed) >= MAX_CALL_DEPTH {
            self.call_depth.fetch_sub(1, Ordering::Relaxed);
            return Err(EvalError::runtime("Maximum call stack size exceeded"));
        }
        Ok(())
    }

    pub(crate) fn exit_call(&self) {
        self.call_depth.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn enter_finalizer(&self) {
        self.finalizing.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn exit_finalizer(&self) {
        self.finalizing.fetch_sub(1, Ordering::Relaxed);
    }

    /// Runs a program's top-level statements. Returns the value of a
    /// top-level `return`, if one ran.
    #[tracing::instrument(level = "debug", skip_all, fields(statements = program.statements.len()))]
    pub async fn execute(&self, program: &Program) -> EvalResult<Option<Value>> {
        *self.started_at.lock() = Instant::now();
        for statement in &program.statements {
            if let StatementResult::Control(ControlFlow::Return(value)) =
                self.eval_statement(statement, &self.globals).await?
            {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parse_program;
    use crate::provider::agent::MockAiAgent;
    use crate::provider::AgentResponse;

    async fn run(source: &str, config: ScriptConfig) -> (Evaluator, EvalResult<Option<Value>>) {
        let program = parse_program(source).unwrap();
        let evaluator = Evaluator::new(config);
        let result = evaluator.execute(&program).await;
        (evaluator, result)
    }

    #[tokio::test]
    async fn test_top_level_return() {
        let (_, result) = run("let a = 2\nreturn a * 21\nprint(\"unreached\")", ScriptConfig::default()).await;
        assert_eq!(result.unwrap(), Some(Value::from(42.0)));
    }

    #[tokio::test]
    async fn test_seeded_variables() {
        let mut config = ScriptConfig::default();
        config
            .variables
            .insert("greeting".to_string(), serde_json::json!("hi"));
        let (_, result) = run("return greeting + \"!\"", config).await;
        assert_eq!(result.unwrap(), Some(Value::from("hi!")));
    }

    #[tokio::test]
    async fn test_catch_value_shapes() {
        let error = EvalError::runtime("boom");
        let value = error.into_catch_value();
        assert_eq!(value.get_property("message"), Some(Value::from("boom")));
        assert_eq!(value.get_property("stack"), Some(Value::from("Error: boom")));

        let thrown = Value::from(7.0);
        assert_eq!(EvalError::Thrown(thrown.clone()).into_catch_value(), thrown);
    }

    #[tokio::test]
    async fn test_timeout_is_not_catchable() {
        let config = ScriptConfig {
            timeout: Duration::from_millis(10),
            ..Default::default()
        };
        let (_, result) = run("try { while (true) {} } catch (e) { return 1 }", config).await;
        assert!(matches!(result, Err(EvalError::Timeout(10))));
    }

    #[tokio::test]
    async fn test_agent_missing_is_runtime_error() {
        let evaluator = Evaluator::new(ScriptConfig::default());
        // only meaningful when the environment carries no key
        if std::env::var(crate::provider::agent::API_KEY_ENV).is_err() {
            let error = evaluator.agent().await.err().unwrap();
            assert_eq!(error.to_string(), "AI agent not available");
        }
    }

    #[tokio::test]
    async fn test_injected_agent_is_used() {
        let mut agent = MockAiAgent::new();
        agent
            .expect_process_user_input()
            .returning(|_, _| Ok(AgentResponse::new("ok")));
        let config = ScriptConfig::default().with_agent(Arc::new(agent));
        let evaluator = Evaluator::new(config);
        let agent = evaluator.agent().await.unwrap();
        assert_eq!(agent.process_user_input("x", None).await.unwrap().content, "ok");
    }
}
