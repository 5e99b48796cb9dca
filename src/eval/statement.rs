use std::sync::Arc;

use async_recursion::async_recursion;
use tracing::{debug, trace};

use super::{
    context::Scope,
    evaluator::{EvalError, EvalResult, Evaluator, TestResult},
    value::{Function, Value},
};
use crate::ast::{CatchClause, Expression, Statement, Statements};

/// Loops hand control back to the runtime this often.
const YIELD_INTERVAL: usize = 256;

/// 文の評価結果を表す型
#[derive(Debug, Clone)]
pub enum StatementResult {
    /// 値を返す文 (Unitを含む)
    Value(Value),

    /// 制御フロー
    Control(ControlFlow),
}

impl StatementResult {
    fn unit() -> Self {
        StatementResult::Value(Value::Null)
    }
}

#[derive(Debug, Clone)]
pub enum ControlFlow {
    Break,
    Continue,
    Return(Value),
}

/// What a loop does after running its body once.
enum LoopStep {
    Next,
    Exit,
    Propagate(StatementResult),
}

fn loop_step(result: StatementResult) -> LoopStep {
    match result {
        StatementResult::Value(_) | StatementResult::Control(ControlFlow::Continue) => {
            LoopStep::Next
        }
        StatementResult::Control(ControlFlow::Break) => LoopStep::Exit,
        other => LoopStep::Propagate(other),
    }
}

async fn pace(iteration: &mut usize) {
    *iteration += 1;
    if *iteration % YIELD_INTERVAL == 0 {
        tokio::task::yield_now().await;
    }
}

impl Evaluator {
    #[async_recursion]
    pub async fn eval_statement(
        &self,
        statement: &Statement,
        scope: &Arc<Scope>,
    ) -> EvalResult<StatementResult> {
        self.check_timeout()?;
        trace!(kind = statement.kind(), "eval statement");

        match statement {
            Statement::VarDeclaration {
                name, initializer, ..
            } => {
                let value = match initializer {
                    Some(expression) => self.eval_expression(expression, scope).await?,
                    None => Value::Null,
                };
                scope.declare(name.clone(), value);
                Ok(StatementResult::unit())
            }
            Statement::FunctionDeclaration(def) => {
                let function = Function::user(def.clone(), scope.clone());
                scope.declare_function(def.display_name(), Value::function(function));
                Ok(StatementResult::unit())
            }
            Statement::ClassDeclaration(def) => {
                let class = Function::class(def.clone(), scope.clone());
                scope.declare_function(def.name.clone(), Value::function(class));
                Ok(StatementResult::unit())
            }
            Statement::TestDeclaration { name, body } => self.eval_test(name, body, scope).await,
            Statement::Block(statements) => self.eval_block(statements, &Scope::child(scope)).await,
            Statement::Expression(expression) => Ok(StatementResult::Value(
                self.eval_expression(expression, scope).await?,
            )),
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_expression(condition, scope).await?.is_truthy() {
                    self.eval_statement(then_branch, scope).await
                } else if let Some(else_branch) = else_branch {
                    self.eval_statement(else_branch, scope).await
                } else {
                    Ok(StatementResult::unit())
                }
            }
            Statement::While { condition, body } => self.eval_while(condition, body, scope).await,
            Statement::For {
                variable,
                iterable,
                body,
            } => self.eval_for_in(variable, iterable, body, scope).await,
            Statement::ForCStyle {
                init,
                test,
                update,
                body,
            } => {
                self.eval_for_c_style(init.as_deref(), test.as_ref(), update.as_ref(), body, scope)
                    .await
            }
            Statement::Return(expression) => {
                let value = match expression {
                    Some(expression) => self.eval_expression(expression, scope).await?,
                    None => Value::Null,
                };
                Ok(StatementResult::Control(ControlFlow::Return(value)))
            }
            Statement::Break => Ok(StatementResult::Control(ControlFlow::Break)),
            Statement::Continue => Ok(StatementResult::Control(ControlFlow::Continue)),
            Statement::Try {
                block,
                handlers,
                finalizer,
            } => self.eval_try(block, handlers, finalizer.as_ref(), scope).await,
            Statement::Throw(expression) => {
                match self.eval_expression(expression, scope).await? {
                    Value::String(message) => Err(EvalError::Runtime(message)),
                    value => Err(EvalError::Thrown(value)),
                }
            }
            Statement::Assert { condition, message } => {
                if self.eval_expression(condition, scope).await?.is_truthy() {
                    return Ok(StatementResult::unit());
                }
                let message = match message {
                    Some(message) => self.eval_expression(message, scope).await?.to_string(),
                    None => "Assertion failed".to_string(),
                };
                Err(EvalError::Assertion(message))
            }
            Statement::Import { names, source } => {
                // bindings are registered by the host before execution
                debug!(?names, source, "import");
                Ok(StatementResult::unit())
            }
            Statement::Export(inner) => self.eval_statement(inner, scope).await,
        }
    }

    /// Runs statements in `scope` until one produces a control signal.
    #[async_recursion]
    pub async fn eval_block(
        &self,
        statements: &Statements,
        scope: &Arc<Scope>,
    ) -> EvalResult<StatementResult> {
        for statement in statements {
            if let StatementResult::Control(flow) = self.eval_statement(statement, scope).await? {
                return Ok(StatementResult::Control(flow));
            }
        }
        Ok(StatementResult::unit())
    }

    async fn eval_while(
        &self,
        condition: &Expression,
        body: &Statement,
        scope: &Arc<Scope>,
    ) -> EvalResult<StatementResult> {
        let mut iteration = 0;
        while self.eval_expression(condition, scope).await?.is_truthy() {
            match loop_step(self.eval_statement(body, scope).await?) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Propagate(result) => return Ok(result),
            }
            pace(&mut iteration).await;
        }
        Ok(StatementResult::unit())
    }

    async fn eval_for_in(
        &self,
        variable: &str,
        iterable: &Expression,
        body: &Statement,
        scope: &Arc<Scope>,
    ) -> EvalResult<StatementResult> {
        let items = match self.eval_expression(iterable, scope).await? {
            Value::Array(items) => items.read().clone(),
            Value::Object(dict) => dict
                .read()
                .iter()
                .map(|(k, v)| Value::array(vec![Value::from(k.as_str()), v.clone()]))
                .collect(),
            Value::String(s) => s.chars().map(|c| Value::from(c.to_string())).collect(),
            other => {
                return Err(EvalError::type_error(format!(
                    "{} is not iterable",
                    other.type_name()
                )))
            }
        };

        let loop_scope = Scope::child(scope);
        let mut iteration = 0;
        for item in items {
            loop_scope.declare(variable, item);
            match loop_step(self.eval_statement(body, &loop_scope).await?) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Propagate(result) => return Ok(result),
            }
            pace(&mut iteration).await;
        }
        Ok(StatementResult::unit())
    }

    async fn eval_for_c_style(
        &self,
        init: Option<&Statement>,
        test: Option<&Expression>,
        update: Option<&Expression>,
        body: &Statement,
        scope: &Arc<Scope>,
    ) -> EvalResult<StatementResult> {
        let loop_scope = Scope::child(scope);
        if let Some(init) = init {
            self.eval_statement(init, &loop_scope).await?;
        }

        let mut iteration = 0;
        loop {
            if let Some(test) = test {
                if !self.eval_expression(test, &loop_scope).await?.is_truthy() {
                    break;
                }
            }
            match loop_step(self.eval_statement(body, &loop_scope).await?) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Propagate(result) => return Ok(result),
            }
            if let Some(update) = update {
                self.eval_expression(update, &loop_scope).await?;
            }
            pace(&mut iteration).await;
        }
        Ok(StatementResult::unit())
    }

    async fn eval_try(
        &self,
        block: &Statements,
        handlers: &[CatchClause],
        finalizer: Option<&Statements>,
        scope: &Arc<Scope>,
    ) -> EvalResult<StatementResult> {
        let mut outcome = self.eval_block(block, &Scope::child(scope)).await;

        // Clauses carry no filter, so the first one handles the error and an
        // error raised inside it propagates.
        if let Some(handler) = handlers.first() {
            if let Err(error) = outcome {
                outcome = if error.is_catchable() {
                    debug!(error = %error, "caught error");
                    let handler_scope = Scope::child(scope);
                    if let Some(param) = &handler.param {
                        handler_scope.declare(param.clone(), error.into_catch_value());
                    }
                    self.eval_block(&handler.body, &handler_scope).await
                } else {
                    Err(error)
                };
            }
        }

        let Some(finalizer) = finalizer else {
            return outcome;
        };
        let timed_out = matches!(outcome, Err(EvalError::Timeout(_)));
        if timed_out {
            self.enter_finalizer();
        }
        let finally = self.eval_block(finalizer, &Scope::child(scope)).await;
        if timed_out {
            self.exit_finalizer();
        }

        match finally? {
            StatementResult::Control(flow) => Ok(StatementResult::Control(flow)),
            StatementResult::Value(_) => outcome,
        }
    }

    async fn eval_test(
        &self,
        name: &str,
        body: &Statements,
        scope: &Arc<Scope>,
    ) -> EvalResult<StatementResult> {
        if !self.config().verbose {
            debug!(name, "skipping test block");
            return Ok(StatementResult::unit());
        }

        match self.eval_block(body, &Scope::child(scope)).await {
            Ok(_) => {
                self.print(format!("✓ {}", name));
                self.record_test(TestResult {
                    name: name.to_string(),
                    passed: true,
                    error: None,
                });
            }
            Err(error) if error.is_catchable() => {
                self.print(format!("✗ {}: {}", name, error));
                self.record_test(TestResult {
                    name: name.to_string(),
                    passed: false,
                    error: Some(error.to_string()),
                });
            }
            Err(error) => return Err(error),
        }
        Ok(StatementResult::unit())
    }
}
