//! Script Evaluation
//!
//! Executes a parsed [`Program`](crate::ast::Program) by walking the tree.
//!
//! # Core Components
//!
//! ## Evaluator
//! Owns the run: builtin and global scopes, collected output, test results,
//! the deadline and the host providers.
//!
//! ## Statement Evaluator
//! Declarations, control flow, `try`/`throw`, `test` and `assert`. Control
//! flow travels as [`StatementResult::Control`] rather than as errors.
//!
//! ## Expression Evaluator
//! Operators, member and index access, assignment targets, literals and
//! string interpolation.
//!
//! ## Calls
//! Argument binding (positional, named, defaults), closures, natives and
//! class instantiation.
//!
//! ## Scope
//! The chain of variable tables closures capture.
//!
//! # Errors
//!
//! Every failure is an [`EvalError`]. All but [`EvalError::Timeout`] can be
//! caught by a script's `catch` clause, which sees either the thrown value or
//! a `{ message, stack }` dict.

pub mod call;
pub mod context;
pub mod evaluator;
pub mod expression;
pub mod statement;
pub mod value;

pub use context::Scope;
pub use evaluator::{EvalError, EvalResult, Evaluator, TestResult};
pub use statement::{ControlFlow, StatementResult};
pub use value::{Dict, Function, FunctionKind, NativeFunction, Value};
