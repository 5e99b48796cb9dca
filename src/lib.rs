//! # CodeBuddy Script
//!
//! An embedded scripting language for automating development tasks: reading
//! and writing files, running shell commands, asking an AI model, and
//! checking the results with inline `test` blocks.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Source → Tokenizer → Preprocessor → Parser → Evaluator → ScriptResult
//! ```
//!
//! ### Stage 1: Tokenization
//!
//! The [`tokenizer`] module turns source text into tokens with line and column
//! spans.
//!
//! ### Stage 2: Preprocessing
//!
//! The [`preprocessor`] drops whitespace, newlines and comments.
//!
//! ### Stage 3: Parsing
//!
//! The [`analyzer`] builds the [`ast`] with parser combinators.
//!
//! ### Stage 4: Evaluation
//!
//! The [`eval`] module walks the tree asynchronously against a chain of
//! scopes. Host-facing builtins live in [`builtins`]; the host itself is
//! reached only through the traits in [`provider`].
//!
//! ## Entry Points
//!
//! [`execute_script`], [`execute_script_file`], [`validate_script`] and
//! [`generate_template`] in [`script`]. Execution never panics or returns an
//! error to the caller; failures come back inside [`ScriptResult`].

pub mod analyzer;
pub mod ast;
pub mod builtins;
pub mod config;
pub mod error;
pub mod eval;
pub mod preprocessor;
pub mod provider;
pub mod script;
pub mod tokenizer;

// Re-exports
pub use config::ScriptConfig;
pub use error::*;
pub use eval::{EvalError, Evaluator, TestResult, Value};
pub use script::{
    execute_script, execute_script_file, generate_template, validate_script, ScriptResult,
    ValidationResult,
};
