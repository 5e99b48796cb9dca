//! # Analyzer
//!
//! Turns the preprocessed token stream into a [`Program`](crate::ast::Program).
//!
//! The grammar is written with the small combinator library in
//! [`combinators`] and [`prelude`]; the rules themselves live in [`parsers`].
//! Positions are token indices until [`ParseError::locate`] maps the final
//! error back to a line and column of the source.
//!
//! ```
//! use codebuddy_script::analyzer::parsers::parse_program;
//!
//! let program = parse_program("let x = 1 + 2").unwrap();
//! assert_eq!(program.statements.len(), 1);
//! ```

pub mod combinators;
pub mod core;
pub mod parsers;
pub mod prelude;

pub use core::ParseError;
pub use core::ParseResult;
pub use core::Parser;
pub use parsers::{parse_expression_source, parse_program};
