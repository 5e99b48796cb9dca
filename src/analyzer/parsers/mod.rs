pub mod common;
pub use common::*;

pub mod expression;
pub mod statement;

use super::core::{ParseError, Parser};
use crate::ast::{Expression, Program};
use crate::error::InternalResult;
use crate::preprocessor::TokenPreprocessor;
use crate::tokenizer::token::Tokenizer;

/// Tokenizes, preprocesses and parses a whole script.
#[tracing::instrument(level = "debug", skip(source))]
pub fn parse_program(source: &str) -> InternalResult<Program> {
    let spans = Tokenizer::new().tokenize(source)?;
    let (tokens, spans) = TokenPreprocessor::default().split(spans);

    let (pos, statements) = statement::parse_statements()
        .parse(&tokens, 0)
        .map_err(|e| e.locate(&tokens, &spans))?;

    if pos < tokens.len() {
        let error = ParseError::NoAlternative {
            position: pos,
            context: Some("statement".to_string()),
        };
        return Err(error.locate(&tokens, &spans).into());
    }

    tracing::debug!(statements = statements.len(), "parsed program");
    Ok(Program::new(statements))
}

/// Parses the source of a `${...}` interpolation into one expression.
pub fn parse_expression_source(source: &str) -> Result<Expression, String> {
    let spans = Tokenizer::new()
        .tokenize(source)
        .map_err(|e| e.to_string())?;
    let (tokens, spans) = TokenPreprocessor::default().split(spans);

    let (pos, expression) = expression::parse_expression()
        .parse(&tokens, 0)
        .map_err(|e| e.locate(&tokens, &spans).to_string())?;

    if pos < tokens.len() {
        let error = ParseError::NoAlternative {
            position: pos,
            context: None,
        };
        return Err(error.locate(&tokens, &spans).to_string());
    }
    Ok(expression)
}
