//! # Core Parser Definitions
//!
//! The parser interface and error type underneath the combinator system.
//! Positions are indices into the token slice; [`ParseError::locate`] turns a
//! position into a source line and column once parsing has failed for good.

use thiserror::Error;

use crate::tokenizer::token::{Token, TokenSpan};

/// Parser trait defines the core parsing interface.
///
/// A parser takes an input slice and a position and either succeeds with the
/// next position and an output value, or fails with a [`ParseError`].
pub trait Parser<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O>;
}

pub type ParseResult<O> = Result<(usize, O), ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected end of input, context: {context:?}")]
    UnexpectedEOF {
        position: usize,
        context: Option<String>,
    },
    #[error("Unexpected token '{found}', expected {expected} at position {position}")]
    Unexpected {
        expected: String,
        found: String,
        position: usize,
        context: Option<String>,
    },
    #[error("No alternative matched at position {position}, context: {context:?}")]
    NoAlternative {
        position: usize,
        context: Option<String>,
    },
    #[error("{message} at position {position}")]
    Failure {
        message: String,
        position: usize,
        context: Option<String>,
    },
    /// Final, user-facing form of an error, anchored to the source text.
    #[error("{message} at line {line}, column {column}")]
    Located {
        message: String,
        line: usize,
        column: usize,
    },
}

impl ParseError {
    pub fn with_context(self, ctx: &str) -> Self {
        let chain = |context: Option<String>| match context {
            Some(c) => Some(format!("{} -> {}", ctx, c)),
            None => Some(ctx.to_string()),
        };
        match self {
            ParseError::UnexpectedEOF { position, context } => ParseError::UnexpectedEOF {
                position,
                context: chain(context),
            },
            ParseError::Unexpected {
                expected,
                found,
                position,
                context,
            } => ParseError::Unexpected {
                expected,
                found,
                position,
                context: chain(context),
            },
            ParseError::NoAlternative { position, context } => ParseError::NoAlternative {
                position,
                context: chain(context),
            },
            ParseError::Failure {
                message,
                position,
                context,
            } => ParseError::Failure {
                message,
                position,
                context: chain(context),
            },
            located @ ParseError::Located { .. } => located,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ParseError::Failure { .. })
    }

    pub fn get_position(&self) -> usize {
        match self {
            ParseError::UnexpectedEOF { position, .. } => *position,
            ParseError::Unexpected { position, .. } => *position,
            ParseError::NoAlternative { position, .. } => *position,
            ParseError::Failure { position, .. } => *position,
            ParseError::Located { .. } => 0,
        }
    }

    /// Resolves the token position to a line and column.
    ///
    /// Produces `Unexpected token 'X' at line L, column C`, or the explicit
    /// failure message for errors raised by semantic checks such as an invalid
    /// assignment target.
    pub fn locate(self, tokens: &[Token], spans: &[TokenSpan]) -> ParseError {
        if let ParseError::Located { .. } = self {
            return self;
        }
        let position = self.get_position();
        let explicit = match &self {
            ParseError::Failure { message, .. } => Some(message.clone()),
            _ => None,
        };
        match (tokens.get(position), spans.get(position)) {
            (Some(token), Some(span)) => ParseError::Located {
                message: explicit.unwrap_or_else(|| format!("Unexpected token '{}'", token)),
                line: span.line,
                column: span.column,
            },
            _ => {
                let (line, column) = spans
                    .last()
                    .map(|span| (span.line, span.column))
                    .unwrap_or((1, 1));
                ParseError::Located {
                    message: explicit.unwrap_or_else(|| "Unexpected end of input".to_string()),
                    line,
                    column,
                }
            }
        }
    }
}
