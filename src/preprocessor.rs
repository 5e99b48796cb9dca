//! # Token Preprocessor
//!
//! Sits between the tokenizer and the parser:
//!
//! ```text
//! Source → Tokenizer → Preprocessor → Parser → Evaluator
//! ```
//!
//! It drops whitespace, newline and comment tokens. Spans survive the pass so
//! the parser can still point at the line and column of the token it choked on.

use crate::tokenizer::token::{Token, TokenSpan};

/// A trait for preprocessing different types of input
pub trait Preprocessor<T, U = T> {
    fn process(&self, input: T) -> U;
}

#[derive(Debug, Default, Clone)]
pub struct TokenPreprocessor {}

impl Preprocessor<Vec<TokenSpan>> for TokenPreprocessor {
    fn process(&self, input: Vec<TokenSpan>) -> Vec<TokenSpan> {
        input
            .into_iter()
            .filter(|span| !span.token.is_trivia())
            .collect()
    }
}

impl TokenPreprocessor {
    /// Splits preprocessed spans into the bare token stream the parser runs on
    /// and the spans used to report positions.
    pub fn split(&self, input: Vec<TokenSpan>) -> (Vec<Token>, Vec<TokenSpan>) {
        let spans = self.process(input);
        let tokens = spans.iter().map(|span| span.token.clone()).collect();
        (tokens, spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::token::Tokenizer;

    #[test]
    fn test_trivia_removed() {
        let spans = Tokenizer::new()
            .tokenize("let a = 1 // note\n/* block */ a")
            .unwrap();
        let (tokens, spans) = TokenPreprocessor::default().split(spans);
        assert_eq!(tokens.len(), 5);
        assert!(tokens.iter().all(|token| !token.is_trivia()));
        assert_eq!(spans[4].line, 2);
    }
}
