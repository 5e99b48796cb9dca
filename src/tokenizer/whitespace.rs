//! # Whitespace Tokens
//!
//! Spaces, tabs and line breaks are kept as tokens so that every token span
//! maps back to an exact line and column. The preprocessor drops them before
//! parsing.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    combinator::map,
    error::context,
};

use super::token::{ParserResult, Token};

/// Parses a run of spaces, tabs and carriage returns.
///
/// ```
/// # use codebuddy_script::tokenizer::whitespace::parse_whitespace;
/// # use codebuddy_script::tokenizer::token::Token;
/// let (rest, token) = parse_whitespace(" \t let").unwrap();
/// assert_eq!(token, Token::Whitespace(" \t ".to_string()));
/// assert_eq!(rest, "let");
/// ```
pub fn parse_whitespace(input: &str) -> ParserResult<Token> {
    context(
        "whitespace expected",
        map(
            take_while1(|c| c == ' ' || c == '\t' || c == '\r'),
            |ws: &str| Token::Whitespace(ws.to_string()),
        ),
    )(input)
}

/// Parses a `\n` or `\r\n` line ending.
pub fn parse_newline(input: &str) -> ParserResult<Token> {
    context(
        "newline expected",
        map(alt((tag("\r\n"), tag("\n"))), |_| Token::Newline),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace() {
        let (rest, token) = parse_whitespace("   hello").unwrap();
        assert_eq!(token, Token::Whitespace("   ".to_string()));
        assert_eq!(rest, "hello");
    }

    #[test]
    fn test_newline() {
        let (rest, token) = parse_newline("\nhello").unwrap();
        assert_eq!(token, Token::Newline);
        assert_eq!(rest, "hello");

        let (rest, token) = parse_newline("\r\nworld").unwrap();
        assert_eq!(token, Token::Newline);
        assert_eq!(rest, "world");
    }

    #[test]
    fn test_error() {
        assert!(parse_whitespace("hello").is_err());
        assert!(parse_newline("hello").is_err());
    }
}
