//! # Symbol Tokens
//!
//! Operators and delimiters of the scripting language.
//!
//! Operators are matched longest-first, so `===` wins over `==` and `=`, and
//! `+=` wins over `+`.

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::tag,
    combinator::{map, value},
    error::context,
};
use strum_macros::{AsRefStr, EnumString};

use super::token::{ParserResult, Token};

/// Operators recognised by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, strum_macros::Display)]
pub enum Operator {
    /// Lambda arrow (`=>`)
    #[strum(serialize = "=>")]
    Arrow,
    /// Strict equality (`===`)
    #[strum(serialize = "===")]
    StrictEqual,
    /// Strict inequality (`!==`)
    #[strum(serialize = "!==")]
    StrictNotEqual,
    /// Equality (`==`), strict at runtime
    #[strum(serialize = "==")]
    EqualEqual,
    /// Inequality (`!=`), strict at runtime
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "++")]
    Increment,
    #[strum(serialize = "--")]
    Decrement,
    #[strum(serialize = "+=")]
    PlusAssign,
    #[strum(serialize = "-=")]
    MinusAssign,
    #[strum(serialize = "*=")]
    MultiplyAssign,
    #[strum(serialize = "/=")]
    DivideAssign,

    /// Member access (`.`)
    #[strum(serialize = ".")]
    Dot,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Percent,
    #[strum(serialize = "!")]
    Not,
    /// Ternary condition (`?`)
    #[strum(serialize = "?")]
    Question,
    /// Plain assignment (`=`)
    #[strum(serialize = "=")]
    Assign,
}

/// Structural punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
pub enum Delimiter {
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Comma,
    Semicolon,
    Colon,
}

impl Delimiter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Delimiter::OpenBrace => "{",
            Delimiter::CloseBrace => "}",
            Delimiter::OpenParen => "(",
            Delimiter::CloseParen => ")",
            Delimiter::OpenBracket => "[",
            Delimiter::CloseBracket => "]",
            Delimiter::Comma => ",",
            Delimiter::Semicolon => ";",
            Delimiter::Colon => ":",
        }
    }
}

// strum's Display chokes on brace literals, so this one is written by hand.
impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses an operator token, longest match first.
///
/// ```
/// # use codebuddy_script::tokenizer::symbol::{parse_operator, Operator};
/// # use codebuddy_script::tokenizer::token::Token;
/// let (rest, token) = parse_operator("!== rest").unwrap();
/// assert_eq!(token, Token::Operator(Operator::StrictNotEqual));
/// assert_eq!(rest, " rest");
/// ```
pub fn parse_operator(input: &str) -> ParserResult<Token> {
    context(
        "operator",
        map(
            alt((
                alt((
                    value(Operator::StrictEqual, tag("===")),
                    value(Operator::StrictNotEqual, tag("!==")),
                )),
                alt((
                    value(Operator::Arrow, tag("=>")),
                    value(Operator::EqualEqual, tag("==")),
                    value(Operator::NotEqual, tag("!=")),
                    value(Operator::GreaterEqual, tag(">=")),
                    value(Operator::LessEqual, tag("<=")),
                    value(Operator::And, tag("&&")),
                    value(Operator::Or, tag("||")),
                    value(Operator::Increment, tag("++")),
                    value(Operator::Decrement, tag("--")),
                    value(Operator::PlusAssign, tag("+=")),
                    value(Operator::MinusAssign, tag("-=")),
                    value(Operator::MultiplyAssign, tag("*=")),
                    value(Operator::DivideAssign, tag("/=")),
                )),
                alt((
                    value(Operator::Dot, tag(".")),
                    value(Operator::Greater, tag(">")),
                    value(Operator::Less, tag("<")),
                    value(Operator::Plus, tag("+")),
                    value(Operator::Minus, tag("-")),
                    value(Operator::Multiply, tag("*")),
                    value(Operator::Divide, tag("/")),
                    value(Operator::Percent, tag("%")),
                    value(Operator::Not, tag("!")),
                    value(Operator::Question, tag("?")),
                    value(Operator::Assign, tag("=")),
                )),
            )),
            Token::Operator,
        ),
    )(input)
}

pub fn parse_delimiter(input: &str) -> ParserResult<Token> {
    context(
        "delimiter",
        map(
            alt((
                value(Delimiter::OpenBrace, tag("{")),
                value(Delimiter::CloseBrace, tag("}")),
                value(Delimiter::OpenParen, tag("(")),
                value(Delimiter::CloseParen, tag(")")),
                value(Delimiter::OpenBracket, tag("[")),
                value(Delimiter::CloseBracket, tag("]")),
                value(Delimiter::Comma, tag(",")),
                value(Delimiter::Semicolon, tag(";")),
                value(Delimiter::Colon, tag(":")),
            )),
            Token::Delimiter,
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators() {
        let test_cases = [
            ("=>", Operator::Arrow),
            ("===", Operator::StrictEqual),
            ("==", Operator::EqualEqual),
            ("!=", Operator::NotEqual),
            ("+=", Operator::PlusAssign),
            ("++", Operator::Increment),
            ("%", Operator::Percent),
            ("?", Operator::Question),
            ("=", Operator::Assign),
        ];

        for (input, expected) in test_cases.iter() {
            let (rest, token) = parse_operator(input).unwrap();
            assert_eq!(token, Token::Operator(*expected));
            assert_eq!(rest, "");
        }
    }

    #[test]
    fn test_longest_match_wins() {
        let (rest, token) = parse_operator(">=1").unwrap();
        assert_eq!(token, Token::Operator(Operator::GreaterEqual));
        assert_eq!(rest, "1");

        let (rest, token) = parse_operator("--x").unwrap();
        assert_eq!(token, Token::Operator(Operator::Decrement));
        assert_eq!(rest, "x");
    }

    #[test]
    fn test_delimiters() {
        for delimiter in [
            Delimiter::OpenBrace,
            Delimiter::CloseBrace,
            Delimiter::OpenParen,
            Delimiter::CloseParen,
            Delimiter::OpenBracket,
            Delimiter::CloseBracket,
            Delimiter::Comma,
            Delimiter::Semicolon,
            Delimiter::Colon,
        ] {
            let (rest, token) = parse_delimiter(delimiter.as_str()).unwrap();
            assert_eq!(token, Token::Delimiter(delimiter));
            assert_eq!(rest, "");
        }
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(Operator::StrictNotEqual.to_string(), "!==");
        assert_eq!(Delimiter::CloseBrace.to_string(), "}");
    }
}
