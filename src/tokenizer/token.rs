use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    combinator::recognize,
    error::{context, VerboseError},
    sequence::pair,
    IResult,
};
use thiserror::Error;

use super::{
    comment::{parse_comment, parse_shebang},
    keyword::Keyword,
    literal::{parse_literal, Literal, StringPart},
    symbol::{parse_delimiter, parse_operator, Delimiter, Operator},
    whitespace::{parse_newline, parse_whitespace},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    Identifier(String),
    Operator(Operator),
    Delimiter(Delimiter),
    Literal(Literal),
    // Formatting
    Whitespace(String),
    Newline,
    Comment {
        content: String,
        comment_type: CommentType,
    },
}

impl Token {
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            Token::Whitespace(_) | Token::Newline | Token::Comment { .. }
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Keyword(keyword) => write!(f, "{}", keyword),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Operator(operator) => write!(f, "{}", operator),
            Token::Delimiter(delimiter) => write!(f, "{}", delimiter),
            Token::Literal(Literal::Number(n)) => write!(f, "{}", n),
            Token::Literal(Literal::String(parts)) => {
                write!(f, "\"")?;
                for part in parts {
                    match part {
                        StringPart::Literal(text) => write!(f, "{}", text)?,
                        StringPart::Interpolation(source) => write!(f, "${{{}}}", source)?,
                    }
                }
                write!(f, "\"")
            }
            Token::Whitespace(ws) => write!(f, "{}", ws),
            Token::Newline => writeln!(f),
            Token::Comment { content, .. } => write!(f, "/*{}*/", content),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentType {
    Line,    // //
    Block,   // /* */
    Shebang, // #!
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    current_position: usize,
    current_line: usize,
    current_column: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            current_position: 0,
            current_line: 1,   // 1-based
            current_column: 1, // 1-based
        }
    }

    #[tracing::instrument(level = "debug", skip(self, input))]
    pub fn tokenize(&mut self, input: &str) -> TokenizerResult<Vec<TokenSpan>> {
        let mut tokens = Vec::new();
        let mut remaining = input;

        if let Ok((rest, token)) = parse_shebang(remaining) {
            remaining = self.push_token(&mut tokens, token, remaining, rest);
        }

        while !remaining.is_empty() {
            let result = alt((
                // Formatting
                parse_whitespace,
                parse_newline,
                parse_comment,
                // Code elements
                parse_literal,
                parse_identifier,
                parse_operator,
                parse_delimiter,
            ))(remaining);

            match result {
                Ok((rest, token)) => {
                    remaining = self.push_token(&mut tokens, token, remaining, rest);
                }
                Err(e) => {
                    let found = remaining.chars().take(20).collect::<String>();
                    let span = Span {
                        start: self.current_position,
                        end: self.current_position + 1,
                        line: self.current_line,
                        column: self.current_column,
                    };
                    let message = match e {
                        nom::Err::Incomplete(needed) => format!("Incomplete input, {:?}", needed),
                        nom::Err::Error(e) | nom::Err::Failure(e) => e
                            .errors
                            .iter()
                            .rev()
                            .find_map(|(_, kind)| match kind {
                                nom::error::VerboseErrorKind::Context(ctx) => {
                                    Some(ctx.to_string())
                                }
                                _ => None,
                            })
                            .unwrap_or_else(|| "unrecognized input".to_string()),
                    };
                    let error = TokenizerError::ParseError {
                        message,
                        found,
                        span,
                    };
                    tracing::debug!("{}", error);
                    return Err(error);
                }
            }
        }

        Ok(tokens)
    }

    fn push_token<'a>(
        &mut self,
        tokens: &mut Vec<TokenSpan>,
        token: Token,
        before: &'a str,
        after: &'a str,
    ) -> &'a str {
        let start = self.current_position;
        let line = self.current_line;
        let column = self.current_column;
        self.update_position(&before[..before.len() - after.len()]);
        tokens.push(TokenSpan {
            token,
            start,
            end: self.current_position,
            line,
            column,
        });
        after
    }

    fn update_position(&mut self, text: &str) {
        for c in text.chars() {
            self.current_position += c.len_utf8();
            if c == '\n' {
                self.current_line += 1;
                self.current_column = 1;
            } else {
                self.current_column += 1;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    pub token: Token,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

fn parse_identifier(input: &str) -> ParserResult<Token> {
    let (input, id) = context(
        "identifier",
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_' || c == '$'),
            take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
        )),
    )(input)?;

    if let Ok(keyword) = Keyword::try_from(id) {
        return Ok((input, Token::Keyword(keyword)));
    }

    Ok((input, Token::Identifier(id.to_string())))
}

pub type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub type TokenizerResult<T> = Result<T, TokenizerError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenizerError {
    #[error("{message}: unexpected '{found}' at {span}")]
    ParseError {
        message: String,
        found: String,
        span: Span,
    },
}
