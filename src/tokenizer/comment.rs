use nom::{
    branch::alt,
    bytes::complete::{tag, take_until},
    character::complete::not_line_ending,
    combinator::map,
    error::context,
    sequence::{delimited, preceded},
};

use super::token::{CommentType, ParserResult, Token};

pub fn parse_line_comment(input: &str) -> ParserResult<Token> {
    context(
        "line comment",
        map(preceded(tag("//"), not_line_ending), |content: &str| {
            Token::Comment {
                content: content.trim().to_string(),
                comment_type: CommentType::Line,
            }
        }),
    )(input)
}

pub fn parse_block_comment(input: &str) -> ParserResult<Token> {
    context(
        "block comment",
        map(
            delimited(tag("/*"), take_until("*/"), tag("*/")),
            |content: &str| Token::Comment {
                content: content.to_string(),
                comment_type: CommentType::Block,
            },
        ),
    )(input)
}

/// `#!` interpreter line; only valid as the very first token of a script.
pub fn parse_shebang(input: &str) -> ParserResult<Token> {
    context(
        "shebang",
        map(preceded(tag("#!"), not_line_ending), |content: &str| {
            Token::Comment {
                content: content.trim().to_string(),
                comment_type: CommentType::Shebang,
            }
        }),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_comment(input: &str) -> ParserResult<Token> {
    context("comment", alt((parse_block_comment, parse_line_comment)))(input)
}
