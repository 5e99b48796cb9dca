use super::super::{core::*, prelude::*};
use crate::tokenizer::{
    keyword::Keyword,
    literal::{Literal, StringPart},
    symbol::{Delimiter, Operator},
    token::Token,
};

// 基本的なパーサー
pub fn parse_identifier() -> impl Parser<Token, String> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Identifier(s) => Some(s.clone()),
            _ => None,
        }),
        "identifier",
    )
}

/// Property names after `.` and dict keys may be reserved words (`obj.new`).
pub fn parse_property_name() -> impl Parser<Token, String> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Identifier(s) => Some(s.clone()),
            Token::Keyword(keyword) => Some(keyword.to_string()),
            _ => None,
        }),
        "property name",
    )
}

/// A string literal without interpolation, as used by `test` names and
/// import sources.
pub fn parse_plain_string() -> impl Parser<Token, String> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Literal(Literal::String(parts)) => plain_text(parts),
            _ => None,
        }),
        "string",
    )
}

pub fn plain_text(parts: &[StringPart]) -> Option<String> {
    let mut text = String::new();
    for part in parts {
        match part {
            StringPart::Literal(s) => text.push_str(s),
            StringPart::Interpolation(_) => return None,
        }
    }
    Some(text)
}

pub fn parse_keyword(keyword: Keyword) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Keyword(keyword)))
}

pub fn parse_operator(operator: Operator) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Operator(operator)))
}

pub fn parse_delimiter(delimiter: Delimiter) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Delimiter(delimiter)))
}

// 区切り文字パーサー
pub fn parse_comma() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Comma)
}

pub fn parse_semicolon() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Semicolon)
}

pub fn parse_colon() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Colon)
}

pub fn parse_open_paren() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::OpenParen)
}

/// `)` with an optional trailing comma before it.
pub fn parse_close_paren() -> impl Parser<Token, ()> {
    as_unit(tuple2(
        optional(parse_comma()),
        parse_delimiter(Delimiter::CloseParen),
    ))
}

pub fn parse_open_bracket() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::OpenBracket)
}

pub fn parse_close_bracket() -> impl Parser<Token, ()> {
    as_unit(tuple2(
        optional(parse_comma()),
        parse_delimiter(Delimiter::CloseBracket),
    ))
}

pub fn parse_open_brace() -> impl Parser<Token, ()> {
    with_context(parse_delimiter(Delimiter::OpenBrace), "open brace")
}

pub fn parse_close_brace() -> impl Parser<Token, ()> {
    as_unit(tuple2(
        optional(parse_comma()),
        parse_delimiter(Delimiter::CloseBrace),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_name_accepts_keywords() {
        let tokens = vec![Token::Keyword(Keyword::New)];
        assert_eq!(
            parse_property_name().parse(&tokens, 0),
            Ok((1, "new".to_string()))
        );
        assert!(parse_identifier().parse(&tokens, 0).is_err());
    }

    #[test]
    fn test_plain_string_rejects_interpolation() {
        let tokens = vec![Token::Literal(Literal::String(vec![
            StringPart::Literal("a".to_string()),
            StringPart::Interpolation("b".to_string()),
        ]))];
        assert!(parse_plain_string().parse(&tokens, 0).is_err());
    }

    #[test]
    fn test_close_paren_accepts_trailing_comma() {
        let tokens = vec![
            Token::Delimiter(Delimiter::Comma),
            Token::Delimiter(Delimiter::CloseParen),
        ];
        assert_eq!(parse_close_paren().parse(&tokens, 0), Ok((2, ())));
    }
}
