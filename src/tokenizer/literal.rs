use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1, take_while_m_n},
    character::complete::{anychar, char, digit1, one_of},
    combinator::{map, map_opt, map_res, opt, recognize, value},
    error::{context, ErrorKind, ParseError as _, VerboseError},
    multi::many0,
    sequence::{pair, preceded, tuple},
};

use super::token::{ParserResult, Token};

/// A piece of a string literal. Interpolations keep their raw source text; the
/// parser tokenizes and parses them again as expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Literal(String),
    Interpolation(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(Vec<StringPart>),
    Number(f64),
}

/// Scans `${ ... }` up to the matching close brace, skipping over nested
/// braces and quoted strings inside the expression.
fn parse_interpolation(input: &str) -> ParserResult<StringPart> {
    let (body, _) = tag::<_, _, VerboseError<&str>>("${")(input)?;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '{' => depth += 1,
            '}' if depth == 0 => {
                let expression = body[..offset].trim().to_string();
                return Ok((
                    &body[offset + 1..],
                    StringPart::Interpolation(expression),
                ));
            }
            '}' => depth -= 1,
            _ => {}
        }
    }

    Err(nom::Err::Failure(VerboseError::from_error_kind(
        input,
        ErrorKind::TakeUntil,
    )))
}

fn parse_unicode_escape(input: &str) -> ParserResult<char> {
    map_opt(
        map_res(
            preceded(
                char('u'),
                take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit()),
            ),
            |hex: &str| u32::from_str_radix(hex, 16),
        ),
        std::char::from_u32,
    )(input)
}

fn parse_escape(input: &str) -> ParserResult<char> {
    preceded(
        char('\\'),
        alt((
            parse_unicode_escape,
            value('\n', char('n')),
            value('\t', char('t')),
            value('\r', char('r')),
            value('\0', char('0')),
            // any other escaped character stands for itself: \\ \" \' \` \$
            anychar,
        )),
    )(input)
}

fn parse_string_body(quote: char) -> impl FnMut(&str) -> ParserResult<Vec<StringPart>> {
    move |input: &str| {
        let (input, pieces) = many0(alt((
            parse_interpolation,
            map(parse_escape, |c| StringPart::Literal(c.to_string())),
            map(
                take_while1(move |c: char| c != quote && c != '\\' && c != '$'),
                |text: &str| StringPart::Literal(text.to_string()),
            ),
            // a `$` that does not open an interpolation is plain text
            map(char('$'), |_| StringPart::Literal("$".to_string())),
        )))(input)?;
        Ok((input, merge_literal_parts(pieces)))
    }
}

fn merge_literal_parts(pieces: Vec<StringPart>) -> Vec<StringPart> {
    let mut parts: Vec<StringPart> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        if let StringPart::Literal(text) = &piece {
            if let Some(StringPart::Literal(current)) = parts.last_mut() {
                current.push_str(text);
                continue;
            }
        }
        parts.push(piece);
    }
    parts
}

fn parse_quoted(quote: char) -> impl FnMut(&str) -> ParserResult<Literal> {
    move |input: &str| {
        let (input, _) = char::<_, VerboseError<&str>>(quote)(input)?;
        let (input, parts) = parse_string_body(quote)(input)?;
        let closing = char::<_, VerboseError<&str>>(quote);
        let (input, _) = context("unterminated string", closing)(input).map_err(|e| match e {
            nom::Err::Error(e) => nom::Err::Failure(e),
            other => other,
        })?;
        Ok((input, Literal::String(parts)))
    }
}

pub fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    context(
        "string literal",
        alt((parse_quoted('"'), parse_quoted('\''), parse_quoted('`'))),
    )(input)
}

pub fn parse_number_literal(input: &str) -> ParserResult<Literal> {
    context(
        "number literal",
        map_res(
            recognize(tuple((
                digit1,
                opt(pair(char('.'), digit1)),
                opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
            ))),
            |text: &str| text.parse::<f64>().map(Literal::Number),
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_literal(input: &str) -> ParserResult<Token> {
    context(
        "literal",
        map(
            alt((parse_string_literal, parse_number_literal)),
            Token::Literal,
        ),
    )(input)
}
