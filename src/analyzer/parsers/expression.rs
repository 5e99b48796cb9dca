//! Expression grammar, lowest precedence first:
//!
//! ```text
//! assignment  := ternary (assign_op assignment)?
//! ternary     := or ("?" expression ":" expression)?
//! or          := and ("||" and)*
//! and         := equality ("&&" equality)*
//! equality    := comparison (("==" | "!=" | "===" | "!==") comparison)*
//! comparison  := additive (("<" | ">" | "<=" | ">=") additive)*
//! additive    := multiplicative (("+" | "-") multiplicative)*
//! multiplicative := unary (("*" | "/" | "%") unary)*
//! unary       := ("!" | "-" | "+" | "await" | "++" | "--") unary | postfix
//! postfix     := primary (call | "." name | "[" expression "]" | "++" | "--")*
//! ```

use std::sync::Arc;

use super::super::{core::*, prelude::*};
use super::*;
use crate::ast::{
    Argument, AssignOperator, BinaryOperator, Expression, FunctionBody, FunctionDef,
    InterpolationPart, Literal as AstLiteral, Parameter, UnaryOperator, UpdateOperator,
};
use crate::tokenizer::{
    keyword::Keyword,
    literal::{Literal, StringPart},
    symbol::{Delimiter, Operator},
    token::Token,
};

pub fn parse_expression() -> Box<dyn Parser<Token, Expression>> {
    Box::new(with_context(lazy(parse_assignment), "expression"))
}

fn parse_assignment() -> Box<dyn Parser<Token, Expression>> {
    Box::new(try_map(
        tuple2(
            parse_ternary(),
            optional(tuple2(parse_assign_operator(), lazy(parse_expression))),
        ),
        |(target, assignment)| match assignment {
            None => Ok(target),
            Some((op, value)) if target.is_assignable() => Ok(Expression::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            }),
            Some(_) => Err("Invalid assignment target".to_string()),
        },
    ))
}

fn parse_assign_operator() -> impl Parser<Token, AssignOperator> {
    satisfy(|token: &Token| match token {
        Token::Operator(Operator::Assign) => Some(AssignOperator::Assign),
        Token::Operator(Operator::PlusAssign) => Some(AssignOperator::AddAssign),
        Token::Operator(Operator::MinusAssign) => Some(AssignOperator::SubtractAssign),
        Token::Operator(Operator::MultiplyAssign) => Some(AssignOperator::MultiplyAssign),
        Token::Operator(Operator::DivideAssign) => Some(AssignOperator::DivideAssign),
        _ => None,
    })
}

fn parse_ternary() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            parse_logical_or(),
            optional(tuple4(
                parse_operator(Operator::Question),
                lazy(parse_expression),
                parse_colon(),
                lazy(parse_expression),
            )),
        ),
        |(condition, branches)| match branches {
            None => condition,
            Some((_, consequent, _, alternate)) => Expression::Ternary {
                condition: Box::new(condition),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
        },
    )
}

/// Left-associative chain `operand (operator operand)*`.
fn binary_layer<P, O>(operand: P, operator: O, context: &'static str) -> impl Parser<Token, Expression>
where
    P: Parser<Token, Expression>,
    O: Parser<Token, BinaryOperator>,
{
    let operand = shared(operand);
    with_context(
        map(
            tuple2(operand.clone(), many(tuple2(operator, operand))),
            |(first, rest): (Expression, Vec<(BinaryOperator, Expression)>)| {
                rest.into_iter()
                    .fold(first, |left, (op, right)| Expression::binary(op, left, right))
            },
        ),
        context,
    )
}

fn binary_operator(table: &'static [(Operator, BinaryOperator)]) -> impl Parser<Token, BinaryOperator> {
    satisfy(move |token: &Token| match token {
        Token::Operator(found) => table
            .iter()
            .find(|(operator, _)| operator == found)
            .map(|(_, binary)| *binary),
        _ => None,
    })
}

const OR_OPERATORS: &[(Operator, BinaryOperator)] = &[(Operator::Or, BinaryOperator::Or)];
const AND_OPERATORS: &[(Operator, BinaryOperator)] = &[(Operator::And, BinaryOperator::And)];
const EQUALITY_OPERATORS: &[(Operator, BinaryOperator)] = &[
    (Operator::EqualEqual, BinaryOperator::Equal),
    (Operator::StrictEqual, BinaryOperator::Equal),
    (Operator::NotEqual, BinaryOperator::NotEqual),
    (Operator::StrictNotEqual, BinaryOperator::NotEqual),
];
const COMPARISON_OPERATORS: &[(Operator, BinaryOperator)] = &[
    (Operator::Less, BinaryOperator::LessThan),
    (Operator::Greater, BinaryOperator::GreaterThan),
    (Operator::LessEqual, BinaryOperator::LessThanEqual),
    (Operator::GreaterEqual, BinaryOperator::GreaterThanEqual),
];
const ADDITIVE_OPERATORS: &[(Operator, BinaryOperator)] = &[
    (Operator::Plus, BinaryOperator::Add),
    (Operator::Minus, BinaryOperator::Subtract),
];
const MULTIPLICATIVE_OPERATORS: &[(Operator, BinaryOperator)] = &[
    (Operator::Multiply, BinaryOperator::Multiply),
    (Operator::Divide, BinaryOperator::Divide),
    (Operator::Percent, BinaryOperator::Modulo),
];

fn parse_logical_or() -> impl Parser<Token, Expression> {
    binary_layer(parse_logical_and(), binary_operator(OR_OPERATORS), "logical or")
}

fn parse_logical_and() -> impl Parser<Token, Expression> {
    binary_layer(parse_equality(), binary_operator(AND_OPERATORS), "logical and")
}

fn parse_equality() -> impl Parser<Token, Expression> {
    binary_layer(parse_comparison(), binary_operator(EQUALITY_OPERATORS), "equality")
}

fn parse_comparison() -> impl Parser<Token, Expression> {
    binary_layer(parse_additive(), binary_operator(COMPARISON_OPERATORS), "comparison")
}

fn parse_additive() -> impl Parser<Token, Expression> {
    binary_layer(parse_multiplicative(), binary_operator(ADDITIVE_OPERATORS), "additive")
}

fn parse_multiplicative() -> impl Parser<Token, Expression> {
    binary_layer(
        parse_unary(),
        binary_operator(MULTIPLICATIVE_OPERATORS),
        "multiplicative",
    )
}

fn parse_unary() -> Box<dyn Parser<Token, Expression>> {
    Box::new(with_context(
        choice(vec![
            Box::new(parse_prefix_operation()),
            Box::new(parse_prefix_update()),
            parse_postfix(),
        ]),
        "unary",
    ))
}

enum Prefix {
    Unary(UnaryOperator),
    Await,
}

fn parse_prefix_operation() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            satisfy(|token: &Token| match token {
                Token::Operator(Operator::Not) => Some(Prefix::Unary(UnaryOperator::Not)),
                Token::Operator(Operator::Minus) => Some(Prefix::Unary(UnaryOperator::Negate)),
                Token::Operator(Operator::Plus) => Some(Prefix::Unary(UnaryOperator::Plus)),
                Token::Keyword(Keyword::Await) => Some(Prefix::Await),
                _ => None,
            }),
            lazy(parse_unary),
        ),
        |(prefix, operand)| match prefix {
            Prefix::Unary(op) => Expression::Unary {
                op,
                operand: Box::new(operand),
            },
            Prefix::Await => Expression::Await(Box::new(operand)),
        },
    )
}

fn parse_update_operator() -> impl Parser<Token, UpdateOperator> {
    satisfy(|token: &Token| match token {
        Token::Operator(Operator::Increment) => Some(UpdateOperator::Increment),
        Token::Operator(Operator::Decrement) => Some(UpdateOperator::Decrement),
        _ => None,
    })
}

fn parse_prefix_update() -> impl Parser<Token, Expression> {
    try_map(
        tuple2(parse_update_operator(), lazy(parse_unary)),
        |(op, target)| {
            if target.is_assignable() {
                Ok(Expression::Update {
                    op,
                    prefix: true,
                    target: Box::new(target),
                })
            } else {
                Err("Invalid update target".to_string())
            }
        },
    )
}

enum Postfix {
    Call(Vec<Argument>),
    Member(String),
    Index(Expression),
    Update(UpdateOperator),
}

pub fn parse_postfix() -> Box<dyn Parser<Token, Expression>> {
    Box::new(try_map(
        tuple2(parse_primary(), many(parse_postfix_operator())),
        |(base, operations)| {
            operations
                .into_iter()
                .try_fold(base, |expression, operation| match operation {
                    Postfix::Call(arguments) => Ok(Expression::Call {
                        callee: Box::new(expression),
                        arguments,
                    }),
                    Postfix::Member(property) => Ok(Expression::Member {
                        object: Box::new(expression),
                        property,
                    }),
                    Postfix::Index(index) => Ok(Expression::Index {
                        object: Box::new(expression),
                        index: Box::new(index),
                    }),
                    Postfix::Update(op) if expression.is_assignable() => Ok(Expression::Update {
                        op,
                        prefix: false,
                        target: Box::new(expression),
                    }),
                    Postfix::Update(_) => Err("Invalid update target".to_string()),
                })
        },
    ))
}

fn parse_postfix_operator() -> impl Parser<Token, Postfix> {
    choice(vec![
        Box::new(map(parse_arguments(), Postfix::Call)),
        Box::new(map(
            preceded(parse_operator(Operator::Dot), parse_property_name()),
            Postfix::Member,
        )),
        Box::new(map(
            delimited(
                parse_open_bracket(),
                lazy(parse_expression),
                parse_close_bracket(),
            ),
            Postfix::Index,
        )),
        Box::new(map(parse_update_operator(), Postfix::Update)),
    ])
}

pub fn parse_arguments() -> impl Parser<Token, Vec<Argument>> {
    with_context(
        delimited(
            parse_open_paren(),
            separated_list(parse_argument(), parse_comma()),
            parse_close_paren(),
        ),
        "arguments",
    )
}

fn parse_argument() -> impl Parser<Token, Argument> {
    choice(vec![
        Box::new(map(
            tuple3(parse_identifier(), parse_colon(), lazy(parse_expression)),
            |(name, _, value)| Argument::Named { name, value },
        )),
        Box::new(map(lazy(parse_expression), Argument::Positional)),
    ])
}

fn parse_primary() -> impl Parser<Token, Expression> {
    with_context(
        choice(vec![
            Box::new(parse_literal()),
            Box::new(parse_string()),
            Box::new(parse_arrow_function()),
            Box::new(parse_function_expression()),
            Box::new(parse_new()),
            Box::new(map(parse_identifier(), Expression::Identifier)),
            Box::new(parse_array()),
            Box::new(parse_dict()),
            Box::new(parse_parenthesized()),
        ]),
        "primary expression",
    )
}

fn parse_literal() -> impl Parser<Token, Expression> {
    satisfy(|token: &Token| match token {
        Token::Literal(Literal::Number(n)) => Some(Expression::Literal(AstLiteral::Number(*n))),
        Token::Keyword(Keyword::True) => Some(Expression::Literal(AstLiteral::Boolean(true))),
        Token::Keyword(Keyword::False) => Some(Expression::Literal(AstLiteral::Boolean(false))),
        Token::Keyword(Keyword::Null) | Token::Keyword(Keyword::Undefined) => {
            Some(Expression::Literal(AstLiteral::Null))
        }
        _ => None,
    })
}

/// String literals; interpolated parts are parsed as expressions here.
fn parse_string() -> impl Parser<Token, Expression> {
    try_map(
        satisfy(|token: &Token| match token {
            Token::Literal(Literal::String(parts)) => Some(parts.clone()),
            _ => None,
        }),
        |parts: Vec<StringPart>| {
            if let Some(text) = plain_text(&parts) {
                return Ok(Expression::Literal(AstLiteral::String(text)));
            }
            let parts = parts
                .into_iter()
                .map(|part| match part {
                    StringPart::Literal(text) => Ok(InterpolationPart::Literal(text)),
                    StringPart::Interpolation(source) => parse_expression_source(&source)
                        .map(InterpolationPart::Expression)
                        .map_err(|e| format!("Invalid interpolation '${{{}}}': {}", source, e)),
                })
                .collect::<Result<Vec<_>, String>>()?;
            Ok(Expression::Interpolation(parts))
        },
    )
}

fn parse_parameter() -> impl Parser<Token, Parameter> {
    map(
        tuple2(
            parse_identifier(),
            optional(preceded(
                parse_operator(Operator::Assign),
                lazy(parse_expression),
            )),
        ),
        |(name, default)| Parameter { name, default },
    )
}

pub fn parse_parameters() -> impl Parser<Token, Vec<Parameter>> {
    with_context(
        delimited(
            parse_open_paren(),
            separated_list(parse_parameter(), parse_comma()),
            parse_close_paren(),
        ),
        "parameters",
    )
}

fn parse_arrow_body() -> impl Parser<Token, FunctionBody> {
    choice(vec![
        Box::new(map(
            lazy(statement::parse_block_statements),
            FunctionBody::Block,
        )),
        Box::new(map(lazy(parse_expression), |expression| {
            FunctionBody::Expression(Box::new(expression))
        })),
    ])
}

/// `x => ...`, `(a, b = 1) => ...`, optionally prefixed with `async`.
fn parse_arrow_function() -> impl Parser<Token, Expression> {
    map(
        tuple4(
            optional(parse_keyword(Keyword::Async)),
            choice(vec![
                Box::new(map(parse_identifier(), |name| vec![Parameter::new(name)])),
                Box::new(parse_parameters()),
            ]),
            parse_operator(Operator::Arrow),
            parse_arrow_body(),
        ),
        |(is_async, params, _, body)| {
            Expression::Lambda(Arc::new(FunctionDef {
                name: None,
                params,
                body,
                is_async: is_async.is_some(),
            }))
        },
    )
}

/// `function [name](params) { ... }` used as a value.
fn parse_function_expression() -> impl Parser<Token, Expression> {
    map(
        tuple4(
            optional(parse_keyword(Keyword::Async)),
            preceded(parse_keyword(Keyword::Function), optional(parse_identifier())),
            parse_parameters(),
            lazy(statement::parse_block_statements),
        ),
        |(is_async, name, params, body)| {
            Expression::Lambda(Arc::new(FunctionDef {
                name,
                params,
                body: FunctionBody::Block(body),
                is_async: is_async.is_some(),
            }))
        },
    )
}

/// `new Name(args)` is an ordinary call of the class value.
fn parse_new() -> impl Parser<Token, Expression> {
    map(
        preceded(parse_keyword(Keyword::New), lazy(parse_postfix)),
        |expression| match expression {
            call @ Expression::Call { .. } => call,
            callee => Expression::Call {
                callee: Box::new(callee),
                arguments: vec![],
            },
        },
    )
}

fn parse_array() -> impl Parser<Token, Expression> {
    with_context(
        map(
            delimited(
                parse_open_bracket(),
                separated_list(lazy(parse_expression), parse_comma()),
                parse_close_bracket(),
            ),
            Expression::Array,
        ),
        "array",
    )
}

fn parse_dict_key() -> impl Parser<Token, String> {
    choice(vec![
        Box::new(parse_property_name()),
        Box::new(parse_plain_string()),
        Box::new(satisfy(|token: &Token| match token {
            Token::Literal(Literal::Number(n)) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            Token::Literal(Literal::Number(n)) => Some(n.to_string()),
            _ => None,
        })),
    ])
}

fn parse_dict_entry() -> impl Parser<Token, (String, Expression)> {
    choice(vec![
        // key: value
        Box::new(map(
            tuple3(parse_dict_key(), parse_colon(), lazy(parse_expression)),
            |(key, _, value)| (key, value),
        )),
        // method shorthand: name(params) { ... }
        Box::new(map(
            tuple3(
                parse_property_name(),
                parse_parameters(),
                lazy(statement::parse_block_statements),
            ),
            |(name, params, body)| {
                let def = FunctionDef {
                    name: Some(name.clone()),
                    params,
                    body: FunctionBody::Block(body),
                    is_async: false,
                };
                (name, Expression::Lambda(Arc::new(def)))
            },
        )),
        // shorthand: { name }
        Box::new(map(parse_identifier(), |name| {
            (name.clone(), Expression::Identifier(name))
        })),
    ])
}

fn parse_dict() -> impl Parser<Token, Expression> {
    with_context(
        map(
            delimited(
                parse_open_brace(),
                separated_list(parse_dict_entry(), parse_comma()),
                parse_close_brace(),
            ),
            Expression::Dict,
        ),
        "dict",
    )
}

fn parse_parenthesized() -> impl Parser<Token, Expression> {
    delimited(
        parse_open_paren(),
        lazy(parse_expression),
        parse_delimiter(Delimiter::CloseParen),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::TokenPreprocessor;
    use crate::tokenizer::token::Tokenizer;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Expression {
        let spans = Tokenizer::new().tokenize(source).unwrap();
        let (tokens, _) = TokenPreprocessor::default().split(spans);
        let (pos, expression) = parse_expression().parse(&tokens, 0).unwrap();
        assert_eq!(pos, tokens.len(), "unconsumed tokens in {:?}", source);
        expression
    }

    fn id(name: &str) -> Expression {
        Expression::identifier(name)
    }

    fn num(n: f64) -> Expression {
        Expression::number(n)
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse("1 + 2 * 3"),
            Expression::binary(
                BinaryOperator::Add,
                num(1.0),
                Expression::binary(BinaryOperator::Multiply, num(2.0), num(3.0)),
            )
        );
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(
            parse("10 - 4 - 3"),
            Expression::binary(
                BinaryOperator::Subtract,
                Expression::binary(BinaryOperator::Subtract, num(10.0), num(4.0)),
                num(3.0),
            )
        );
    }

    #[test]
    fn test_logical_and_equality() {
        assert_eq!(
            parse("a === 1 || b && !c"),
            Expression::binary(
                BinaryOperator::Or,
                Expression::binary(BinaryOperator::Equal, id("a"), num(1.0)),
                Expression::binary(
                    BinaryOperator::And,
                    id("b"),
                    Expression::Unary {
                        op: UnaryOperator::Not,
                        operand: Box::new(id("c")),
                    },
                ),
            )
        );
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(
            parse("a = b += 2"),
            Expression::Assign {
                op: AssignOperator::Assign,
                target: Box::new(id("a")),
                value: Box::new(Expression::Assign {
                    op: AssignOperator::AddAssign,
                    target: Box::new(id("b")),
                    value: Box::new(num(2.0)),
                }),
            }
        );
    }

    #[test]
    fn test_invalid_assignment_target() {
        let spans = Tokenizer::new().tokenize("1 = 2").unwrap();
        let (tokens, _) = TokenPreprocessor::default().split(spans);
        let error = parse_expression().parse(&tokens, 0).unwrap_err();
        assert!(matches!(error, ParseError::Failure { ref message, .. } if message == "Invalid assignment target"));
    }

    #[test]
    fn test_postfix_chain() {
        assert_eq!(
            parse("bash.run(\"ls\")[0]"),
            Expression::Index {
                object: Box::new(Expression::Call {
                    callee: Box::new(Expression::Member {
                        object: Box::new(id("bash")),
                        property: "run".to_string(),
                    }),
                    arguments: vec![Argument::Positional(Expression::string("ls"))],
                }),
                index: Box::new(num(0.0)),
            }
        );
    }

    #[test]
    fn test_named_arguments() {
        assert_eq!(
            parse("f(1, b: 2)"),
            Expression::Call {
                callee: Box::new(id("f")),
                arguments: vec![
                    Argument::Positional(num(1.0)),
                    Argument::Named {
                        name: "b".to_string(),
                        value: num(2.0),
                    },
                ],
            }
        );
    }

    #[test]
    fn test_ternary_with_member_condition() {
        let Expression::Ternary { condition, .. } = parse("a.ok ? 1 : 2") else {
            panic!("expected ternary");
        };
        assert_eq!(condition.kind(), "Member");
    }

    #[test]
    fn test_arrow_functions() {
        let Expression::Lambda(def) = parse("x => x * 2") else {
            panic!("expected lambda");
        };
        assert_eq!(def.params, vec![Parameter::new("x")]);
        assert!(matches!(def.body, FunctionBody::Expression(_)));

        let Expression::Lambda(def) = parse("async (a, b = 1) => { return a + b }") else {
            panic!("expected lambda");
        };
        assert!(def.is_async);
        assert_eq!(def.params.len(), 2);
        assert_eq!(def.params[1].default, Some(num(1.0)));
        assert!(matches!(def.body, FunctionBody::Block(ref body) if body.len() == 1));
    }

    #[test]
    fn test_parenthesized_is_not_lambda() {
        assert_eq!(
            parse("(a + 1) * 2"),
            Expression::binary(
                BinaryOperator::Multiply,
                Expression::binary(BinaryOperator::Add, id("a"), num(1.0)),
                num(2.0),
            )
        );
    }

    #[test]
    fn test_dict_forms() {
        assert_eq!(
            parse("{ name: 1, \"quoted key\": 2, short, new: 3 }"),
            Expression::Dict(vec![
                ("name".to_string(), num(1.0)),
                ("quoted key".to_string(), num(2.0)),
                ("short".to_string(), id("short")),
                ("new".to_string(), num(3.0)),
            ])
        );
    }

    #[test]
    fn test_array_with_trailing_comma() {
        assert_eq!(
            parse("[1, 2,]"),
            Expression::Array(vec![num(1.0), num(2.0)])
        );
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(
            parse("`n = ${n + 1}`"),
            Expression::Interpolation(vec![
                InterpolationPart::Literal("n = ".to_string()),
                InterpolationPart::Expression(Expression::binary(
                    BinaryOperator::Add,
                    id("n"),
                    num(1.0)
                )),
            ])
        );
    }

    #[test]
    fn test_new_is_a_call() {
        assert_eq!(
            parse("new Counter(5)"),
            Expression::Call {
                callee: Box::new(id("Counter")),
                arguments: vec![Argument::Positional(num(5.0))],
            }
        );
    }

    #[test]
    fn test_updates() {
        assert!(matches!(
            parse("i++"),
            Expression::Update { prefix: false, op: UpdateOperator::Increment, .. }
        ));
        assert!(matches!(
            parse("--items[0]"),
            Expression::Update { prefix: true, op: UpdateOperator::Decrement, .. }
        ));
    }

    #[test]
    fn test_await_is_unary() {
        assert_eq!(
            parse("await fetch()"),
            Expression::Await(Box::new(Expression::Call {
                callee: Box::new(id("fetch")),
                arguments: vec![],
            }))
        );
    }
}
