use std::sync::Arc;

use super::super::{core::*, prelude::*};
use super::expression::{parse_expression, parse_parameters};
use super::*;
use crate::ast::{
    CatchClause, ClassDef, ClassField, DeclarationKind, Expression, FunctionBody, FunctionDef,
    Statement, Statements,
};
use crate::tokenizer::{
    keyword::Keyword,
    symbol::{Delimiter, Operator},
    token::Token,
};

pub fn parse_statements() -> Box<dyn Parser<Token, Statements>> {
    Box::new(many(parse_statement()))
}

/// One statement and any semicolons that follow it.
pub fn parse_statement() -> Box<dyn Parser<Token, Statement>> {
    Box::new(map(
        tuple2(
            choice(vec![
                Box::new(parse_block()),
                Box::new(parse_var_declaration()),
                Box::new(parse_function_declaration()),
                Box::new(parse_class_declaration()),
                Box::new(parse_test_declaration()),
                Box::new(parse_if()),
                Box::new(parse_while()),
                Box::new(parse_for_in()),
                Box::new(parse_for_c_style()),
                Box::new(parse_return()),
                Box::new(parse_break()),
                Box::new(parse_continue()),
                Box::new(parse_try()),
                Box::new(parse_throw()),
                Box::new(parse_import()),
                Box::new(parse_export()),
                Box::new(parse_assert()),
                Box::new(parse_expression_statement()),
                Box::new(parse_empty()),
            ]),
            many(parse_semicolon()),
        ),
        |(statement, _)| statement,
    ))
}

pub fn parse_block_statements() -> Box<dyn Parser<Token, Statements>> {
    Box::new(with_context(
        delimited(
            parse_open_brace(),
            lazy(parse_statements),
            parse_delimiter(Delimiter::CloseBrace),
        ),
        "block",
    ))
}

fn parse_block() -> impl Parser<Token, Statement> {
    map(parse_block_statements(), Statement::Block)
}

fn parse_empty() -> impl Parser<Token, Statement> {
    map(parse_semicolon(), |_| Statement::Block(vec![]))
}

fn parse_expression_statement() -> impl Parser<Token, Statement> {
    map(parse_expression(), Statement::Expression)
}

fn parse_declaration_kind() -> impl Parser<Token, DeclarationKind> {
    satisfy(|token: &Token| match token {
        Token::Keyword(Keyword::Let) => Some(DeclarationKind::Let),
        Token::Keyword(Keyword::Const) => Some(DeclarationKind::Const),
        Token::Keyword(Keyword::Var) => Some(DeclarationKind::Var),
        _ => None,
    })
}

fn parse_var_declaration() -> impl Parser<Token, Statement> {
    with_context(
        map(
            tuple3(
                parse_declaration_kind(),
                parse_identifier(),
                optional(preceded(
                    parse_operator(Operator::Assign),
                    parse_expression(),
                )),
            ),
            |(kind, name, initializer)| Statement::VarDeclaration {
                kind,
                name,
                initializer,
            },
        ),
        "variable declaration",
    )
}

fn parse_function_declaration() -> impl Parser<Token, Statement> {
    with_context(
        map(
            tuple4(
                optional(parse_keyword(Keyword::Async)),
                preceded(parse_keyword(Keyword::Function), parse_identifier()),
                parse_parameters(),
                parse_block_statements(),
            ),
            |(is_async, name, params, body)| {
                Statement::FunctionDeclaration(Arc::new(FunctionDef {
                    name: Some(name),
                    params,
                    body: FunctionBody::Block(body),
                    is_async: is_async.is_some(),
                }))
            },
        ),
        "function declaration",
    )
}

enum ClassMember {
    Field(ClassField),
    Method(Arc<FunctionDef>),
}

fn parse_class_method() -> impl Parser<Token, ClassMember> {
    map(
        tuple4(
            optional(parse_keyword(Keyword::Async)),
            preceded(
                as_unit(optional(parse_keyword(Keyword::Function))),
                parse_property_name(),
            ),
            parse_parameters(),
            parse_block_statements(),
        ),
        |(is_async, name, params, body)| {
            ClassMember::Method(Arc::new(FunctionDef {
                name: Some(name),
                params,
                body: FunctionBody::Block(body),
                is_async: is_async.is_some(),
            }))
        },
    )
}

fn parse_class_field() -> impl Parser<Token, ClassMember> {
    map(
        tuple2(
            parse_identifier(),
            optional(preceded(
                parse_operator(Operator::Assign),
                parse_expression(),
            )),
        ),
        |(name, initializer)| ClassMember::Field(ClassField { name, initializer }),
    )
}

fn parse_class_declaration() -> impl Parser<Token, Statement> {
    with_context(
        map(
            tuple3(
                preceded(parse_keyword(Keyword::Class), parse_identifier()),
                parse_open_brace(),
                tuple2(
                    many(map(
                        tuple2(
                            choice(vec![
                                Box::new(parse_class_method()),
                                Box::new(parse_class_field()),
                            ]),
                            many(parse_semicolon()),
                        ),
                        |(member, _)| member,
                    )),
                    parse_delimiter(Delimiter::CloseBrace),
                ),
            ),
            |(name, _, (members, _))| {
                let mut fields = Vec::new();
                let mut methods = Vec::new();
                for member in members {
                    match member {
                        ClassMember::Field(field) => fields.push(field),
                        ClassMember::Method(method) => methods.push(method),
                    }
                }
                Statement::ClassDeclaration(Arc::new(ClassDef {
                    name,
                    fields,
                    methods,
                }))
            },
        ),
        "class declaration",
    )
}

fn parse_test_declaration() -> impl Parser<Token, Statement> {
    with_context(
        map(
            tuple3(
                parse_keyword(Keyword::Test),
                parse_plain_string(),
                parse_block_statements(),
            ),
            |(_, name, body)| Statement::TestDeclaration { name, body },
        ),
        "test declaration",
    )
}

fn parse_parenthesized_condition() -> impl Parser<Token, Expression> {
    delimited(
        parse_open_paren(),
        parse_expression(),
        parse_delimiter(Delimiter::CloseParen),
    )
}

fn parse_if() -> impl Parser<Token, Statement> {
    with_context(
        map(
            tuple3(
                preceded(parse_keyword(Keyword::If), parse_parenthesized_condition()),
                lazy(parse_statement),
                optional(preceded(
                    parse_keyword(Keyword::Else),
                    lazy(parse_statement),
                )),
            ),
            |(condition, then_branch, else_branch)| Statement::If {
                condition,
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            },
        ),
        "if statement",
    )
}

fn parse_while() -> impl Parser<Token, Statement> {
    with_context(
        map(
            tuple2(
                preceded(
                    parse_keyword(Keyword::While),
                    parse_parenthesized_condition(),
                ),
                lazy(parse_statement),
            ),
            |(condition, body)| Statement::While {
                condition,
                body: Box::new(body),
            },
        ),
        "while statement",
    )
}

/// `for ([let] item in|of expr) body`
fn parse_for_in() -> impl Parser<Token, Statement> {
    with_context(
        map(
            tuple4(
                preceded(parse_keyword(Keyword::For), parse_open_paren()),
                preceded(
                    as_unit(optional(parse_declaration_kind())),
                    parse_identifier(),
                ),
                delimited(
                    choice(vec![
                        Box::new(parse_keyword(Keyword::In)),
                        Box::new(parse_keyword(Keyword::Of)),
                    ]),
                    parse_expression(),
                    parse_delimiter(Delimiter::CloseParen),
                ),
                lazy(parse_statement),
            ),
            |(_, variable, iterable, body)| Statement::For {
                variable,
                iterable,
                body: Box::new(body),
            },
        ),
        "for statement",
    )
}

/// `for (init; test; update) body`, every clause optional.
fn parse_for_c_style() -> impl Parser<Token, Statement> {
    with_context(
        map(
            tuple4(
                preceded(parse_keyword(Keyword::For), parse_open_paren()),
                tuple2(
                    optional(choice(vec![
                        Box::new(parse_var_declaration()),
                        Box::new(parse_expression_statement()),
                    ])),
                    parse_semicolon(),
                ),
                tuple3(
                    optional(parse_expression()),
                    parse_semicolon(),
                    optional(parse_expression()),
                ),
                preceded(
                    parse_delimiter(Delimiter::CloseParen),
                    lazy(parse_statement),
                ),
            ),
            |(_, (init, _), (test, _, update), body)| Statement::ForCStyle {
                init: init.map(Box::new),
                test,
                update,
                body: Box::new(body),
            },
        ),
        "for statement",
    )
}

fn parse_return() -> impl Parser<Token, Statement> {
    map(
        preceded(parse_keyword(Keyword::Return), optional(parse_expression())),
        Statement::Return,
    )
}

fn parse_break() -> impl Parser<Token, Statement> {
    map(parse_keyword(Keyword::Break), |_| Statement::Break)
}

fn parse_continue() -> impl Parser<Token, Statement> {
    map(parse_keyword(Keyword::Continue), |_| Statement::Continue)
}

fn parse_catch_clause() -> impl Parser<Token, CatchClause> {
    map(
        preceded(
            parse_keyword(Keyword::Catch),
            tuple2(
                optional(delimited(
                    parse_open_paren(),
                    parse_identifier(),
                    parse_delimiter(Delimiter::CloseParen),
                )),
                parse_block_statements(),
            ),
        ),
        |(param, body)| CatchClause { param, body },
    )
}

fn parse_try() -> impl Parser<Token, Statement> {
    with_context(
        try_map(
            tuple3(
                preceded(parse_keyword(Keyword::Try), parse_block_statements()),
                many(parse_catch_clause()),
                optional(preceded(
                    parse_keyword(Keyword::Finally),
                    parse_block_statements(),
                )),
            ),
            |(block, handlers, finalizer)| {
                if handlers.is_empty() && finalizer.is_none() {
                    return Err("Missing catch or finally after try block".to_string());
                }
                Ok(Statement::Try {
                    block,
                    handlers,
                    finalizer,
                })
            },
        ),
        "try statement",
    )
}

fn parse_throw() -> impl Parser<Token, Statement> {
    map(
        preceded(parse_keyword(Keyword::Throw), parse_expression()),
        Statement::Throw,
    )
}

fn parse_import() -> impl Parser<Token, Statement> {
    with_context(
        map(
            tuple3(
                preceded(
                    parse_keyword(Keyword::Import),
                    choice(vec![
                        Box::new(delimited(
                            parse_open_brace(),
                            separated_list(parse_identifier(), parse_comma()),
                            parse_close_brace(),
                        )),
                        Box::new(map(parse_identifier(), |name| vec![name])),
                    ]),
                ),
                parse_keyword(Keyword::From),
                parse_plain_string(),
            ),
            |(names, _, source)| Statement::Import { names, source },
        ),
        "import statement",
    )
}

fn parse_export() -> impl Parser<Token, Statement> {
    map(
        preceded(parse_keyword(Keyword::Export), lazy(parse_statement)),
        |statement| Statement::Export(Box::new(statement)),
    )
}

/// `assert cond, "message"` or `assert(cond, "message")`.
fn parse_assert() -> impl Parser<Token, Statement> {
    let assertion = |(condition, message): (Expression, Option<Expression>)| {
        Statement::Assert { condition, message }
    };
    with_context(
        preceded(
            parse_keyword(Keyword::Assert),
            choice(vec![
                Box::new(map(
                    tuple2(
                        parse_expression(),
                        optional(preceded(parse_comma(), parse_expression())),
                    ),
                    assertion,
                )),
                Box::new(map(
                    delimited(
                        parse_open_paren(),
                        tuple2(
                            parse_expression(),
                            optional(preceded(parse_comma(), parse_expression())),
                        ),
                        parse_close_paren(),
                    ),
                    assertion,
                )),
            ]),
        ),
        "assert statement",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parsers::parse_program;
    use crate::ast::BinaryOperator;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Statements {
        parse_program(source).unwrap().statements
    }

    #[test]
    fn test_var_declarations() {
        assert_eq!(
            parse("let a = 1; const b\nvar c = a"),
            vec![
                Statement::VarDeclaration {
                    kind: DeclarationKind::Let,
                    name: "a".to_string(),
                    initializer: Some(Expression::number(1.0)),
                },
                Statement::VarDeclaration {
                    kind: DeclarationKind::Const,
                    name: "b".to_string(),
                    initializer: None,
                },
                Statement::VarDeclaration {
                    kind: DeclarationKind::Var,
                    name: "c".to_string(),
                    initializer: Some(Expression::identifier("a")),
                },
            ]
        );
    }

    #[test]
    fn test_function_declaration() {
        let statements = parse("async function greet(name, greeting = \"hi\") { return greeting + name }");
        let Statement::FunctionDeclaration(def) = &statements[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(def.name.as_deref(), Some("greet"));
        assert!(def.is_async);
        assert_eq!(def.params.len(), 2);
    }

    #[test]
    fn test_if_else_chain() {
        let statements = parse("if (a) { b } else if (c) d else { e }");
        let Statement::If { else_branch, .. } = &statements[0] else {
            panic!("expected if");
        };
        let else_branch = else_branch.as_deref().unwrap();
        assert_eq!(else_branch.kind(), "If");
    }

    #[test]
    fn test_for_loops() {
        let statements = parse("for (const x of items) { total += x }");
        assert!(matches!(&statements[0], Statement::For { variable, .. } if variable == "x"));

        let statements = parse("for (let i = 0; i < 3; i++) {}");
        let Statement::ForCStyle { init, test, update, .. } = &statements[0] else {
            panic!("expected c-style for");
        };
        assert!(init.is_some());
        assert_eq!(
            test.clone(),
            Some(Expression::binary(
                BinaryOperator::LessThan,
                Expression::identifier("i"),
                Expression::number(3.0)
            ))
        );
        assert!(update.is_some());

        let statements = parse("for (;;) { break }");
        assert!(matches!(
            &statements[0],
            Statement::ForCStyle { init: None, test: None, update: None, .. }
        ));
    }

    #[test]
    fn test_try_forms() {
        let statements = parse("try { a() } catch (e) { b } catch { c } finally { d }");
        let Statement::Try { handlers, finalizer, .. } = &statements[0] else {
            panic!("expected try");
        };
        assert_eq!(handlers.len(), 2);
        assert_eq!(handlers[0].param.as_deref(), Some("e"));
        assert_eq!(handlers[1].param, None);
        assert!(finalizer.is_some());

        let error = parse_program("try { a() }").unwrap_err();
        assert!(error.to_string().contains("Missing catch or finally"));
    }

    #[test]
    fn test_class_declaration() {
        let statements = parse(
            "class Counter {\n  count = 0\n  constructor(start) { this.count = start }\n  increment() { this.count++ }\n}",
        );
        let Statement::ClassDeclaration(def) = &statements[0] else {
            panic!("expected class");
        };
        assert_eq!(def.name, "Counter");
        assert_eq!(def.fields.len(), 1);
        let names: Vec<_> = def.methods.iter().map(|m| m.display_name()).collect();
        assert_eq!(names, vec!["constructor", "increment"]);
    }

    #[test]
    fn test_class_methods_with_function_keyword() {
        let statements = parse(
            "class Job {\n  function run(x) { return [x, { y: (x) => -x }] }\n  async function wait() { await sleep(1) }\n}",
        );
        let Statement::ClassDeclaration(def) = &statements[0] else {
            panic!("expected class");
        };
        let names: Vec<_> = def.methods.iter().map(|m| m.display_name()).collect();
        assert_eq!(names, vec!["run", "wait"]);
        assert!(def.methods[1].is_async);
    }

    #[test]
    fn test_deeply_nested_rules() {
        let statements = parse(
            "if (a) { while (b) { for (x in [f(g(h[1]))]) { try { c = !(d ? e : ++i) } catch { } } } }",
        );
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].kind(), "If");
    }

    #[test]
    fn test_test_and_assert() {
        let statements = parse("test \"adds\" { assert 1 + 1 == 2, \"math\"\n assert(true) }");
        let Statement::TestDeclaration { name, body } = &statements[0] else {
            panic!("expected test");
        };
        assert_eq!(name, "adds");
        assert!(matches!(&body[0], Statement::Assert { message: Some(_), .. }));
        assert!(matches!(&body[1], Statement::Assert { message: None, .. }));
    }

    #[test]
    fn test_import_export() {
        assert_eq!(
            parse("import { a, b } from \"lib\"")[0],
            Statement::Import {
                names: vec!["a".to_string(), "b".to_string()],
                source: "lib".to_string(),
            }
        );
        assert_eq!(parse("export const x = 1")[0].kind(), "Export");
    }

    #[test]
    fn test_block_is_preferred_over_dict() {
        assert_eq!(parse("{ a }")[0].kind(), "Block");
        assert_eq!(parse("let d = { a: 1 }")[0].kind(), "VarDeclaration");
    }

    #[test]
    fn test_error_location() {
        let error = parse_program("let x = 1\nlet = 2").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Parse error: Unexpected token '=' at line 2, column 5"
        );
    }

    #[test]
    fn test_stray_closing_token() {
        let error = parse_program("a()\n)").unwrap_err();
        assert!(error.to_string().contains("line 2, column 1"));
    }
}
