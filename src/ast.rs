//! # Script AST
//!
//! The tree built once by the parser and only ever read by the evaluator.
//! Function and class bodies sit behind `Arc` so closures share them instead
//! of cloning subtrees every time a function value is created.
//!
//! Every node kind exposes its discriminator through [`Statement::kind`] and
//! [`Expression::kind`] (`"If"`, `"Call"`, ...), used in logs and errors.

use std::fmt;
use std::sync::Arc;

use strum::IntoStaticStr;

// ルート
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Statements,
}

impl Program {
    pub fn new(statements: Statements) -> Self {
        Self { statements }
    }
}

pub type Statements = Vec<Statement>;

// 文
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum Statement {
    // declarations
    VarDeclaration {
        kind: DeclarationKind,
        name: String,
        initializer: Option<Expression>,
    },
    FunctionDeclaration(Arc<FunctionDef>),
    ClassDeclaration(Arc<ClassDef>),
    TestDeclaration {
        name: String,
        body: Statements,
    },
    // grouping
    Block(Statements),
    Expression(Expression),
    // control flow
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    For {
        variable: String,
        iterable: Expression,
        body: Box<Statement>,
    },
    ForCStyle {
        init: Option<Box<Statement>>,
        test: Option<Expression>,
        update: Option<Expression>,
        body: Box<Statement>,
    },
    Return(Option<Expression>),
    Break,
    Continue,
    // errors
    Try {
        block: Statements,
        handlers: Vec<CatchClause>,
        finalizer: Option<Statements>,
    },
    Throw(Expression),
    Assert {
        condition: Expression,
        message: Option<Expression>,
    },
    // modules
    Import {
        names: Vec<String>,
        source: String,
    },
    Export(Box<Statement>),
}

impl Statement {
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DeclarationKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    // Error variable name to be bound in the handler scope
    pub param: Option<String>,
    pub body: Statements,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<Parameter>,
    pub body: FunctionBody,
    pub is_async: bool,
}

impl FunctionDef {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Statements),
    /// Lambda shorthand `x => x * 2`
    Expression(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub default: Option<Expression>,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub fields: Vec<ClassField>,
    pub methods: Vec<Arc<FunctionDef>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassField {
    pub name: String,
    pub initializer: Option<Expression>,
}

// 式
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Assign {
        op: AssignOperator,
        target: Box<Expression>,
        value: Box<Expression>,
    },
    Update {
        op: UpdateOperator,
        prefix: bool,
        target: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Argument>,
    },
    Member {
        object: Box<Expression>,
        property: String,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    Array(Vec<Expression>),
    Dict(Vec<(String, Expression)>),
    Lambda(Arc<FunctionDef>),
    Interpolation(Vec<InterpolationPart>),
    Ternary {
        condition: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    Await(Box<Expression>),
}

impl Expression {
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expression::Identifier(_) | Expression::Member { .. } | Expression::Index { .. }
        )
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Expression::Identifier(name.into())
    }

    pub fn number(value: f64) -> Self {
        Expression::Literal(Literal::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::String(value.into()))
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Source-like rendering used when naming a callee in errors.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::Member { object, property } => write!(f, "{}.{}", object, property),
            Expression::Index { object, index } => write!(f, "{}[{}]", object, index),
            Expression::Literal(Literal::Number(n)) => write!(f, "{}", n),
            Expression::Literal(Literal::String(s)) => write!(f, "\"{}\"", s),
            Expression::Literal(Literal::Boolean(b)) => write!(f, "{}", b),
            Expression::Literal(Literal::Null) => write!(f, "null"),
            Expression::Call { callee, .. } => write!(f, "{}(...)", callee),
            other => write!(f, "<{}>", other.kind()),
        }
    }
}

// リテラル
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationPart {
    Literal(String),
    Expression(Expression),
}

// Argumentの型
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Named { name: String, value: Expression },
    Positional(Expression),
}

// 二項演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulo,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = "<=")]
    LessThanEqual,
    #[strum(serialize = ">=")]
    GreaterThanEqual,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum UnaryOperator {
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "-")]
    Negate,
    #[strum(serialize = "+")]
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AssignOperator {
    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = "+=")]
    AddAssign,
    #[strum(serialize = "-=")]
    SubtractAssign,
    #[strum(serialize = "*=")]
    MultiplyAssign,
    #[strum(serialize = "/=")]
    DivideAssign,
}

impl AssignOperator {
    /// The arithmetic applied by a compound assignment.
    pub fn binary_operator(&self) -> Option<BinaryOperator> {
        match self {
            AssignOperator::Assign => None,
            AssignOperator::AddAssign => Some(BinaryOperator::Add),
            AssignOperator::SubtractAssign => Some(BinaryOperator::Subtract),
            AssignOperator::MultiplyAssign => Some(BinaryOperator::Multiply),
            AssignOperator::DivideAssign => Some(BinaryOperator::Divide),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    Increment,
    Decrement,
}
