//! Abstract syntax tree
//!
//! Two capability sets, modeled as two enums with exhaustive matches:
//! statements produce no value, expressions produce one. Every node keeps the
//! token that introduced it for diagnostics.
//!
//! `Display` renders a node back to concrete syntax. The output is
//! re-parseable: parsing the printed form of a program yields an AST that
//! prints identically (grouping parentheses collapse, name hints and optional
//! semicolons are not significant).

use crate::token::Token;
use std::fmt;

/// Root node: an ordered sequence of statements
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn token_literal(&self) -> &str {
        match self.statements.first() {
            Some(stmt) => stmt.token_literal(),
            None => "",
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_statements(f, &self.statements)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Let(LetStatement),
    Return(ReturnStatement),
    Expression(ExpressionStatement),
}

impl Statement {
    pub fn token_literal(&self) -> &str {
        match self {
            Statement::Let(s) => &s.token.literal,
            Statement::Return(s) => &s.token.literal,
            Statement::Expression(s) => &s.token.literal,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Let(s) => write!(f, "let {} = {};", s.name, s.value),
            Statement::Return(s) => match &s.return_value {
                Some(value) => write!(f, "return {};", value),
                None => write!(f, "return;"),
            },
            Statement::Expression(s) => s.expression.fmt(f),
        }
    }
}

/// `let <name> = <value>;`
#[derive(Debug, Clone, PartialEq)]
pub struct LetStatement {
    pub token: Token,
    pub name: Identifier,
    pub value: Expression,
}

/// `return;` or `return <value>;`
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatement {
    pub token: Token,
    pub return_value: Option<Expression>,
}

/// An expression in statement position
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    pub token: Token,
    pub expression: Expression,
}

/// `{ <statements> }`
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    pub token: Token,
    pub statements: Vec<Statement>,
}

impl fmt::Display for BlockStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_statements(f, &self.statements)
    }
}

fn write_statements(f: &mut fmt::Formatter<'_>, statements: &[Statement]) -> fmt::Result {
    for (i, stmt) in statements.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}", stmt)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(Identifier),
    IntegerLiteral(IntegerLiteral),
    StringLiteral(StringLiteral),
    Boolean(BooleanLiteral),
    Prefix(PrefixExpression),
    Infix(InfixExpression),
    If(IfExpression),
    Function(FunctionLiteral),
    Call(CallExpression),
    Array(ArrayLiteral),
    Index(IndexExpression),
    Hash(HashLiteral),
    Macro(MacroLiteral),
}

impl Expression {
    pub fn token_literal(&self) -> &str {
        match self {
            Expression::Identifier(e) => &e.token.literal,
            Expression::IntegerLiteral(e) => &e.token.literal,
            Expression::StringLiteral(e) => &e.token.literal,
            Expression::Boolean(e) => &e.token.literal,
            Expression::Prefix(e) => &e.token.literal,
            Expression::Infix(e) => &e.token.literal,
            Expression::If(e) => &e.token.literal,
            Expression::Function(e) => &e.token.literal,
            Expression::Call(e) => &e.token.literal,
            Expression::Array(e) => &e.token.literal,
            Expression::Index(e) => &e.token.literal,
            Expression::Hash(e) => &e.token.literal,
            Expression::Macro(e) => &e.token.literal,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(e) => f.write_str(&e.value),
            Expression::IntegerLiteral(e) => write!(f, "{}", e.value),
            Expression::StringLiteral(e) => write!(f, "\"{}\"", e.value),
            Expression::Boolean(e) => write!(f, "{}", e.value),
            Expression::Prefix(e) => write!(f, "({}{})", e.operator, e.right),
            Expression::Infix(e) => write!(f, "({} {} {})", e.left, e.operator, e.right),
            Expression::If(e) => {
                write!(f, "if ({}) {{ {} }}", e.condition, e.consequence)?;
                if let Some(alt) = &e.alternative {
                    write!(f, " else {{ {} }}", alt)?;
                }
                Ok(())
            }
            Expression::Function(e) => {
                write!(f, "fn({}) {{ {} }}", join_idents(&e.parameters), e.body)
            }
            Expression::Call(e) => {
                let args: Vec<String> = e.arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", e.function, args.join(", "))
            }
            Expression::Array(e) => {
                let elements: Vec<String> = e.elements.iter().map(|el| el.to_string()).collect();
                write!(f, "[{}]", elements.join(", "))
            }
            Expression::Index(e) => write!(f, "({}[{}])", e.left, e.index),
            Expression::Hash(e) => {
                let pairs: Vec<String> = e
                    .pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Expression::Macro(e) => {
                write!(f, "macro({}) {{ {} }}", join_idents(&e.parameters), e.body)
            }
        }
    }
}

fn join_idents(idents: &[Identifier]) -> String {
    idents
        .iter()
        .map(|i| i.value.clone())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub token: Token,
    pub value: String,
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegerLiteral {
    pub token: Token,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteral {
    pub token: Token,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanLiteral {
    pub token: Token,
    pub value: bool,
}

/// `!<right>` or `-<right>`
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixExpression {
    pub token: Token,
    pub operator: String,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfixExpression {
    pub token: Token,
    pub operator: String,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfExpression {
    pub token: Token,
    pub condition: Box<Expression>,
    pub consequence: BlockStatement,
    pub alternative: Option<BlockStatement>,
}

/// Function literal with an optional name hint
///
/// The hint is filled in by the parser when the literal is the value of a
/// `let`; the compiler uses it to resolve self-references. It is not part of
/// the concrete syntax and is not printed.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    pub token: Token,
    pub parameters: Vec<Identifier>,
    pub body: BlockStatement,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    pub token: Token,
    pub function: Box<Expression>,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLiteral {
    pub token: Token,
    pub elements: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpression {
    pub token: Token,
    pub left: Box<Expression>,
    pub index: Box<Expression>,
}

/// Insertion-ordered key/value pairs
#[derive(Debug, Clone, PartialEq)]
pub struct HashLiteral {
    pub token: Token,
    pub pairs: Vec<(Expression, Expression)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroLiteral {
    pub token: Token,
    pub parameters: Vec<Identifier>,
    pub body: BlockStatement,
}

/// Rewrite every expression in a program, post-order
///
/// Children are rewritten before their parent is handed to `modifier`. The
/// modifier maps expressions to expressions, so a replacement can never be of
/// the wrong node class.
pub fn modify_program<F>(program: Program, modifier: &mut F) -> Program
where
    F: FnMut(Expression) -> Expression,
{
    Program {
        statements: program
            .statements
            .into_iter()
            .map(|stmt| modify_statement(stmt, modifier))
            .collect(),
    }
}

fn modify_statement<F>(stmt: Statement, modifier: &mut F) -> Statement
where
    F: FnMut(Expression) -> Expression,
{
    match stmt {
        Statement::Let(LetStatement { token, name, value }) => Statement::Let(LetStatement {
            token,
            name,
            value: modify_expression(value, modifier),
        }),
        Statement::Return(ReturnStatement {
            token,
            return_value,
        }) => Statement::Return(ReturnStatement {
            token,
            return_value: return_value.map(|v| modify_expression(v, modifier)),
        }),
        Statement::Expression(ExpressionStatement { token, expression }) => {
            Statement::Expression(ExpressionStatement {
                token,
                expression: modify_expression(expression, modifier),
            })
        }
    }
}

fn modify_block<F>(block: BlockStatement, modifier: &mut F) -> BlockStatement
where
    F: FnMut(Expression) -> Expression,
{
    BlockStatement {
        token: block.token,
        statements: block
            .statements
            .into_iter()
            .map(|stmt| modify_statement(stmt, modifier))
            .collect(),
    }
}

/// Rewrite one expression tree, post-order
pub fn modify_expression<F>(expr: Expression, modifier: &mut F) -> Expression
where
    F: FnMut(Expression) -> Expression,
{
    let descended = match expr {
        Expression::Prefix(e) => Expression::Prefix(PrefixExpression {
            token: e.token,
            operator: e.operator,
            right: Box::new(modify_expression(*e.right, modifier)),
        }),
        Expression::Infix(e) => Expression::Infix(InfixExpression {
            token: e.token,
            operator: e.operator,
            left: Box::new(modify_expression(*e.left, modifier)),
            right: Box::new(modify_expression(*e.right, modifier)),
        }),
        Expression::Index(e) => Expression::Index(IndexExpression {
            token: e.token,
            left: Box::new(modify_expression(*e.left, modifier)),
            index: Box::new(modify_expression(*e.index, modifier)),
        }),
        Expression::If(e) => Expression::If(IfExpression {
            token: e.token,
            condition: Box::new(modify_expression(*e.condition, modifier)),
            consequence: modify_block(e.consequence, modifier),
            alternative: e.alternative.map(|alt| modify_block(alt, modifier)),
        }),
        Expression::Function(e) => Expression::Function(FunctionLiteral {
            token: e.token,
            parameters: e.parameters,
            body: modify_block(e.body, modifier),
            name: e.name,
        }),
        Expression::Call(e) => Expression::Call(CallExpression {
            token: e.token,
            function: Box::new(modify_expression(*e.function, modifier)),
            arguments: e
                .arguments
                .into_iter()
                .map(|a| modify_expression(a, modifier))
                .collect(),
        }),
        Expression::Array(e) => Expression::Array(ArrayLiteral {
            token: e.token,
            elements: e
                .elements
                .into_iter()
                .map(|el| modify_expression(el, modifier))
                .collect(),
        }),
        Expression::Hash(e) => Expression::Hash(HashLiteral {
            token: e.token,
            pairs: e
                .pairs
                .into_iter()
                .map(|(k, v)| {
                    (
                        modify_expression(k, modifier),
                        modify_expression(v, modifier),
                    )
                })
                .collect(),
        }),
        other => other,
    };
    modifier(descended)
}
