//! Pratt expression parser
//!
//! Token-driven recursive descent with operator precedence. Every token kind
//! that can begin an expression has a prefix arm in `parse_prefix`; every
//! token kind that can continue one has an infix arm in `parse_infix`. The
//! precedence-climbing loop in `parse_expression` glues the two together.
//!
//! Errors accumulate in a vector and parsing continues best-effort; the
//! parser never panics on input. Callers must check `errors()` before using
//! the returned program.

use crate::ast::{
    ArrayLiteral, BlockStatement, BooleanLiteral, CallExpression, Expression,
    ExpressionStatement, FunctionLiteral, HashLiteral, Identifier, IfExpression, IndexExpression,
    InfixExpression, IntegerLiteral, LetStatement, MacroLiteral, PrefixExpression, Program,
    ReturnStatement, Statement, StringLiteral,
};
use crate::lexer::Lexer;
use crate::token::{Token, TokenType};

/// Binding strength, ascending
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    /// `==` `!=`
    Equals,
    /// `<` `>`
    LessGreater,
    /// `+` `-`
    Sum,
    /// `*` `/`
    Product,
    /// unary `-` `!`
    Prefix,
    /// `f(x)`
    Call,
    /// `a[0]`
    Index,
}

fn token_precedence(token_type: TokenType) -> Precedence {
    match token_type {
        TokenType::Eq | TokenType::NotEq => Precedence::Equals,
        TokenType::Lt | TokenType::Gt => Precedence::LessGreater,
        TokenType::Plus | TokenType::Minus => Precedence::Sum,
        TokenType::Slash | TokenType::Asterisk => Precedence::Product,
        TokenType::Lparen => Precedence::Call,
        TokenType::Lbracket => Precedence::Index,
        _ => Precedence::Lowest,
    }
}

fn has_infix(token_type: TokenType) -> bool {
    matches!(
        token_type,
        TokenType::Plus
            | TokenType::Minus
            | TokenType::Slash
            | TokenType::Asterisk
            | TokenType::Eq
            | TokenType::NotEq
            | TokenType::Lt
            | TokenType::Gt
            | TokenType::Lparen
            | TokenType::Lbracket
    )
}

pub struct Parser {
    lexer: Lexer,
    cur_token: Token,
    peek_token: Token,
    errors: Vec<String>,
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        let mut parser = Parser {
            lexer,
            cur_token: Token::eof(),
            peek_token: Token::eof(),
            errors: Vec::new(),
        };
        // Prime cur_token and peek_token
        parser.next_token();
        parser.next_token();
        parser
    }

    /// Convenience constructor from source text
    pub fn from_source(input: &str) -> Self {
        Parser::new(Lexer::new(input))
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();

        while self.cur_token.token_type != TokenType::Eof {
            if let Some(stmt) = self.parse_statement() {
                program.statements.push(stmt);
            }
            self.next_token();
        }

        program
    }

    fn next_token(&mut self) {
        self.cur_token = std::mem::replace(&mut self.peek_token, self.lexer.next_token());
    }

    fn cur_token_is(&self, token_type: TokenType) -> bool {
        self.cur_token.token_type == token_type
    }

    fn peek_token_is(&self, token_type: TokenType) -> bool {
        self.peek_token.token_type == token_type
    }

    /// Advance if the next token matches, otherwise record an error
    fn expect_peek(&mut self, token_type: TokenType) -> bool {
        if self.peek_token_is(token_type) {
            self.next_token();
            true
        } else {
            self.errors.push(format!(
                "expected next token to be {}, got {} instead",
                token_type, self.peek_token.token_type
            ));
            false
        }
    }

    fn peek_precedence(&self) -> Precedence {
        token_precedence(self.peek_token.token_type)
    }

    fn cur_precedence(&self) -> Precedence {
        token_precedence(self.cur_token.token_type)
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.cur_token.token_type {
            TokenType::Let => self.parse_let_statement(),
            TokenType::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Option<Statement> {
        let token = self.cur_token.clone();

        if !self.expect_peek(TokenType::Ident) {
            return None;
        }
        let name = Identifier {
            token: self.cur_token.clone(),
            value: self.cur_token.literal.clone(),
        };

        if !self.expect_peek(TokenType::Assign) {
            return None;
        }
        self.next_token();

        let mut value = self.parse_expression(Precedence::Lowest)?;

        // Hand the binding name to function literals so the compiler can
        // resolve self-references.
        if let Expression::Function(func) = &mut value {
            func.name = name.value.clone();
        }

        if self.peek_token_is(TokenType::Semicolon) {
            self.next_token();
        }

        Some(Statement::Let(LetStatement { token, name, value }))
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        let token = self.cur_token.clone();

        let return_value = if self.peek_token_is(TokenType::Semicolon)
            || self.peek_token_is(TokenType::Rbrace)
            || self.peek_token_is(TokenType::Eof)
        {
            None
        } else {
            self.next_token();
            Some(self.parse_expression(Precedence::Lowest)?)
        };

        if self.peek_token_is(TokenType::Semicolon) {
            self.next_token();
        }

        Some(Statement::Return(ReturnStatement {
            token,
            return_value,
        }))
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let token = self.cur_token.clone();
        let expression = self.parse_expression(Precedence::Lowest)?;

        if self.peek_token_is(TokenType::Semicolon) {
            self.next_token();
        }

        Some(Statement::Expression(ExpressionStatement {
            token,
            expression,
        }))
    }

    /// The precedence-climbing core
    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let mut left = self.parse_prefix()?;

        while !self.peek_token_is(TokenType::Semicolon) && precedence < self.peek_precedence() {
            if !has_infix(self.peek_token.token_type) {
                return Some(left);
            }
            self.next_token();
            left = self.parse_infix(left)?;
        }

        Some(left)
    }

    /// Dispatch on the token that begins an expression
    fn parse_prefix(&mut self) -> Option<Expression> {
        match self.cur_token.token_type {
            TokenType::Ident => Some(Expression::Identifier(Identifier {
                token: self.cur_token.clone(),
                value: self.cur_token.literal.clone(),
            })),
            TokenType::Int => self.parse_integer_literal(),
            TokenType::String => Some(Expression::StringLiteral(StringLiteral {
                token: self.cur_token.clone(),
                value: self.cur_token.literal.clone(),
            })),
            TokenType::Bang | TokenType::Minus => self.parse_prefix_expression(),
            TokenType::True | TokenType::False => Some(Expression::Boolean(BooleanLiteral {
                token: self.cur_token.clone(),
                value: self.cur_token_is(TokenType::True),
            })),
            TokenType::Lparen => self.parse_grouped_expression(),
            TokenType::If => self.parse_if_expression(),
            TokenType::Function => self.parse_function_literal(),
            TokenType::Macro => self.parse_macro_literal(),
            TokenType::Lbracket => self.parse_array_literal(),
            TokenType::Lbrace => self.parse_hash_literal(),
            other => {
                self.errors
                    .push(format!("no prefix parse function for {} found", other));
                None
            }
        }
    }

    /// Dispatch on a token that continues the expression `left`
    fn parse_infix(&mut self, left: Expression) -> Option<Expression> {
        match self.cur_token.token_type {
            TokenType::Plus
            | TokenType::Minus
            | TokenType::Slash
            | TokenType::Asterisk
            | TokenType::Eq
            | TokenType::NotEq
            | TokenType::Lt
            | TokenType::Gt => self.parse_infix_expression(left),
            TokenType::Lparen => self.parse_call_expression(left),
            TokenType::Lbracket => self.parse_index_expression(left),
            other => {
                self.errors
                    .push(format!("no infix parse function for {} found", other));
                None
            }
        }
    }

    fn parse_integer_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();
        match token.literal.parse::<i64>() {
            Ok(value) => Some(Expression::IntegerLiteral(IntegerLiteral { token, value })),
            Err(_) => {
                self.errors
                    .push(format!("could not parse {:?} as integer", token.literal));
                None
            }
        }
    }

    fn parse_prefix_expression(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();
        let operator = token.literal.clone();

        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;

        Some(Expression::Prefix(PrefixExpression {
            token,
            operator,
            right: Box::new(right),
        }))
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Option<Expression> {
        let token = self.cur_token.clone();
        let operator = token.literal.clone();

        let precedence = self.cur_precedence();
        self.next_token();
        let right = self.parse_expression(precedence)?;

        Some(Expression::Infix(InfixExpression {
            token,
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }))
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.next_token();
        let expr = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenType::Rparen) {
            return None;
        }
        Some(expr)
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();

        if !self.expect_peek(TokenType::Lparen) {
            return None;
        }
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenType::Rparen) {
            return None;
        }
        if !self.expect_peek(TokenType::Lbrace) {
            return None;
        }
        let consequence = self.parse_block_statement();

        let alternative = if self.peek_token_is(TokenType::Else) {
            self.next_token();
            if !self.expect_peek(TokenType::Lbrace) {
                return None;
            }
            Some(self.parse_block_statement())
        } else {
            None
        };

        Some(Expression::If(IfExpression {
            token,
            condition: Box::new(condition),
            consequence,
            alternative,
        }))
    }

    /// Runs until `}` or EOF; cur_token is `{` on entry, `}` on exit
    fn parse_block_statement(&mut self) -> BlockStatement {
        let token = self.cur_token.clone();
        let mut statements = Vec::new();

        self.next_token();
        while !self.cur_token_is(TokenType::Rbrace) && !self.cur_token_is(TokenType::Eof) {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            self.next_token();
        }

        BlockStatement { token, statements }
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();

        if !self.expect_peek(TokenType::Lparen) {
            return None;
        }
        let parameters = self.parse_function_parameters()?;

        if !self.expect_peek(TokenType::Lbrace) {
            return None;
        }
        let body = self.parse_block_statement();

        Some(Expression::Function(FunctionLiteral {
            token,
            parameters,
            body,
            name: String::new(),
        }))
    }

    fn parse_macro_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();

        if !self.expect_peek(TokenType::Lparen) {
            return None;
        }
        let parameters = self.parse_function_parameters()?;

        if !self.expect_peek(TokenType::Lbrace) {
            return None;
        }
        let body = self.parse_block_statement();

        Some(Expression::Macro(MacroLiteral {
            token,
            parameters,
            body,
        }))
    }

    fn parse_function_parameters(&mut self) -> Option<Vec<Identifier>> {
        let mut identifiers = Vec::new();

        if self.peek_token_is(TokenType::Rparen) {
            self.next_token();
            return Some(identifiers);
        }

        self.next_token();
        identifiers.push(Identifier {
            token: self.cur_token.clone(),
            value: self.cur_token.literal.clone(),
        });

        while self.peek_token_is(TokenType::Comma) {
            self.next_token();
            self.next_token();
            identifiers.push(Identifier {
                token: self.cur_token.clone(),
                value: self.cur_token.literal.clone(),
            });
        }

        if !self.expect_peek(TokenType::Rparen) {
            return None;
        }

        Some(identifiers)
    }

    fn parse_call_expression(&mut self, function: Expression) -> Option<Expression> {
        let token = self.cur_token.clone();
        let arguments = self.parse_expression_list(TokenType::Rparen)?;

        Some(Expression::Call(CallExpression {
            token,
            function: Box::new(function),
            arguments,
        }))
    }

    fn parse_array_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();
        let elements = self.parse_expression_list(TokenType::Rbracket)?;

        Some(Expression::Array(ArrayLiteral { token, elements }))
    }

    fn parse_expression_list(&mut self, end: TokenType) -> Option<Vec<Expression>> {
        let mut list = Vec::new();

        if self.peek_token_is(end) {
            self.next_token();
            return Some(list);
        }

        self.next_token();
        list.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek_token_is(TokenType::Comma) {
            self.next_token();
            self.next_token();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }

        if !self.expect_peek(end) {
            return None;
        }

        Some(list)
    }

    fn parse_index_expression(&mut self, left: Expression) -> Option<Expression> {
        let token = self.cur_token.clone();

        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenType::Rbracket) {
            return None;
        }

        Some(Expression::Index(IndexExpression {
            token,
            left: Box::new(left),
            index: Box::new(index),
        }))
    }

    fn parse_hash_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token.clone();
        let mut pairs = Vec::new();

        while !self.peek_token_is(TokenType::Rbrace) {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;

            if !self.expect_peek(TokenType::Colon) {
                return None;
            }
            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;

            pairs.push((key, value));

            if !self.peek_token_is(TokenType::Rbrace) && !self.expect_peek(TokenType::Comma) {
                return None;
            }
        }

        if !self.expect_peek(TokenType::Rbrace) {
            return None;
        }

        Some(Expression::Hash(HashLiteral { token, pairs }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Program {
        let mut parser = Parser::from_source(input);
        let program = parser.parse_program();
        assert!(
            parser.errors().is_empty(),
            "parser errors for {:?}: {:?}",
            input,
            parser.errors()
        );
        program
    }

    fn only_expression(program: &Program) -> &Expression {
        assert_eq!(program.statements.len(), 1);
        match &program.statements[0] {
            Statement::Expression(stmt) => &stmt.expression,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_let_statements() {
        let tests = [
            ("let x = 5;", "x", "5"),
            ("let y = true;", "y", "true"),
            ("let foobar = y;", "foobar", "y"),
        ];

        for (input, name, value) in tests {
            let program = parse(input);
            assert_eq!(program.statements.len(), 1);
            match &program.statements[0] {
                Statement::Let(stmt) => {
                    assert_eq!(stmt.token.literal, "let");
                    assert_eq!(stmt.name.value, name);
                    assert_eq!(stmt.value.to_string(), value);
                }
                other => panic!("expected let statement, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_return_statements() {
        let program = parse("return 5; return 10; return 993322;");
        assert_eq!(program.statements.len(), 3);
        for stmt in &program.statements {
            match stmt {
                Statement::Return(ret) => {
                    assert_eq!(ret.token.literal, "return");
                    assert!(ret.return_value.is_some());
                }
                other => panic!("expected return statement, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_return_without_value() {
        let program = parse("return;");
        match &program.statements[0] {
            Statement::Return(ret) => assert!(ret.return_value.is_none()),
            other => panic!("expected return statement, got {:?}", other),
        }

        let program = parse("fn() { return }");
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn test_identifier_expression() {
        let program = parse("foobar;");
        match only_expression(&program) {
            Expression::Identifier(ident) => assert_eq!(ident.value, "foobar"),
            other => panic!("expected identifier, got {:?}", other),
        }
    }

    #[test]
    fn test_integer_literal_expression() {
        let program = parse("5;");
        match only_expression(&program) {
            Expression::IntegerLiteral(lit) => {
                assert_eq!(lit.value, 5);
                assert_eq!(lit.token.literal, "5");
            }
            other => panic!("expected integer literal, got {:?}", other),
        }
    }

    #[test]
    fn test_string_literal_expression() {
        let program = parse("\"hello world\";");
        match only_expression(&program) {
            Expression::StringLiteral(lit) => assert_eq!(lit.value, "hello world"),
            other => panic!("expected string literal, got {:?}", other),
        }
    }

    #[test]
    fn test_boolean_expressions() {
        for (input, value) in [("true;", true), ("false;", false)] {
            let program = parse(input);
            match only_expression(&program) {
                Expression::Boolean(lit) => assert_eq!(lit.value, value),
                other => panic!("expected boolean, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_prefix_expressions() {
        let tests = [
            ("!5;", "!", "5"),
            ("-15;", "-", "15"),
            ("!true;", "!", "true"),
            ("!false;", "!", "false"),
        ];

        for (input, operator, right) in tests {
            let program = parse(input);
            match only_expression(&program) {
                Expression::Prefix(prefix) => {
                    assert_eq!(prefix.operator, operator);
                    assert_eq!(prefix.right.to_string(), right);
                }
                other => panic!("expected prefix expression, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_infix_expressions() {
        let tests = [
            ("5 + 5;", "5", "+", "5"),
            ("5 - 5;", "5", "-", "5"),
            ("5 * 5;", "5", "*", "5"),
            ("5 / 5;", "5", "/", "5"),
            ("5 > 5;", "5", ">", "5"),
            ("5 < 5;", "5", "<", "5"),
            ("5 == 5;", "5", "==", "5"),
            ("5 != 5;", "5", "!=", "5"),
            ("true == true", "true", "==", "true"),
            ("true != false", "true", "!=", "false"),
        ];

        for (input, left, operator, right) in tests {
            let program = parse(input);
            match only_expression(&program) {
                Expression::Infix(infix) => {
                    assert_eq!(infix.left.to_string(), left);
                    assert_eq!(infix.operator, operator);
                    assert_eq!(infix.right.to_string(), right);
                }
                other => panic!("expected infix expression, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_operator_precedence() {
        let tests = [
            ("-a * b", "((-a) * b)"),
            ("!-a", "(!(-a))"),
            ("a + b + c", "((a + b) + c)"),
            ("a + b - c", "((a + b) - c)"),
            ("a * b * c", "((a * b) * c)"),
            ("a * b / c", "((a * b) / c)"),
            ("a + b / c", "(a + (b / c))"),
            ("a + b * c + d / e - f", "(((a + (b * c)) + (d / e)) - f)"),
            ("3 + 4; -5 * 5", "(3 + 4) ((-5) * 5)"),
            ("5 > 4 == 3 < 4", "((5 > 4) == (3 < 4))"),
            ("5 < 4 != 3 > 4", "((5 < 4) != (3 > 4))"),
            (
                "3 + 4 * 5 == 3 * 1 + 4 * 5",
                "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)))",
            ),
            ("true", "true"),
            ("false", "false"),
            ("3 > 5 == false", "((3 > 5) == false)"),
            ("3 < 5 == true", "((3 < 5) == true)"),
            ("1 + (2 + 3) + 4", "((1 + (2 + 3)) + 4)"),
            ("(5 + 5) * 2", "((5 + 5) * 2)"),
            ("2 / (5 + 5)", "(2 / (5 + 5))"),
            ("-(5 + 5)", "(-(5 + 5))"),
            ("!(true == true)", "(!(true == true))"),
            ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
            (
                "add(a, b, 1, 2 * 3, 4 + 5, add(6, 7 * 8))",
                "add(a, b, 1, (2 * 3), (4 + 5), add(6, (7 * 8)))",
            ),
            (
                "add(a + b + c * d / f + g)",
                "add((((a + b) + ((c * d) / f)) + g))",
            ),
            (
                "a * [1, 2, 3, 4][b * c] * d",
                "((a * ([1, 2, 3, 4][(b * c)])) * d)",
            ),
            (
                "add(a * b[2], b[1], 2 * [1, 2][1])",
                "add((a * (b[2])), (b[1]), (2 * ([1, 2][1])))",
            ),
        ];

        for (input, expected) in tests {
            let program = parse(input);
            assert_eq!(program.to_string(), expected, "input: {}", input);
        }
    }

    #[test]
    fn test_if_expression() {
        let program = parse("if (x < y) { x }");
        match only_expression(&program) {
            Expression::If(expr) => {
                assert_eq!(expr.condition.to_string(), "(x < y)");
                assert_eq!(expr.consequence.to_string(), "x");
                assert!(expr.alternative.is_none());
            }
            other => panic!("expected if expression, got {:?}", other),
        }
    }

    #[test]
    fn test_if_else_expression() {
        let program = parse("if (x < y) { x } else { y }");
        match only_expression(&program) {
            Expression::If(expr) => {
                assert_eq!(expr.consequence.to_string(), "x");
                assert_eq!(expr.alternative.as_ref().unwrap().to_string(), "y");
            }
            other => panic!("expected if expression, got {:?}", other),
        }
    }

    #[test]
    fn test_function_literal() {
        let program = parse("fn(x, y) { x + y; }");
        match only_expression(&program) {
            Expression::Function(func) => {
                let params: Vec<&str> = func.parameters.iter().map(|p| p.value.as_str()).collect();
                assert_eq!(params, ["x", "y"]);
                assert_eq!(func.body.to_string(), "(x + y)");
                assert!(func.name.is_empty());
            }
            other => panic!("expected function literal, got {:?}", other),
        }
    }

    #[test]
    fn test_function_parameter_lists() {
        let tests: [(&str, &[&str]); 3] = [
            ("fn() {};", &[]),
            ("fn(x) {};", &["x"]),
            ("fn(x, y, z) {};", &["x", "y", "z"]),
        ];

        for (input, expected) in tests {
            let program = parse(input);
            match only_expression(&program) {
                Expression::Function(func) => {
                    let params: Vec<&str> =
                        func.parameters.iter().map(|p| p.value.as_str()).collect();
                    assert_eq!(params, expected);
                }
                other => panic!("expected function literal, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_function_literal_with_name() {
        let program = parse("let myFunction = fn() { };");
        match &program.statements[0] {
            Statement::Let(stmt) => match &stmt.value {
                Expression::Function(func) => assert_eq!(func.name, "myFunction"),
                other => panic!("expected function literal, got {:?}", other),
            },
            other => panic!("expected let statement, got {:?}", other),
        }
    }

    #[test]
    fn test_call_expression() {
        let program = parse("add(1, 2 * 3, 4 + 5);");
        match only_expression(&program) {
            Expression::Call(call) => {
                assert_eq!(call.function.to_string(), "add");
                let args: Vec<String> = call.arguments.iter().map(|a| a.to_string()).collect();
                assert_eq!(args, ["1", "(2 * 3)", "(4 + 5)"]);
            }
            other => panic!("expected call expression, got {:?}", other),
        }
    }

    #[test]
    fn test_array_literal() {
        let program = parse("[1, 2 * 2, 3 + 3]");
        match only_expression(&program) {
            Expression::Array(array) => {
                let elements: Vec<String> =
                    array.elements.iter().map(|e| e.to_string()).collect();
                assert_eq!(elements, ["1", "(2 * 2)", "(3 + 3)"]);
            }
            other => panic!("expected array literal, got {:?}", other),
        }
    }

    #[test]
    fn test_index_expression() {
        let program = parse("myArray[1 + 1]");
        match only_expression(&program) {
            Expression::Index(index) => {
                assert_eq!(index.left.to_string(), "myArray");
                assert_eq!(index.index.to_string(), "(1 + 1)");
            }
            other => panic!("expected index expression, got {:?}", other),
        }
    }

    #[test]
    fn test_hash_literals() {
        let program = parse("{\"one\": 1, \"two\": 2, \"three\": 3}");
        match only_expression(&program) {
            Expression::Hash(hash) => {
                let pairs: Vec<(String, String)> = hash
                    .pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                // Insertion order is preserved
                assert_eq!(
                    pairs,
                    [
                        ("\"one\"".to_string(), "1".to_string()),
                        ("\"two\"".to_string(), "2".to_string()),
                        ("\"three\"".to_string(), "3".to_string()),
                    ]
                );
            }
            other => panic!("expected hash literal, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_hash_literal() {
        let program = parse("{}");
        match only_expression(&program) {
            Expression::Hash(hash) => assert!(hash.pairs.is_empty()),
            other => panic!("expected hash literal, got {:?}", other),
        }
    }

    #[test]
    fn test_hash_literal_with_expression_values() {
        let program = parse("{\"one\": 0 + 1, \"two\": 10 - 8}");
        match only_expression(&program) {
            Expression::Hash(hash) => {
                assert_eq!(hash.pairs[0].1.to_string(), "(0 + 1)");
                assert_eq!(hash.pairs[1].1.to_string(), "(10 - 8)");
            }
            other => panic!("expected hash literal, got {:?}", other),
        }
    }

    #[test]
    fn test_macro_literal() {
        let program = parse("macro(x, y) { x + y; }");
        match only_expression(&program) {
            Expression::Macro(lit) => {
                let params: Vec<&str> = lit.parameters.iter().map(|p| p.value.as_str()).collect();
                assert_eq!(params, ["x", "y"]);
                assert_eq!(lit.body.to_string(), "(x + y)");
            }
            other => panic!("expected macro literal, got {:?}", other),
        }
    }

    #[test]
    fn test_error_recovery_does_not_panic() {
        let mut parser = Parser::from_source("let = 5;");
        parser.parse_program();
        assert!(!parser.errors().is_empty());

        let mut parser = Parser::from_source("let x 5; let = 10; let 838383;");
        parser.parse_program();
        assert!(parser.errors().len() >= 3);
    }

    #[test]
    fn test_expected_token_error_message() {
        let mut parser = Parser::from_source("let x 5;");
        parser.parse_program();
        assert_eq!(
            parser.errors()[0],
            "expected next token to be =, got INT instead"
        );
    }

    #[test]
    fn test_no_prefix_error_message() {
        let mut parser = Parser::from_source("+5;");
        parser.parse_program();
        assert_eq!(
            parser.errors()[0],
            "no prefix parse function for + found"
        );
    }

    #[test]
    fn test_display_round_trip() {
        let inputs = [
            "let x = 5;",
            "let f = fn(a, b) { a + b };",
            "if (x < y) { x } else { y }",
            "add(1, 2 * 3, 4 + 5)",
            "[1, \"two\", true][0]",
            "{\"one\": 1, 2: \"two\"}",
            "let unless = macro(cond, cons) { quote(if (!(unquote(cond))) { unquote(cons) }) };",
            "let c = fn(x) { if (x == 0) { 0 } else { c(x - 1) + 1 } }; c(5)",
            "return;",
            "puts(\"hello\")",
        ];

        for input in inputs {
            let printed = parse(input).to_string();
            let reparsed = parse(&printed).to_string();
            assert_eq!(printed, reparsed, "input: {}", input);
        }
    }
}
