// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Recursive descent parser.
//!
//! Precedence, lowest to highest: assignment, `||`, `&&`, equality,
//! comparison, additive, multiplicative, unary, call/member, primary.
//! Semicolons are optional after every statement.

use super::ast::*;
use super::lexer::{Scanner, Token, TokenKind};
use std::sync::Arc;

/// Deepest statement or expression nesting accepted before parsing fails
pub const MAX_NESTING_DEPTH: usize = 128;

/// A parse failure located by byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Description of the problem
    pub message: String,
    /// Byte offset of the offending token
    pub offset: usize,
}

impl ParseError {
    /// 1-based line of the offending token within `source`
    pub fn line_in(&self, source: &str) -> usize {
        let end = self.offset.min(source.len());
        source.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// A recursive descent parser for module bodies.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Token,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self {
            scanner,
            current,
            depth: 0,
        }
    }

    /// Parses the source code into a Program AST node.
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        Ok(Program { body })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> ParseResult<Statement> {
        match &self.current.kind {
            TokenKind::Var | TokenKind::Let | TokenKind::Const => self.parse_variable_declaration(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::Function => self.parse_function_declaration(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::LeftBrace => self.parse_block_statement(),
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            _ => {
                let expression = self.parse_expression()?;
                self.consume_semicolon();
                Ok(Statement::Expression(expression))
            }
        }
    }

    fn parse_variable_declaration(&mut self) -> ParseResult<Statement> {
        let kind = match &self.current.kind {
            TokenKind::Var => VariableKind::Var,
            TokenKind::Let => VariableKind::Let,
            _ => VariableKind::Const,
        };
        self.advance();

        let mut declarations = Vec::new();

        loop {
            let id = self.expect_identifier()?;
            let init = if self.check(&TokenKind::Equal) {
                self.advance();
                Some(self.parse_expression()?)
            } else if kind == VariableKind::Const {
                return Err(self.error("Missing initializer in const declaration"));
            } else {
                None
            };

            declarations.push(VariableDeclarator { id, init });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        self.consume_semicolon();
        Ok(Statement::VariableDeclaration(VariableDeclaration {
            kind,
            declarations,
        }))
    }

    fn parse_if_statement(&mut self) -> ParseResult<Statement> {
        self.advance(); // consume 'if'
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;

        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.check(&TokenKind::Else) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
        }))
    }

    fn parse_throw_statement(&mut self) -> ParseResult<Statement> {
        self.advance(); // consume 'throw'
        let argument = self.parse_expression()?;
        self.consume_semicolon();
        Ok(Statement::Throw(argument))
    }

    fn parse_return_statement(&mut self) -> ParseResult<Statement> {
        self.advance(); // consume 'return'

        let argument = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RightBrace)
            || self.is_at_end()
        {
            None
        } else {
            Some(self.parse_expression()?)
        };

        self.consume_semicolon();
        Ok(Statement::Return(argument))
    }

    fn parse_try_statement(&mut self) -> ParseResult<Statement> {
        self.advance(); // consume 'try'

        let block = self.parse_block_body()?;

        let handler = if self.check(&TokenKind::Catch) {
            self.advance();
            let param = if self.check(&TokenKind::LeftParen) {
                self.advance();
                let name = self.expect_identifier()?;
                self.expect(&TokenKind::RightParen)?;
                Some(name)
            } else {
                None
            };
            let body = self.parse_block_body()?;
            Some(CatchClause { param, body })
        } else {
            None
        };

        let finalizer = if self.check(&TokenKind::Finally) {
            self.advance();
            Some(self.parse_block_body()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try"));
        }

        Ok(Statement::Try(TryStatement {
            block,
            handler,
            finalizer,
        }))
    }

    fn parse_function_declaration(&mut self) -> ParseResult<Statement> {
        let definition = self.parse_function()?;
        if definition.id.is_none() {
            return Err(self.error("Function statements require a function name"));
        }
        Ok(Statement::FunctionDeclaration(definition))
    }

    fn parse_function_expression(&mut self) -> ParseResult<Expression> {
        Ok(Expression::Function(self.parse_function()?))
    }

    /// `function name?(params) { body }`
    fn parse_function(&mut self) -> ParseResult<Arc<FunctionDefinition>> {
        self.advance(); // consume 'function'

        let id = match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        let params = self.parse_parameters()?;
        let body = self.parse_block_body()?;

        Ok(Arc::new(FunctionDefinition { id, params, body }))
    }

    fn parse_parameters(&mut self) -> ParseResult<Vec<String>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();

        while !self.check(&TokenKind::RightParen) {
            params.push(self.expect_identifier()?);
            if !self.check(&TokenKind::RightParen) {
                self.expect(&TokenKind::Comma)?;
            }
        }

        self.expect(&TokenKind::RightParen)?;
        Ok(params)
    }

    fn parse_block_statement(&mut self) -> ParseResult<Statement> {
        Ok(Statement::Block(self.parse_block_body()?))
    }

    fn parse_block_body(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(&TokenKind::LeftBrace)?;

        let mut body = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        self.expect(&TokenKind::RightBrace)?;
        Ok(body)
    }

    /// Parses an expression.
    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.nested(Self::parse_assignment)
    }

    fn parse_assignment(&mut self) -> ParseResult<Expression> {
        let start = self.current.start;
        let target = self.parse_logical_or()?;

        if self.check(&TokenKind::Equal) {
            if !target.is_assignment_target() {
                return Err(ParseError {
                    message: "Invalid left-hand side in assignment".to_string(),
                    offset: start,
                });
            }
            self.advance();
            let value = self.parse_expression()?;
            return Ok(Expression::Assignment {
                target: Box::new(target),
                value: Box::new(value),
            });
        }

        Ok(target)
    }

    fn parse_logical_or(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_logical_and()?;

        while self.check(&TokenKind::PipePipe) {
            self.advance();
            let right = self.parse_logical_and()?;
            left = Expression::Logical {
                operator: LogicalOperator::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_logical_and(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_equality()?;

        while self.check(&TokenKind::AmpersandAmpersand) {
            self.advance();
            let right = self.parse_equality()?;
            left = Expression::Logical {
                operator: LogicalOperator::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_comparison()?;

        loop {
            let operator = match &self.current.kind {
                TokenKind::EqualEqual => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                TokenKind::StrictEqual => BinaryOperator::StrictEqual,
                TokenKind::StrictNotEqual => BinaryOperator::StrictNotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_additive()?;

        loop {
            let operator = match &self.current.kind {
                TokenKind::LessThan => BinaryOperator::LessThan,
                TokenKind::LessThanEqual => BinaryOperator::LessThanEqual,
                TokenKind::GreaterThan => BinaryOperator::GreaterThan,
                TokenKind::GreaterThanEqual => BinaryOperator::GreaterThanEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let operator = match &self.current.kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            let operator = match &self.current.kind {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                TokenKind::Percent => BinaryOperator::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let operator = match &self.current.kind {
            TokenKind::Bang => UnaryOperator::Not,
            TokenKind::Minus => UnaryOperator::Minus,
            TokenKind::Plus => UnaryOperator::Plus,
            TokenKind::Typeof => UnaryOperator::Typeof,
            _ => return self.parse_call(),
        };
        self.advance();
        let argument = self.nested(Self::parse_unary)?;
        Ok(Expression::Unary {
            operator,
            argument: Box::new(argument),
        })
    }

    fn parse_call(&mut self) -> ParseResult<Expression> {
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary()?
        };

        loop {
            match &self.current.kind {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.expect_property_name()?;
                    expr = Expression::Member {
                        object: Box::new(expr),
                        property,
                    };
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RightBracket)?;
                    expr = Expression::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::LeftParen => {
                    let arguments = self.parse_arguments()?;
                    expr = Expression::Call {
                        callee: Box::new(expr),
                        arguments,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_new_expression(&mut self) -> ParseResult<Expression> {
        self.advance(); // consume 'new'

        let mut callee = self.parse_primary()?;
        while self.check(&TokenKind::Dot) {
            self.advance();
            let property = self.expect_property_name()?;
            callee = Expression::Member {
                object: Box::new(callee),
                property,
            };
        }

        let arguments = if self.check(&TokenKind::LeftParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };

        Ok(Expression::New {
            callee: Box::new(callee),
            arguments,
        })
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut arguments = Vec::new();

        while !self.check(&TokenKind::RightParen) {
            arguments.push(self.parse_expression()?);
            if !self.check(&TokenKind::RightParen) {
                self.expect(&TokenKind::Comma)?;
            }
        }

        self.expect(&TokenKind::RightParen)?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let expr = match &self.current.kind {
            TokenKind::Number(n) => Expression::Number(*n),
            TokenKind::String(s) => Expression::String(s.clone()),
            TokenKind::True => Expression::Boolean(true),
            TokenKind::False => Expression::Boolean(false),
            TokenKind::Null => Expression::Null,
            TokenKind::Identifier(name) => Expression::Identifier(name.clone()),
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(expr);
            }
            TokenKind::LeftBracket => return self.parse_array_literal(),
            TokenKind::LeftBrace => return self.parse_object_literal(),
            TokenKind::Function => return self.parse_function_expression(),
            TokenKind::Unsupported(word) => {
                return Err(self.error(format!("'{}' is not supported", word)))
            }
            TokenKind::Invalid(message) => return Err(self.error(message.clone())),
            TokenKind::Eof => return Err(self.error("Unexpected end of input")),
            other => return Err(self.error(format!("Unexpected token {:?}", other))),
        };
        self.advance();
        Ok(expr)
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expression> {
        self.expect(&TokenKind::LeftBracket)?;
        let mut elements = Vec::new();

        while !self.check(&TokenKind::RightBracket) {
            elements.push(self.parse_expression()?);
            if !self.check(&TokenKind::RightBracket) {
                self.expect(&TokenKind::Comma)?;
            }
        }

        self.expect(&TokenKind::RightBracket)?;
        Ok(Expression::Array(elements))
    }

    fn parse_object_literal(&mut self) -> ParseResult<Expression> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut properties = Vec::new();

        while !self.check(&TokenKind::RightBrace) {
            let shorthand = matches!(self.current.kind, TokenKind::Identifier(_));
            let key = match &self.current.kind {
                TokenKind::String(s) => {
                    let key = s.clone();
                    self.advance();
                    key
                }
                TokenKind::Number(n) => {
                    let key = crate::value::format_number(*n);
                    self.advance();
                    key
                }
                _ => self.expect_property_name()?,
            };

            let value = if shorthand && !self.check(&TokenKind::Colon) {
                Expression::Identifier(key.clone())
            } else {
                self.expect(&TokenKind::Colon)?;
                self.parse_expression()?
            };
            properties.push((key, value));

            if !self.check(&TokenKind::RightBrace) {
                self.expect(&TokenKind::Comma)?;
            }
        }

        self.expect(&TokenKind::RightBrace)?;
        Ok(Expression::Object(properties))
    }

    // Helper methods

    /// Run `parse` one nesting level deeper, failing past the limit
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error("Nesting is too deep"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn advance(&mut self) {
        self.current = self.scanner.next_token();
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "Expected {:?}, found {:?}",
                kind, self.current.kind
            )))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error(format!(
                "Expected identifier, found {:?}",
                self.current.kind
            )))
        }
    }

    /// Identifiers and reserved words are both valid after `.`
    fn expect_property_name(&mut self) -> ParseResult<String> {
        if let Some(word) = self.current.kind.keyword_text() {
            self.advance();
            return Ok(word.to_string());
        }
        self.expect_identifier()
    }

    fn consume_semicolon(&mut self) {
        if self.check(&TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            offset: self.current.start,
        }
    }
}

fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        Parser::new(source).parse_program().unwrap()
    }

    #[test]
    fn test_parse_variable_declarations() {
        let program = parse("const a = 1, b = 'x'; let c; var d = a");
        assert_eq!(program.body.len(), 3);
        match &program.body[0] {
            Statement::VariableDeclaration(decl) => {
                assert_eq!(decl.kind, VariableKind::Const);
                assert_eq!(decl.declarations.len(), 2);
                assert_eq!(decl.declarations[1].id, "b");
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_parse_member_assignment() {
        let program = parse("module.exports.value = require('./b').value;");
        match &program.body[0] {
            Statement::Expression(Expression::Assignment { target, value }) => {
                assert_eq!(target.describe(), "module.exports.value");
                assert!(matches!(**value, Expression::Member { .. }));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let program = parse("1 + 2 * 3 === 7 && !false");
        let Statement::Expression(Expression::Logical { left, .. }) = &program.body[0] else {
            panic!("expected logical expression");
        };
        let Expression::Binary { operator, left, .. } = &**left else {
            panic!("expected equality");
        };
        assert_eq!(*operator, BinaryOperator::StrictEqual);
        assert!(matches!(
            **left,
            Expression::Binary {
                operator: BinaryOperator::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_object_literal_forms() {
        let program = parse("x = { a: 1, 'b-c': 2, 3: 4, short, default: 5, };");
        let Statement::Expression(Expression::Assignment { value, .. }) = &program.body[0] else {
            panic!("expected assignment");
        };
        let Expression::Object(props) = &**value else {
            panic!("expected object literal");
        };
        let keys: Vec<&str> = props.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b-c", "3", "short", "default"]);
        assert_eq!(props[3].1, Expression::Identifier("short".into()));
    }

    #[test]
    fn test_if_else_and_throw() {
        let program = parse("if (a) { throw new Error('x') } else b = 1");
        let Statement::If(stmt) = &program.body[0] else {
            panic!("expected if");
        };
        assert!(matches!(*stmt.consequent, Statement::Block(_)));
        assert!(stmt.alternate.is_some());
    }

    #[test]
    fn test_syntax_error_location() {
        let source = "const a = 1;\nconst b = ;\n";
        let err = Parser::new(source).parse_program().unwrap_err();
        assert_eq!(err.line_in(source), 2);

        let err = Parser::new("1 = 2").parse_program().unwrap_err();
        assert!(err.message.contains("left-hand side"));

        let err = Parser::new("class A {}").parse_program().unwrap_err();
        assert!(err.message.contains("not supported"));

        let err = Parser::new("function () {}").parse_program().unwrap_err();
        assert!(err.message.contains("require a function name"));

        let err = Parser::new("try { a() }").parse_program().unwrap_err();
        assert!(err.message.contains("catch or finally"));
    }

    #[test]
    fn test_function_forms() {
        let program = parse(
            "function add(a, b) { return a + b }\n\
             module.exports = function (x) { return; };",
        );
        let Statement::FunctionDeclaration(definition) = &program.body[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(definition.id.as_deref(), Some("add"));
        assert_eq!(definition.params, vec!["a", "b"]);
        assert!(matches!(definition.body[0], Statement::Return(Some(_))));

        let Statement::Expression(Expression::Assignment { value, .. }) = &program.body[1] else {
            panic!("expected assignment");
        };
        let Expression::Function(definition) = &**value else {
            panic!("expected function expression");
        };
        assert_eq!(definition.id, None);
        assert_eq!(definition.body, vec![Statement::Return(None)]);
    }

    #[test]
    fn test_try_catch_finally() {
        let program = parse("try { a() } catch (e) { b(e) } finally { c() }\ntry {} catch {}");
        let Statement::Try(stmt) = &program.body[0] else {
            panic!("expected try");
        };
        assert_eq!(stmt.block.len(), 1);
        assert_eq!(stmt.handler.as_ref().and_then(|h| h.param.as_deref()), Some("e"));
        assert!(stmt.finalizer.is_some());

        let Statement::Try(stmt) = &program.body[1] else {
            panic!("expected try");
        };
        assert_eq!(stmt.handler.as_ref().map(|h| h.param.clone()), Some(None));
        assert!(stmt.finalizer.is_none());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let source = format!("x = {}1{}", "(".repeat(10_000), ")".repeat(10_000));
        let err = Parser::new(&source).parse_program().unwrap_err();
        assert!(err.message.contains("too deep"));

        let source = format!("x = {}1", "!".repeat(10_000));
        assert!(Parser::new(&source).parse_program().is_err());

        let source = format!("{}{}", "{".repeat(10_000), "}".repeat(10_000));
        assert!(Parser::new(&source).parse_program().is_err());

        let source = format!("x = {}1{}", "(".repeat(20), ")".repeat(20));
        assert!(Parser::new(&source).parse_program().is_ok());
    }
}
