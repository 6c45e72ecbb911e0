// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Syntax tree for module bodies.

use std::sync::Arc;

/// A parsed module body.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// The statements in the program
    pub body: Vec<Statement>,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Variable declaration (var, let, const)
    VariableDeclaration(VariableDeclaration),
    /// Expression statement
    Expression(Expression),
    /// Block statement { ... }
    Block(Vec<Statement>),
    /// If statement
    If(IfStatement),
    /// Throw statement
    Throw(Expression),
    /// Function declaration, hoisted to the top of its body
    FunctionDeclaration(Arc<FunctionDefinition>),
    /// Return statement
    Return(Option<Expression>),
    /// Try statement
    Try(TryStatement),
    /// Empty statement (;)
    Empty,
}

/// Variable declaration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// var declaration
    Var,
    /// let declaration
    Let,
    /// const declaration
    Const,
}

/// A variable declaration statement.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    /// The kind of declaration
    pub kind: VariableKind,
    /// The declarators
    pub declarations: Vec<VariableDeclarator>,
}

/// A single variable declarator.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclarator {
    /// The bound name
    pub id: String,
    /// The initializer
    pub init: Option<Expression>,
}

/// An if statement.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    /// The test expression
    pub test: Expression,
    /// The consequent
    pub consequent: Box<Statement>,
    /// The alternate
    pub alternate: Option<Box<Statement>>,
}

/// A function declaration or expression.
///
/// Shared behind an `Arc` so every closure created from it points at the
/// same parsed body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    /// The function name, required for declarations
    pub id: Option<String>,
    /// The parameter names
    pub params: Vec<String>,
    /// The body
    pub body: Vec<Statement>,
}

/// A try statement.
#[derive(Debug, Clone, PartialEq)]
pub struct TryStatement {
    /// The protected block
    pub block: Vec<Statement>,
    /// The catch clause
    pub handler: Option<CatchClause>,
    /// The finally block
    pub finalizer: Option<Vec<Statement>>,
}

/// A catch clause.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// The bound parameter, optional (`catch { ... }`)
    pub param: Option<String>,
    /// The body
    pub body: Vec<Statement>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Number literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// null
    Null,
    /// Identifier reference
    Identifier(String),
    /// Array literal
    Array(Vec<Expression>),
    /// Object literal
    Object(Vec<(String, Expression)>),
    /// Function expression
    Function(Arc<FunctionDefinition>),
    /// `object.property`
    Member {
        /// The object
        object: Box<Expression>,
        /// The property name
        property: String,
    },
    /// `object[index]`
    Index {
        /// The object
        object: Box<Expression>,
        /// The computed key
        index: Box<Expression>,
    },
    /// Function call
    Call {
        /// The callee
        callee: Box<Expression>,
        /// The arguments
        arguments: Vec<Expression>,
    },
    /// `new` expression
    New {
        /// The constructor
        callee: Box<Expression>,
        /// The arguments
        arguments: Vec<Expression>,
    },
    /// Unary expression
    Unary {
        /// The operator
        operator: UnaryOperator,
        /// The operand
        argument: Box<Expression>,
    },
    /// Binary expression
    Binary {
        /// The operator
        operator: BinaryOperator,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
    },
    /// Short-circuit logical expression
    Logical {
        /// The operator
        operator: LogicalOperator,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
    },
    /// Assignment to an identifier, member, or index target
    Assignment {
        /// The target
        target: Box<Expression>,
        /// The assigned value
        value: Box<Expression>,
    },
}

impl Expression {
    /// Whether the expression can appear on the left of `=`
    pub fn is_assignment_target(&self) -> bool {
        matches!(
            self,
            Expression::Identifier(_) | Expression::Member { .. } | Expression::Index { .. }
        )
    }

    /// Short source-like rendering used in error messages (`a.b`, `a[...]`)
    pub fn describe(&self) -> String {
        match self {
            Expression::Identifier(name) => name.clone(),
            Expression::Member { object, property } => {
                format!("{}.{}", object.describe(), property)
            }
            Expression::Index { object, .. } => format!("{}[...]", object.describe()),
            Expression::Call { callee, .. } => format!("{}(...)", callee.describe()),
            Expression::String(s) => format!("\"{}\"", s),
            Expression::Number(n) => crate::value::format_number(*n),
            Expression::Function(definition) => match &definition.id {
                Some(name) => format!("function {}", name),
                None => "function".to_string(),
            },
            _ => "expression".to_string(),
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// +
    Plus,
    /// !
    Not,
    /// typeof
    Typeof,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// +
    Add,
    /// -
    Subtract,
    /// *
    Multiply,
    /// /
    Divide,
    /// %
    Modulo,
    /// ==
    Equal,
    /// !=
    NotEqual,
    /// ===
    StrictEqual,
    /// !==
    StrictNotEqual,
    /// <
    LessThan,
    /// <=
    LessThanEqual,
    /// >
    GreaterThan,
    /// >=
    GreaterThanEqual,
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    /// &&
    And,
    /// ||
    Or,
}
