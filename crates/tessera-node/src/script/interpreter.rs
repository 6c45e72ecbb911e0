// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Tree-walking evaluator for parsed module bodies.

use super::ast::*;
use super::environment::Environment;
use super::globals::{create_globals, error_value, make_error};
use super::parser::Parser;
use super::{CompiledUnit, ModuleScope, ScriptEngine};
use crate::error::{LoaderError, Result};
use crate::value::{format_number, HostObject, ObjectRef, Value};
use std::cell::Cell;
use std::cmp::Ordering;
use std::sync::Arc;

/// Deepest nesting of script function calls on one thread
pub const MAX_CALL_DEPTH: usize = 128;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// The default script engine
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter;

impl Interpreter {
    /// Create a new interpreter
    pub fn new() -> Self {
        Self
    }
}

impl ScriptEngine for Interpreter {
    fn compile(&self, source: &str, filename: &str) -> Result<Box<dyn CompiledUnit>> {
        let program = Parser::new(source)
            .parse_program()
            .map_err(|e| LoaderError::Syntax {
                filename: filename.to_string(),
                line: e.line_in(source),
                message: e.message,
            })?;
        Ok(Box::new(CompiledProgram { program }))
    }
}

struct CompiledProgram {
    program: Program,
}

impl CompiledUnit for CompiledProgram {
    fn invoke(&self, scope: ModuleScope) -> Result<Value> {
        let mut env = Environment::with_globals(create_globals());
        env.push_function_scope();
        for (name, value) in scope.into_bindings() {
            env.declare_var(name, Some(value));
        }

        let mut evaluator = Evaluator { env };
        evaluator.hoist_functions(&self.program.body);
        // A top-level `return` ends the module body
        Ok(match evaluator.execute_all(&self.program.body)? {
            Completion::Normal(value) => value.unwrap_or_default(),
            Completion::Return(value) => value,
        })
    }
}

/// How a statement finished.
enum Completion {
    /// Ran to the end, with the value of the last expression statement
    Normal(Option<Value>),
    /// Hit a `return`
    Return(Value),
}

/// A function defined in script code, closed over its defining scopes.
struct ScriptFunction {
    definition: Arc<FunctionDefinition>,
    closure: Environment,
    /// Properties assigned to the function (`module.exports.helper = ...`)
    properties: ObjectRef,
}

impl HostObject for ScriptFunction {
    fn class_name(&self) -> &str {
        self.definition.id.as_deref().unwrap_or("anonymous")
    }

    fn get(&self, key: &str) -> Result<Value> {
        if let Some(value) = self.properties.get(key) {
            return Ok(value);
        }
        Ok(match key {
            "name" => Value::string(self.definition.id.clone().unwrap_or_default()),
            "length" => Value::Number(self.definition.params.len() as f64),
            _ => Value::Undefined,
        })
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.properties.set(key, value);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys()
    }

    fn call(&self, args: &[Value]) -> Result<Value> {
        let _depth = CallDepth::enter()?;

        let mut env = self.closure.clone();
        env.push_function_scope();
        env.declare_var("arguments", Some(Value::array(args.to_vec())));
        for (index, param) in self.definition.params.iter().enumerate() {
            env.declare_var(param, Some(args.get(index).cloned().unwrap_or_default()));
        }

        let mut evaluator = Evaluator { env };
        evaluator.hoist_functions(&self.definition.body);
        match evaluator.execute_all(&self.definition.body)? {
            Completion::Return(value) => Ok(value),
            Completion::Normal(_) => Ok(Value::Undefined),
        }
    }

    fn is_callable(&self) -> bool {
        true
    }
}

/// Counts nested script calls on this thread while alive.
struct CallDepth;

impl CallDepth {
    fn enter() -> Result<Self> {
        CALL_DEPTH.with(|depth| {
            if depth.get() >= MAX_CALL_DEPTH {
                return Err(LoaderError::Thrown(make_error(
                    "RangeError",
                    "Maximum call stack size exceeded",
                )));
            }
            depth.set(depth.get() + 1);
            Ok(CallDepth)
        })
    }
}

impl Drop for CallDepth {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

struct Evaluator {
    env: Environment,
}

impl Evaluator {
    /// Runs statements in order; the result is the last expression value
    fn execute_all(&mut self, body: &[Statement]) -> Result<Completion> {
        let mut completion = None;
        for statement in body {
            match self.execute(statement)? {
                Completion::Normal(Some(value)) => completion = Some(value),
                Completion::Normal(None) => {}
                Completion::Return(value) => return Ok(Completion::Return(value)),
            }
        }
        Ok(Completion::Normal(completion))
    }

    /// Binds every function declaration in `body` before it runs
    fn hoist_functions(&mut self, body: &[Statement]) {
        for statement in body {
            if let Statement::FunctionDeclaration(definition) = statement {
                if let Some(name) = &definition.id {
                    let function = self.create_function(definition);
                    self.env.declare_var(name, Some(function));
                }
            }
        }
    }

    fn create_function(&self, definition: &Arc<FunctionDefinition>) -> Value {
        Value::Host(Arc::new(ScriptFunction {
            definition: Arc::clone(definition),
            closure: self.env.clone(),
            properties: ObjectRef::new(),
        }))
    }

    fn execute_block(&mut self, body: &[Statement]) -> Result<Completion> {
        self.env.push_scope();
        self.hoist_functions(body);
        let result = self.execute_all(body);
        self.env.pop_scope();
        result
    }

    fn execute_try(&mut self, stmt: &TryStatement) -> Result<Completion> {
        let result = match self.execute_block(&stmt.block) {
            Err(error) => match &stmt.handler {
                Some(handler) => self.execute_catch(handler, error_value(&error)),
                None => Err(error),
            },
            completed => completed,
        };

        match &stmt.finalizer {
            Some(finalizer) => match self.execute_block(finalizer)? {
                // A return inside finally replaces the outcome of the try
                Completion::Return(value) => Ok(Completion::Return(value)),
                Completion::Normal(_) => result,
            },
            None => result,
        }
    }

    fn execute_catch(&mut self, handler: &CatchClause, thrown: Value) -> Result<Completion> {
        self.env.push_scope();
        let result = match &handler.param {
            Some(param) => self.env.declare_lexical(param, thrown, true),
            None => Ok(()),
        }
        .and_then(|()| {
            self.hoist_functions(&handler.body);
            self.execute_all(&handler.body)
        });
        self.env.pop_scope();
        result
    }

    fn execute(&mut self, statement: &Statement) -> Result<Completion> {
        match statement {
            Statement::VariableDeclaration(decl) => {
                for declarator in &decl.declarations {
                    let value = match &declarator.init {
                        Some(init) => Some(self.evaluate(init)?),
                        None => None,
                    };
                    match decl.kind {
                        VariableKind::Var => self.env.declare_var(&declarator.id, value),
                        VariableKind::Let => {
                            self.env
                                .declare_lexical(&declarator.id, value.unwrap_or_default(), true)?
                        }
                        VariableKind::Const => {
                            self.env
                                .declare_lexical(&declarator.id, value.unwrap_or_default(), false)?
                        }
                    }
                }
                Ok(Completion::Normal(None))
            }
            Statement::Expression(expr) => Ok(Completion::Normal(Some(self.evaluate(expr)?))),
            Statement::Block(body) => self.execute_block(body),
            Statement::If(stmt) => {
                if self.evaluate(&stmt.test)?.truthy() {
                    self.execute(&stmt.consequent)
                } else if let Some(alternate) = &stmt.alternate {
                    self.execute(alternate)
                } else {
                    Ok(Completion::Normal(None))
                }
            }
            Statement::Throw(argument) => Err(LoaderError::Thrown(self.evaluate(argument)?)),
            // Bound by hoisting
            Statement::FunctionDeclaration(_) => Ok(Completion::Normal(None)),
            Statement::Return(argument) => {
                let value = match argument {
                    Some(argument) => self.evaluate(argument)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::Try(stmt) => self.execute_try(stmt),
            Statement::Empty => Ok(Completion::Normal(None)),
        }
    }

    fn evaluate(&mut self, expr: &Expression) -> Result<Value> {
        match expr {
            Expression::Number(n) => Ok(Value::Number(*n)),
            Expression::String(s) => Ok(Value::String(s.clone())),
            Expression::Boolean(b) => Ok(Value::Boolean(*b)),
            Expression::Null => Ok(Value::Null),
            Expression::Identifier(name) => self
                .env
                .get(name)
                .ok_or_else(|| LoaderError::reference_error(format!("{} is not defined", name))),
            Expression::Array(elements) => {
                let values = elements
                    .iter()
                    .map(|element| self.evaluate(element))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::array(values))
            }
            Expression::Object(properties) => {
                let object = ObjectRef::new();
                for (key, value) in properties {
                    let value = self.evaluate(value)?;
                    object.set(key.clone(), value);
                }
                Ok(Value::Object(object))
            }
            Expression::Function(definition) => match &definition.id {
                // The name of a function expression is visible only inside it
                Some(name) => {
                    self.env.push_scope();
                    let function = self.create_function(definition);
                    let declared = self.env.declare_lexical(name, function.clone(), false);
                    self.env.pop_scope();
                    declared.map(|()| function)
                }
                None => Ok(self.create_function(definition)),
            },
            Expression::Member { object, property } => {
                let target = self.evaluate(object)?;
                get_property(&target, property)
            }
            Expression::Index { object, index } => {
                let target = self.evaluate(object)?;
                let key = property_key(&self.evaluate(index)?);
                get_property(&target, &key)
            }
            Expression::Call { callee, arguments } | Expression::New { callee, arguments } => {
                let function = self.evaluate(callee)?;
                let args = arguments
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>>>()?;
                match &function {
                    Value::Host(host) if host.is_callable() => host.call(&args),
                    _ => Err(LoaderError::type_error(format!(
                        "{} is not a function",
                        callee.describe()
                    ))),
                }
            }
            Expression::Unary { operator, argument } => {
                // typeof tolerates undeclared identifiers
                if let (UnaryOperator::Typeof, Expression::Identifier(name)) =
                    (operator, argument.as_ref())
                {
                    if self.env.get(name).is_none() {
                        return Ok(Value::string("undefined"));
                    }
                }
                let value = self.evaluate(argument)?;
                Ok(match operator {
                    UnaryOperator::Not => Value::Boolean(!value.truthy()),
                    UnaryOperator::Minus => Value::Number(-value.to_number()),
                    UnaryOperator::Plus => Value::Number(value.to_number()),
                    UnaryOperator::Typeof => Value::string(value.type_of()),
                })
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(binary_op(*operator, &left, &right))
            }
            Expression::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                let short_circuit = match operator {
                    LogicalOperator::And => !left.truthy(),
                    LogicalOperator::Or => left.truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            Expression::Assignment { target, value } => self.evaluate_assignment(target, value),
        }
    }

    /// The target's object and key are evaluated before the right-hand side
    fn evaluate_assignment(&mut self, target: &Expression, value: &Expression) -> Result<Value> {
        match target {
            Expression::Identifier(name) => {
                let value = self.evaluate(value)?;
                self.env.assign(name, value.clone())?;
                Ok(value)
            }
            Expression::Member { object, property } => {
                let target = self.evaluate(object)?;
                let value = self.evaluate(value)?;
                set_property(&target, property, value.clone())?;
                Ok(value)
            }
            Expression::Index { object, index } => {
                let target = self.evaluate(object)?;
                let key = property_key(&self.evaluate(index)?);
                let value = self.evaluate(value)?;
                set_property(&target, &key, value.clone())?;
                Ok(value)
            }
            _ => Err(LoaderError::reference_error(
                "Invalid left-hand side in assignment",
            )),
        }
    }
}

fn property_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(*n),
        other => other.to_string(),
    }
}

fn get_property(target: &Value, key: &str) -> Result<Value> {
    match target {
        Value::Object(object) => Ok(object.get(key).unwrap_or_default()),
        Value::Array(array) => Ok(match key {
            "length" => Value::Number(array.len() as f64),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| array.get(i))
                .unwrap_or_default(),
        }),
        Value::String(s) => Ok(match key {
            "length" => Value::Number(s.encode_utf16().count() as f64),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| s.encode_utf16().nth(i))
                .map(|unit| Value::String(String::from_utf16_lossy(&[unit])))
                .unwrap_or_default(),
        }),
        Value::Host(host) => host.get(key),
        Value::Undefined | Value::Null => Err(LoaderError::type_error(format!(
            "Cannot read properties of {} (reading '{}')",
            target, key
        ))),
        Value::Boolean(_) | Value::Number(_) => Ok(Value::Undefined),
    }
}

fn set_property(target: &Value, key: &str, value: Value) -> Result<()> {
    match target {
        Value::Object(object) => {
            object.set(key, value);
            Ok(())
        }
        Value::Array(array) => match key.parse::<usize>() {
            Ok(index) => array.set(index, value),
            Err(_) => Err(LoaderError::type_error(format!(
                "Cannot set property '{}' of an array",
                key
            ))),
        },
        Value::Host(host) => host.set(key, value),
        Value::Undefined | Value::Null => Err(LoaderError::type_error(format!(
            "Cannot set properties of {} (setting '{}')",
            target, key
        ))),
        // Writes to primitives are dropped
        Value::Boolean(_) | Value::Number(_) | Value::String(_) => Ok(()),
    }
}

fn binary_op(operator: BinaryOperator, left: &Value, right: &Value) -> Value {
    match operator {
        BinaryOperator::Add => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            _ if concatenates(left) || concatenates(right) => {
                Value::String(format!("{}{}", left, right))
            }
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOperator::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Divide => Value::Number(left.to_number() / right.to_number()),
        BinaryOperator::Modulo => Value::Number(left.to_number() % right.to_number()),
        BinaryOperator::Equal => Value::Boolean(left.loose_equals(right)),
        BinaryOperator::NotEqual => Value::Boolean(!left.loose_equals(right)),
        BinaryOperator::StrictEqual => Value::Boolean(left.strict_equals(right)),
        BinaryOperator::StrictNotEqual => Value::Boolean(!left.strict_equals(right)),
        BinaryOperator::LessThan => Value::Boolean(compare(left, right) == Some(Ordering::Less)),
        BinaryOperator::LessThanEqual => Value::Boolean(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOperator::GreaterThan => {
            Value::Boolean(compare(left, right) == Some(Ordering::Greater))
        }
        BinaryOperator::GreaterThanEqual => Value::Boolean(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
    }
}

/// Operands whose primitive form is a string
fn concatenates(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Host(_)
    )
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}
