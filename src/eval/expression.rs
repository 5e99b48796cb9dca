use std::sync::Arc;

use async_recursion::async_recursion;

use super::{
    context::Scope,
    evaluator::{EvalError, EvalResult, Evaluator},
    value::{
        format_number, repeat_string, Dict, Function, Value, MAX_ARRAY_LENGTH, NAMED_ARGS_KEY,
    },
};
use crate::ast::{
    Argument, AssignOperator, BinaryOperator, Expression, InterpolationPart, Literal,
    UnaryOperator, UpdateOperator,
};

/// A resolved assignment target.
enum Place {
    Variable(String),
    Member(Value, String),
    Index(Value, Value),
}

impl Evaluator {
    #[async_recursion]
    pub async fn eval_expression(
        &self,
        expression: &Expression,
        scope: &Arc<Scope>,
    ) -> EvalResult<Value> {
        self.check_timeout()?;

        match expression {
            Expression::Literal(literal) => Ok(eval_literal(literal)),
            Expression::Identifier(name) => scope
                .lookup(name)
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
            Expression::Binary { op, left, right } => {
                // both sides are always evaluated, including for && and ||
                let left = self.eval_expression(left, scope).await?;
                let right = self.eval_expression(right, scope).await?;
                binary_operation(*op, &left, &right)
            }
            Expression::Unary { op, operand } => {
                let operand = self.eval_expression(operand, scope).await?;
                unary_operation(*op, &operand)
            }
            Expression::Assign { op, target, value } => {
                self.eval_assign(*op, target, value, scope).await
            }
            Expression::Update { op, prefix, target } => {
                self.eval_update(*op, *prefix, target, scope).await
            }
            Expression::Call { callee, arguments } => {
                let function = match self.eval_expression(callee, scope).await? {
                    Value::Function(function) => function,
                    _ => return Err(EvalError::NotCallable(callee.to_string())),
                };
                let arguments = self.eval_arguments(arguments, scope).await?;
                self.call_function(&function, arguments).await
            }
            Expression::Member { object, property } => {
                let object = self.eval_expression(object, scope).await?;
                self.get_member(&object, property)
            }
            Expression::Index { object, index } => {
                let object = self.eval_expression(object, scope).await?;
                let index = self.eval_expression(index, scope).await?;
                self.get_index(&object, &index)
            }
            Expression::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expression(item, scope).await?);
                }
                Ok(Value::array(values))
            }
            Expression::Dict(entries) => {
                let mut dict = Dict::new();
                for (key, value) in entries {
                    let value = self.eval_expression(value, scope).await?;
                    dict.insert(key.clone(), value);
                }
                Ok(Value::object(dict))
            }
            Expression::Lambda(def) => Ok(Value::function(Function::user(
                def.clone(),
                scope.clone(),
            ))),
            Expression::Interpolation(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        InterpolationPart::Literal(literal) => text.push_str(literal),
                        InterpolationPart::Expression(expression) => {
                            let value = self.eval_expression(expression, scope).await?;
                            text.push_str(&value.to_string());
                        }
                    }
                }
                Ok(Value::String(text))
            }
            Expression::Ternary {
                condition,
                consequent,
                alternate,
            } => {
                if self.eval_expression(condition, scope).await?.is_truthy() {
                    self.eval_expression(consequent, scope).await
                } else {
                    self.eval_expression(alternate, scope).await
                }
            }
            // every evaluation step is already awaited
            Expression::Await(inner) => self.eval_expression(inner, scope).await,
        }
    }

    /// Positional values in order, then a trailing `__named__` dict when the
    /// call site used `name: value` arguments.
    pub async fn eval_arguments(
        &self,
        arguments: &[Argument],
        scope: &Arc<Scope>,
    ) -> EvalResult<Vec<Value>> {
        let mut positional = Vec::with_capacity(arguments.len());
        let mut named = Dict::new();
        for argument in arguments {
            match argument {
                Argument::Positional(expression) => {
                    positional.push(self.eval_expression(expression, scope).await?);
                }
                Argument::Named { name, value } => {
                    let value = self.eval_expression(value, scope).await?;
                    named.insert(name.clone(), value);
                }
            }
        }
        if !named.is_empty() {
            named.insert(NAMED_ARGS_KEY, Value::Boolean(true));
            positional.push(Value::object(named));
        }
        Ok(positional)
    }

    async fn eval_assign(
        &self,
        op: AssignOperator,
        target: &Expression,
        value: &Expression,
        scope: &Arc<Scope>,
    ) -> EvalResult<Value> {
        let place = self.resolve_place(target, scope).await?;
        let value = match op.binary_operator() {
            None => self.eval_expression(value, scope).await?,
            Some(operator) => {
                let current = self.read_place(&place, scope)?;
                let value = self.eval_expression(value, scope).await?;
                binary_operation(operator, &current, &value)?
            }
        };
        self.write_place(place, value.clone(), scope)?;
        Ok(value)
    }

    async fn eval_update(
        &self,
        op: UpdateOperator,
        prefix: bool,
        target: &Expression,
        scope: &Arc<Scope>,
    ) -> EvalResult<Value> {
        let place = self.resolve_place(target, scope).await?;
        let current = self.read_place(&place, scope)?;
        let old = current.as_number().ok_or_else(|| {
            EvalError::type_error(format!("Cannot increment or decrement a {}", current.type_name()))
        })?;
        let new = match op {
            UpdateOperator::Increment => old + 1.0,
            UpdateOperator::Decrement => old - 1.0,
        };
        self.write_place(place, Value::Number(new), scope)?;
        Ok(Value::Number(if prefix { new } else { old }))
    }

    async fn resolve_place(&self, target: &Expression, scope: &Arc<Scope>) -> EvalResult<Place> {
        match target {
            Expression::Identifier(name) => Ok(Place::Variable(name.clone())),
            Expression::Member { object, property } => Ok(Place::Member(
                self.eval_expression(object, scope).await?,
                property.clone(),
            )),
            Expression::Index { object, index } => {
                let object = self.eval_expression(object, scope).await?;
                let index = self.eval_expression(index, scope).await?;
                Ok(Place::Index(object, index))
            }
            other => Err(EvalError::type_error(format!(
                "Invalid assignment target: {}",
                other.kind()
            ))),
        }
    }

    fn read_place(&self, place: &Place, scope: &Arc<Scope>) -> EvalResult<Value> {
        match place {
            Place::Variable(name) => scope
                .lookup(name)
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
            Place::Member(object, property) => self.get_member(object, property),
            Place::Index(object, index) => self.get_index(object, index),
        }
    }

    fn write_place(&self, place: Place, value: Value, scope: &Arc<Scope>) -> EvalResult<()> {
        match place {
            Place::Variable(name) => {
                if let Err(value) = scope.assign(&name, value) {
                    // undeclared names become globals
                    self.globals().declare(name, value);
                }
                Ok(())
            }
            Place::Member(object, property) => set_property(&object, property, value),
            Place::Index(object, index) => match (&object, &index) {
                (Value::Array(items), Value::Number(n)) => {
                    let position = array_position(*n)?;
                    let mut items = items.write();
                    if position >= items.len() {
                        if position >= MAX_ARRAY_LENGTH {
                            return Err(EvalError::runtime("Invalid array length"));
                        }
                        items.resize(position + 1, Value::Null);
                    }
                    items[position] = value;
                    Ok(())
                }
                (Value::Array(_), other) => Err(EvalError::type_error(format!(
                    "Array index must be a number, got {}",
                    other.type_name()
                ))),
                _ => set_property(&object, property_key(&index), value),
            },
        }
    }

    /// `object.property`. Functions stored on a dict come back bound to it;
    /// other receivers fall back to the builtin of the same name.
    pub fn get_member(&self, object: &Value, property: &str) -> EvalResult<Value> {
        match object {
            Value::Null => Err(EvalError::type_error(format!(
                "Cannot read property '{}' of null",
                property
            ))),
            Value::Object(dict) => {
                let value = dict.read().get(property).cloned();
                Ok(match value {
                    Some(Value::Function(function)) if function.is_user() => {
                        Value::function(function.bind(object.clone()))
                    }
                    Some(value) => value,
                    None => Value::Null,
                })
            }
            Value::Array(items) if property == "length" => Ok(Value::from(items.read().len())),
            Value::String(s) if property == "length" => Ok(Value::from(s.chars().count())),
            Value::Function(function) if property == "name" => {
                Ok(Value::from(function.name.as_str()))
            }
            Value::Function(_) => Ok(Value::Null),
            _ => Ok(match self.builtin(property) {
                Some(Value::Function(function)) if function.is_native() => {
                    Value::function(function.bind(object.clone()))
                }
                _ => Value::Null,
            }),
        }
    }

    pub fn get_index(&self, object: &Value, index: &Value) -> EvalResult<Value> {
        match (object, index) {
            (Value::Null, _) => Err(EvalError::type_error(format!(
                "Cannot read index '{}' of null",
                index
            ))),
            (Value::Array(items), Value::Number(n)) => {
                if n.fract() != 0.0 || *n < 0.0 {
                    return Ok(Value::Null);
                }
                Ok(items.read().get(*n as usize).cloned().unwrap_or_default())
            }
            (Value::String(s), Value::Number(n)) => {
                if n.fract() != 0.0 || *n < 0.0 {
                    return Ok(Value::Null);
                }
                Ok(s.chars()
                    .nth(*n as usize)
                    .map(|c| Value::from(c.to_string()))
                    .unwrap_or_default())
            }
            (_, key) => self.get_member(object, &property_key(key)),
        }
    }
}

fn eval_literal(literal: &Literal) -> Value {
    match literal {
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Null => Value::Null,
    }
}

fn property_key(index: &Value) -> String {
    match index {
        Value::Number(n) => format_number(*n),
        other => other.to_string(),
    }
}

fn array_position(n: f64) -> EvalResult<usize> {
    if n.fract() != 0.0 || n < 0.0 {
        return Err(EvalError::type_error(format!("Invalid array index {}", n)));
    }
    Ok(n as usize)
}

fn set_property(object: &Value, property: String, value: Value) -> EvalResult<()> {
    match object {
        Value::Object(dict) => {
            dict.write().insert(property, value);
            Ok(())
        }
        Value::Null => Err(EvalError::type_error(format!(
            "Cannot set property '{}' of null",
            property
        ))),
        other => Err(EvalError::type_error(format!(
            "Cannot set property '{}' on {}",
            property,
            other.type_name()
        ))),
    }
}

fn numeric_operands(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<(f64, f64)> {
    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(EvalError::type_error(format!(
            "Cannot apply '{}' to {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))),
    }
}

pub fn binary_operation(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<Value> {
    match op {
        BinaryOperator::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", left, right)))
            }
            _ => {
                let (l, r) = numeric_operands(op, left, right)?;
                Ok(Value::Number(l + r))
            }
        },
        BinaryOperator::Multiply => match (left, right) {
            (Value::String(s), Value::Number(n)) => {
                Ok(Value::String(repeat_string(s, n.max(0.0).floor() as usize)?))
            }
            _ => {
                let (l, r) = numeric_operands(op, left, right)?;
                Ok(Value::Number(l * r))
            }
        },
        BinaryOperator::Subtract => {
            let (l, r) = numeric_operands(op, left, right)?;
            Ok(Value::Number(l - r))
        }
        BinaryOperator::Divide => {
            let (l, r) = numeric_operands(op, left, right)?;
            Ok(Value::Number(l / r))
        }
        BinaryOperator::Modulo => {
            let (l, r) = numeric_operands(op, left, right)?;
            Ok(Value::Number(l % r))
        }
        BinaryOperator::Equal => Ok(Value::Boolean(left.strict_equals(right))),
        BinaryOperator::NotEqual => Ok(Value::Boolean(!left.strict_equals(right))),
        BinaryOperator::LessThan => Ok(Value::Boolean(compare(left, right, |o| o.is_lt()))),
        BinaryOperator::GreaterThan => Ok(Value::Boolean(compare(left, right, |o| o.is_gt()))),
        BinaryOperator::LessThanEqual => Ok(Value::Boolean(compare(left, right, |o| o.is_le()))),
        BinaryOperator::GreaterThanEqual => {
            Ok(Value::Boolean(compare(left, right, |o| o.is_ge())))
        }
        BinaryOperator::And => Ok(Value::Boolean(left.is_truthy() && right.is_truthy())),
        BinaryOperator::Or => Ok(Value::Boolean(left.is_truthy() || right.is_truthy())),
    }
}

fn compare<F>(left: &Value, right: &Value, test: F) -> bool
where
    F: Fn(std::cmp::Ordering) -> bool,
{
    let ordering = match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.partial_cmp(r),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    };
    ordering.is_some_and(test)
}

fn unary_operation(op: UnaryOperator, operand: &Value) -> EvalResult<Value> {
    match op {
        UnaryOperator::Not => Ok(Value::Boolean(!operand.is_truthy())),
        UnaryOperator::Negate => operand
            .as_number()
            .map(|n| Value::Number(-n))
            .ok_or_else(|| EvalError::type_error(format!("Cannot negate {}", operand.type_name()))),
        UnaryOperator::Plus => match operand {
            Value::String(s) => Ok(Value::Number(s.trim().parse().unwrap_or(f64::NAN))),
            other => other.as_number().map(Value::Number).ok_or_else(|| {
                EvalError::type_error(format!("Cannot convert {} to number", other.type_name()))
            }),
        },
    }
}
