use super::{BinaryOp, Expression, UnaryOp, Value};
use crate::error::EvaluationError;
use std::cmp::Ordering;

/// Upper bound on the number of elements `range()` may produce.
const MAX_RANGE_LEN: usize = 1 << 20;

/// Supplies values for the names an expression refers to.
pub trait Resolver {
    fn resolve(&mut self, name: &str) -> Result<Value, EvaluationError>;
}

// This macro generates the arithmetic arm for a binary operation.
macro_rules! eval_arith {
    ($self:ident, $l:expr, $r:expr, $op:expr, $int_fn:expr, $float_fn:expr) => {
        match ($l, $r) {
            (Value::Int(a), Value::Int(b)) => $int_fn(a, b)
                .map(Value::Int)
                .ok_or_else(|| EvaluationError::Overflow {
                    operation: $op.symbol().to_string(),
                }),
            (l, r) => match (l.as_f64(), r.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Float($float_fn(a, b))),
                _ => {
                    let found = if l.as_f64().is_none() { l } else { r };
                    Err($self.type_mismatch($op, "numbers", found))
                }
            },
        }
    };
}

/// Walks an expression tree, pulling names from a [`Resolver`].
pub struct Engine<'r, R: Resolver + ?Sized> {
    resolver: &'r mut R,
}

impl<'r, R: Resolver + ?Sized> Engine<'r, R> {
    pub fn new(resolver: &'r mut R) -> Self {
        Self { resolver }
    }

    pub fn evaluate(&mut self, expr: &Expression) -> Result<Value, EvaluationError> {
        match expr {
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Name(name) => self.resolver.resolve(name),
            Expression::List(items) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expression::Unary(op, operand) => {
                let value = self.evaluate(operand)?;
                self.eval_unary(*op, value)
            }
            Expression::Binary(BinaryOp::And, l, r) => {
                let left = self.evaluate(l)?;
                if !left.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.evaluate(r)?.is_truthy()))
            }
            Expression::Binary(BinaryOp::Or, l, r) => {
                let left = self.evaluate(l)?;
                if left.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.evaluate(r)?.is_truthy()))
            }
            Expression::Binary(op, l, r) => {
                let left = self.evaluate(l)?;
                let right = self.evaluate(r)?;
                self.eval_binary(*op, left, right)
            }
            Expression::Call(name, args) => {
                let values = args
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(name, values)
            }
        }
    }

    fn eval_unary(&self, op: UnaryOp, value: Value) -> Result<Value, EvaluationError> {
        match (op, value) {
            (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
            (UnaryOp::Negate, Value::Int(i)) => {
                i.checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| EvaluationError::Overflow {
                        operation: "-".to_string(),
                    })
            }
            (UnaryOp::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOp::Plus, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
            (op, v) => Err(self.type_mismatch_str(op.symbol().trim(), "a number", v)),
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: Value,
        right: Value,
    ) -> Result<Value, EvaluationError> {
        match op {
            BinaryOp::Add => match (left, right) {
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
                (Value::List(mut a), Value::List(b)) => {
                    a.extend(b);
                    Ok(Value::List(a))
                }
                (l, r) => eval_arith!(self, l, r, op, i64::checked_add, |a: f64, b: f64| a + b),
            },
            BinaryOp::Subtract => {
                eval_arith!(self, left, right, op, i64::checked_sub, |a: f64, b: f64| a - b)
            }
            BinaryOp::Multiply => {
                eval_arith!(self, left, right, op, i64::checked_mul, |a: f64, b: f64| a * b)
            }
            BinaryOp::Divide => {
                let (a, b) = self.numeric_pair(op, left, right)?;
                if b == 0.0 {
                    return Err(EvaluationError::DivisionByZero);
                }
                Ok(Value::Float(a / b))
            }
            BinaryOp::FloorDivide | BinaryOp::Modulo => {
                if right.as_f64() == Some(0.0) {
                    return Err(EvaluationError::DivisionByZero);
                }
                let floor = op == BinaryOp::FloorDivide;
                match (left, right) {
                    (Value::Int(a), Value::Int(b)) => {
                        let (q, r) = floor_div_mod(a, b).ok_or_else(|| EvaluationError::Overflow {
                            operation: op.symbol().to_string(),
                        })?;
                        Ok(Value::Int(if floor { q } else { r }))
                    }
                    (l, r) => {
                        let (a, b) = self.numeric_pair(op, l, r)?;
                        let q = (a / b).floor();
                        Ok(Value::Float(if floor { q } else { a - b * q }))
                    }
                }
            }
            BinaryOp::Equal => Ok(Value::Bool(values_equal(&left, &right))),
            BinaryOp::NotEqual => Ok(Value::Bool(!values_equal(&left, &right))),
            BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual
            | BinaryOp::SmallerThan
            | BinaryOp::SmallerThanOrEqual => {
                let ordering = self.compare(op, left, right)?;
                let outcome = match op {
                    BinaryOp::GreaterThan => ordering == Ordering::Greater,
                    BinaryOp::GreaterThanOrEqual => ordering != Ordering::Less,
                    BinaryOp::SmallerThan => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                };
                Ok(Value::Bool(outcome))
            }
            // Short-circuiting operators are handled before both sides are evaluated.
            BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
            BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
        }
    }

    fn compare(
        &self,
        op: BinaryOp,
        left: Value,
        right: Value,
    ) -> Result<Ordering, EvaluationError> {
        if let (Value::Str(a), Value::Str(b)) = (&left, &right) {
            return Ok(a.cmp(b));
        }
        let (a, b) = self.numeric_pair(op, left, right)?;
        a.partial_cmp(&b)
            .ok_or_else(|| self.type_mismatch(op, "comparable numbers", Value::Float(a)))
    }

    fn numeric_pair(
        &self,
        op: BinaryOp,
        left: Value,
        right: Value,
    ) -> Result<(f64, f64), EvaluationError> {
        match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => Ok((a, b)),
            (None, _) => Err(self.type_mismatch(op, "numbers", left)),
            (_, None) => Err(self.type_mismatch(op, "numbers", right)),
        }
    }

    fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, EvaluationError> {
        let invalid = |message: &str| EvaluationError::InvalidArguments {
            function: name.to_string(),
            message: message.to_string(),
        };

        match name {
            "abs" => match args.as_slice() {
                [Value::Int(i)] => i.checked_abs().map(Value::Int).ok_or_else(|| {
                    EvaluationError::Overflow {
                        operation: "abs".to_string(),
                    }
                }),
                [Value::Float(f)] => Ok(Value::Float(f.abs())),
                [other] => Err(self.type_mismatch_str("abs", "a number", other.clone())),
                _ => Err(invalid("expected exactly one argument")),
            },
            "min" | "max" => {
                let items = match args.len() {
                    0 => return Err(invalid("expected a list or at least two values")),
                    1 => match args.into_iter().next() {
                        Some(Value::List(items)) => items,
                        _ => return Err(invalid("expected a list or at least two values")),
                    },
                    _ => args,
                };
                let mut best: Option<Value> = None;
                for item in items {
                    best = Some(match best {
                        None => item,
                        Some(current) => {
                            let ordering =
                                self.compare(BinaryOp::SmallerThan, item.clone(), current.clone())?;
                            let take = if name == "min" {
                                ordering == Ordering::Less
                            } else {
                                ordering == Ordering::Greater
                            };
                            if take { item } else { current }
                        }
                    });
                }
                best.ok_or_else(|| invalid("empty sequence"))
            }
            "len" => match args.as_slice() {
                [Value::List(items)] => Ok(Value::Int(items.len() as i64)),
                [Value::Str(s)] => Ok(Value::Int(s.chars().count() as i64)),
                [other] => Err(self.type_mismatch_str("len", "a list or string", other.clone())),
                _ => Err(invalid("expected exactly one argument")),
            },
            "int" => match args.as_slice() {
                [Value::Int(i)] => Ok(Value::Int(*i)),
                [Value::Bool(b)] => Ok(Value::Int(*b as i64)),
                [Value::Float(f)] if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
                [Value::Str(s)] => s
                    .trim()
                    .parse()
                    .map(Value::Int)
                    .map_err(|_| {
                        self.type_mismatch_str("int", "an integer literal", Value::Str(s.clone()))
                    }),
                [other] => Err(self.type_mismatch_str("int", "a number", other.clone())),
                _ => Err(invalid("expected exactly one argument")),
            },
            "float" => match args.as_slice() {
                [Value::Str(s)] => s
                    .trim()
                    .parse()
                    .map(Value::Float)
                    .map_err(|_| {
                        self.type_mismatch_str("float", "a float literal", Value::Str(s.clone()))
                    }),
                [other] => other
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| self.type_mismatch_str("float", "a number", other.clone())),
                _ => Err(invalid("expected exactly one argument")),
            },
            "str" => match args.as_slice() {
                [value] => Ok(Value::Str(value.to_string())),
                _ => Err(invalid("expected exactly one argument")),
            },
            "range" => {
                let bounds = args
                    .iter()
                    .map(|v| {
                        v.as_i64()
                            .ok_or_else(|| self.type_mismatch_str("range", "integers", v.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let (start, stop, step) = match bounds.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => return Err(invalid("expected one to three arguments")),
                };
                if step == 0 {
                    return Err(invalid("step must not be zero"));
                }
                let mut items = Vec::new();
                let mut current = start;
                while (step > 0 && current < stop) || (step < 0 && current > stop) {
                    if items.len() >= MAX_RANGE_LEN {
                        return Err(invalid("range is too large"));
                    }
                    items.push(Value::Int(current));
                    current = match current.checked_add(step) {
                        Some(next) => next,
                        None => break,
                    };
                }
                Ok(Value::List(items))
            }
            _ => Err(EvaluationError::UnknownFunction(name.to_string())),
        }
    }

    fn type_mismatch(&self, op: BinaryOp, expected: &str, found: Value) -> EvaluationError {
        self.type_mismatch_str(op.symbol(), expected, found)
    }

    fn type_mismatch_str(&self, op: &str, expected: &str, found: Value) -> EvaluationError {
        EvaluationError::TypeMismatch {
            operation: op.to_string(),
            expected: expected.to_string(),
            found,
        }
    }
}

/// Floor division and modulo with the sign of the divisor.
fn floor_div_mod(a: i64, b: i64) -> Option<(i64, i64)> {
    let q = a.checked_div(b)?;
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some((q - 1, r + b))
    } else {
        Some((q, r))
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            left.as_f64() == right.as_f64()
        }
        _ => left == right,
    }
}
