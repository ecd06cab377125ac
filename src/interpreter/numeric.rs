//! Numeric semantics: kind promotion, range-checked arithmetic and
//! two's-complement bitwise operations.
//!
//! Integers are stored as `i128` tagged with their kind, so every 64-bit
//! operand and every intermediate product of two of them is representable
//! before the result is range-checked against its kind.

use std::cmp::Ordering;

use crate::ast::{BinaryOp, FloatKind, IntegerKind, UnaryOp};

use super::value::Value;

/// Arithmetic failures that surface as standard raised errors
#[derive(Debug, Clone, PartialEq)]
pub enum ArithmeticError {
    DivisionByZero,
    Overflow { operation: String },
    ShiftOutOfRange { shift: i64 },
    Unsupported {
        operation: &'static str,
        left: String,
        right: String,
    },
}

/// Promote two integer kinds to a common kind.
///
/// Same signedness picks the wider kind. Mixed signedness picks the smallest
/// signed kind that can hold both, falling back to the unsigned operand's
/// kind when no signed kind is wide enough.
pub fn promote_integer_kinds(left: IntegerKind, right: IntegerKind) -> IntegerKind {
    if left.is_signed() == right.is_signed() {
        return if left.bits() >= right.bits() { left } else { right };
    }
    let (signed, unsigned) = if left.is_signed() {
        (left, right)
    } else {
        (right, left)
    };
    let needed = signed.bits().max(unsigned.bits() + 1);
    IntegerKind::ALL
        .into_iter()
        .filter(|k| k.is_signed() && k.bits() >= needed)
        .min_by_key(|k| k.bits())
        .unwrap_or(unsigned)
}

fn promote_float_kind(left: &Value, right: &Value) -> FloatKind {
    match (left, right) {
        (Value::Float { kind: FloatKind::F32, .. }, Value::Float { kind: FloatKind::F32, .. })
        | (Value::Float { kind: FloatKind::F32, .. }, Value::Integer { .. })
        | (Value::Integer { .. }, Value::Float { kind: FloatKind::F32, .. }) => FloatKind::F32,
        _ => FloatKind::F64,
    }
}

/// Build an integer value, raising overflow when it leaves the kind's range
pub fn checked_integer(
    kind: IntegerKind,
    value: i128,
    operation: &str,
) -> Result<Value, ArithmeticError> {
    if kind.contains(value) {
        Ok(Value::Integer { kind, value })
    } else {
        Err(ArithmeticError::Overflow {
            operation: operation.to_string(),
        })
    }
}

fn overflow(operation: &str) -> ArithmeticError {
    ArithmeticError::Overflow {
        operation: operation.to_string(),
    }
}

/// Reinterpret the low `bits` of `value` as a value of `kind`
pub fn wrap_to_kind(value: i128, kind: IntegerKind) -> i128 {
    let bits = kind.bits();
    let mask = (1i128 << bits) - 1;
    let raw = value & mask;
    if kind.is_signed() && raw >= (1i128 << (bits - 1)) {
        raw - (1i128 << bits)
    } else {
        raw
    }
}

/// Re-tag an integer as `target` if its value fits
pub fn coerce_integer(value: i128, target: IntegerKind) -> Option<Value> {
    target.contains(value).then_some(Value::Integer {
        kind: target,
        value,
    })
}

fn float_value(kind: FloatKind, value: f64) -> Value {
    let value = match kind {
        FloatKind::F32 => value as f32 as f64,
        FloatKind::F64 => value,
    };
    Value::Float { kind, value }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Integer { value, .. } => Some(*value as f64),
        Value::Float { value, .. } => Some(*value),
        _ => None,
    }
}

pub fn is_numeric(value: &Value) -> bool {
    matches!(value, Value::Integer { .. } | Value::Float { .. })
}

/// Apply a binary operator to two numeric operands
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ArithmeticError> {
    match (left, right) {
        (
            Value::Integer {
                kind: lk,
                value: a,
            },
            Value::Integer {
                kind: rk,
                value: b,
            },
        ) => integer_binary(op, promote_integer_kinds(*lk, *rk), *a, *b),
        _ => match (as_f64(left), as_f64(right)) {
            (Some(a), Some(b)) => float_binary(op, promote_float_kind(left, right), a, b, left, right),
            _ => Err(unsupported(op, left, right)),
        },
    }
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> ArithmeticError {
    ArithmeticError::Unsupported {
        operation: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn integer_binary(
    op: BinaryOp,
    kind: IntegerKind,
    a: i128,
    b: i128,
) -> Result<Value, ArithmeticError> {
    let symbol = op.symbol();
    match op {
        BinaryOp::Add => checked_integer(kind, a.checked_add(b).ok_or_else(|| overflow(symbol))?, symbol),
        BinaryOp::Sub => checked_integer(kind, a.checked_sub(b).ok_or_else(|| overflow(symbol))?, symbol),
        BinaryOp::Mul => checked_integer(kind, a.checked_mul(b).ok_or_else(|| overflow(symbol))?, symbol),
        BinaryOp::Pow => integer_pow(kind, a, b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(ArithmeticError::DivisionByZero);
            }
            Ok(Value::f64(a as f64 / b as f64))
        }
        BinaryOp::IntDiv => {
            if b == 0 {
                return Err(ArithmeticError::DivisionByZero);
            }
            checked_integer(kind, a.div_euclid(b), symbol)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(ArithmeticError::DivisionByZero);
            }
            checked_integer(kind, a.rem_euclid(b), symbol)
        }
        BinaryOp::BitAnd => Ok(Value::Integer {
            kind,
            value: wrap_to_kind(a & b, kind),
        }),
        BinaryOp::BitOr => Ok(Value::Integer {
            kind,
            value: wrap_to_kind(a | b, kind),
        }),
        BinaryOp::BitXor => Ok(Value::Integer {
            kind,
            value: wrap_to_kind(a ^ b, kind),
        }),
        BinaryOp::Shl | BinaryOp::Shr => shift(op, kind, a, b),
        BinaryOp::Eq => Ok(Value::Bool(a == b)),
        BinaryOp::Ne => Ok(Value::Bool(a != b)),
        BinaryOp::Lt => Ok(Value::Bool(a < b)),
        BinaryOp::Le => Ok(Value::Bool(a <= b)),
        BinaryOp::Gt => Ok(Value::Bool(a > b)),
        BinaryOp::Ge => Ok(Value::Bool(a >= b)),
        BinaryOp::And | BinaryOp::Or => Err(ArithmeticError::Unsupported {
            operation: symbol,
            left: kind.name().to_string(),
            right: kind.name().to_string(),
        }),
    }
}

fn integer_pow(kind: IntegerKind, base: i128, exponent: i128) -> Result<Value, ArithmeticError> {
    if exponent < 0 {
        return Ok(Value::f64((base as f64).powf(exponent as f64)));
    }
    let result = match base {
        _ if exponent == 0 => 1,
        0 | 1 => base,
        -1 => {
            if exponent % 2 == 0 {
                1
            } else {
                -1
            }
        }
        _ => {
            // |base| >= 2 leaves every 64-bit range within 64 steps
            let mut acc: i128 = 1;
            for _ in 0..exponent {
                acc = acc.checked_mul(base).ok_or_else(|| overflow("^"))?;
                if !kind.contains(acc) {
                    return Err(overflow("^"));
                }
            }
            acc
        }
    };
    checked_integer(kind, result, "^")
}

/// Shift counts must lie in `[0, bits)` of the promoted kind
pub fn shift(op: BinaryOp, kind: IntegerKind, value: i128, count: i128) -> Result<Value, ArithmeticError> {
    if count < 0 || count >= kind.bits() as i128 {
        return Err(ArithmeticError::ShiftOutOfRange {
            shift: count.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
        });
    }
    let count = count as u32;
    let shifted = match op {
        BinaryOp::Shl => wrap_to_kind(value << count, kind),
        _ => value >> count,
    };
    Ok(Value::Integer {
        kind,
        value: shifted,
    })
}

fn float_binary(
    op: BinaryOp,
    kind: FloatKind,
    a: f64,
    b: f64,
    left: &Value,
    right: &Value,
) -> Result<Value, ArithmeticError> {
    match op {
        BinaryOp::Add => Ok(float_value(kind, a + b)),
        BinaryOp::Sub => Ok(float_value(kind, a - b)),
        BinaryOp::Mul => Ok(float_value(kind, a * b)),
        BinaryOp::Div => Ok(float_value(kind, a / b)),
        BinaryOp::Pow => Ok(float_value(kind, a.powf(b))),
        BinaryOp::Eq => Ok(Value::Bool(a == b)),
        BinaryOp::Ne => Ok(Value::Bool(a != b)),
        BinaryOp::Lt => Ok(Value::Bool(a < b)),
        BinaryOp::Le => Ok(Value::Bool(a <= b)),
        BinaryOp::Gt => Ok(Value::Bool(a > b)),
        BinaryOp::Ge => Ok(Value::Bool(a >= b)),
        _ => Err(unsupported(op, left, right)),
    }
}

/// Apply a unary numeric operator
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, ArithmeticError> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Integer { kind, value }) => checked_integer(*kind, -value, "-"),
        (UnaryOp::Neg, Value::Float { kind, value }) => Ok(float_value(*kind, -value)),
        (UnaryOp::BitNot, Value::Integer { kind, value }) => Ok(Value::Integer {
            kind: *kind,
            value: wrap_to_kind(!value, *kind),
        }),
        _ => Err(ArithmeticError::Unsupported {
            operation: match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
                UnaryOp::BitNot => ".~",
            },
            left: operand.type_name(),
            right: String::new(),
        }),
    }
}

/// Ordering between numeric values, across kinds
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Integer { value: a, .. }, Value::Integer { value: b, .. }) => Some(a.cmp(b)),
        _ => as_f64(left)?.partial_cmp(&as_f64(right)?),
    }
}
