//! Arithmetic and bitwise binary/in-place operators.
//!
//! Grounded on `bytecode/vm/binary.rs`'s per-opcode arithmetic dispatch.
//! `int`/`float`/`bool` follow CPython's own promotion rules (mixed
//! int/float promotes to float; `bool` behaves as 0/1); `str`/`list`/`tuple`
//! support `+` (concatenation) and `*` (repetition by an int).

use std::{cell::RefCell, rc::Rc};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{ToPrimitive, Zero};

use crate::{exc::{RunError, RunResult}, value::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    TrueDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    And,
    Or,
    Xor,
}

pub fn apply(op: BinOp, lhs: &Value, rhs: &Value) -> RunResult<Value> {
    use Value::{Bool, Float, Int, List, Str, Tuple};
    match (op, lhs, rhs) {
        (BinOp::Add, Str(a), Str(b)) => Ok(Str(format!("{a}{b}").into())),
        (BinOp::Add, List(a), List(b)) => {
            let mut combined = a.borrow().clone();
            combined.extend(b.borrow().iter().cloned());
            Ok(List(Rc::new(RefCell::new(combined))))
        }
        (BinOp::Add, Tuple(a), Tuple(b)) => {
            let mut combined = a.to_vec();
            combined.extend(b.iter().cloned());
            Ok(Tuple(combined.into()))
        }
        (BinOp::Mul, Str(s), n) | (BinOp::Mul, n, Str(s)) if is_int_like(n) => Ok(Str(s.repeat(as_usize(n)?).into())),
        (BinOp::Mul, List(items), n) | (BinOp::Mul, n, List(items)) if is_int_like(n) => {
            let times = as_usize(n)?;
            let mut out = Vec::with_capacity(items.borrow().len() * times);
            for _ in 0..times {
                out.extend(items.borrow().iter().cloned());
            }
            Ok(List(Rc::new(RefCell::new(out))))
        }
        _ => numeric(op, lhs, rhs),
    }
}

fn is_int_like(v: &Value) -> bool {
    matches!(v, Value::Int(_) | Value::Bool(_))
}

fn as_usize(v: &Value) -> RunResult<usize> {
    match v {
        Value::Int(i) => i.to_usize().ok_or_else(|| RunError::value_error("repetition count too large")),
        Value::Bool(b) => Ok(usize::from(*b)),
        _ => Err(RunError::type_error("expected an integer")),
    }
}

fn numeric(op: BinOp, lhs: &Value, rhs: &Value) -> RunResult<Value> {
    if let (Some(a), Some(b)) = (as_bigint(lhs), as_bigint(rhs)) {
        return int_op(op, &a, &b, lhs, rhs);
    }
    if let (Some(a), Some(b)) = (as_f64(lhs), as_f64(rhs)) {
        return float_op(op, a, b);
    }
    Err(type_error_for(op, lhs, rhs))
}

fn as_bigint(v: &Value) -> Option<BigInt> {
    match v {
        Value::Int(i) => Some(i.clone()),
        Value::Bool(b) => Some(BigInt::from(i64::from(*b))),
        _ => None,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Float(f) => Some(*f),
        Value::Int(i) => i.to_f64(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

fn is_float(v: &Value) -> bool {
    matches!(v, Value::Float(_))
}

fn int_op(op: BinOp, a: &BigInt, b: &BigInt, lhs: &Value, rhs: &Value) -> RunResult<Value> {
    if is_float(lhs) || is_float(rhs) {
        return float_op(op, as_f64(lhs).expect("checked"), as_f64(rhs).expect("checked"));
    }
    match op {
        BinOp::Add => Ok(Value::Int(a + b)),
        BinOp::Sub => Ok(Value::Int(a - b)),
        BinOp::Mul => Ok(Value::Int(a * b)),
        BinOp::Mod => {
            if b.is_zero() {
                return Err(RunError::zero_division("integer division or modulo by zero"));
            }
            Ok(Value::Int(a.mod_floor(b)))
        }
        BinOp::FloorDiv => {
            if b.is_zero() {
                return Err(RunError::zero_division("integer division or modulo by zero"));
            }
            Ok(Value::Int(a.div_floor(b)))
        }
        BinOp::TrueDiv => {
            if b.is_zero() {
                return Err(RunError::zero_division("division by zero"));
            }
            Ok(Value::Float(a.to_f64().unwrap_or(f64::NAN) / b.to_f64().unwrap_or(f64::NAN)))
        }
        BinOp::Pow => {
            if let Some(exp) = b.to_u32() {
                Ok(Value::Int(a.pow(exp)))
            } else {
                Ok(Value::Float(a.to_f64().unwrap_or(f64::NAN).powf(b.to_f64().unwrap_or(f64::NAN))))
            }
        }
        BinOp::LShift => Ok(Value::Int(a << b.to_u32().ok_or_else(|| RunError::value_error("shift count too large"))?)),
        BinOp::RShift => Ok(Value::Int(a >> b.to_u32().ok_or_else(|| RunError::value_error("shift count too large"))?)),
        BinOp::And => Ok(Value::Int(a & b)),
        BinOp::Or => Ok(Value::Int(a | b)),
        BinOp::Xor => Ok(Value::Int(a ^ b)),
    }
}

fn float_op(op: BinOp, a: f64, b: f64) -> RunResult<Value> {
    match op {
        BinOp::Add => Ok(Value::Float(a + b)),
        BinOp::Sub => Ok(Value::Float(a - b)),
        BinOp::Mul => Ok(Value::Float(a * b)),
        BinOp::TrueDiv => {
            if b == 0.0 {
                return Err(RunError::zero_division("float division by zero"));
            }
            Ok(Value::Float(a / b))
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(RunError::zero_division("float floor division by zero"));
            }
            Ok(Value::Float((a / b).floor()))
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(RunError::zero_division("float modulo"));
            }
            Ok(Value::Float(a.rem_euclid(b)))
        }
        BinOp::Pow => Ok(Value::Float(a.powf(b))),
        BinOp::LShift | BinOp::RShift | BinOp::And | BinOp::Or | BinOp::Xor => {
            Err(RunError::type_error("unsupported operand type(s): expected int"))
        }
    }
}

fn type_error_for(op: BinOp, lhs: &Value, rhs: &Value) -> RunError {
    let sym = match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::FloorDiv => "//",
        BinOp::TrueDiv => "/",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
        BinOp::LShift => "<<",
        BinOp::RShift => ">>",
        BinOp::And => "&",
        BinOp::Or => "|",
        BinOp::Xor => "^",
    };
    RunError::type_error(format!("unsupported operand type(s) for {sym}: '{}' and '{}'", lhs.type_name(), rhs.type_name()))
}

pub fn unary_negative(v: &Value) -> RunResult<Value> {
    match v {
        Value::Int(i) => Ok(Value::Int(-i)),
        Value::Float(f) => Ok(Value::Float(-f)),
        Value::Bool(b) => Ok(Value::Int(-BigInt::from(i64::from(*b)))),
        other => Err(RunError::type_error(format!("bad operand type for unary -: '{}'", other.type_name()))),
    }
}

pub fn unary_positive(v: &Value) -> RunResult<Value> {
    match v {
        Value::Int(_) | Value::Float(_) => Ok(v.clone()),
        Value::Bool(b) => Ok(Value::Int(BigInt::from(i64::from(*b)))),
        other => Err(RunError::type_error(format!("bad operand type for unary +: '{}'", other.type_name()))),
    }
}

pub fn unary_invert(v: &Value) -> RunResult<Value> {
    match v {
        Value::Int(i) => Ok(Value::Int(-i - BigInt::from(1))),
        Value::Bool(b) => Ok(Value::Int(-BigInt::from(i64::from(*b)) - BigInt::from(1))),
        other => Err(RunError::type_error(format!("bad operand type for unary ~: '{}'", other.type_name()))),
    }
}
