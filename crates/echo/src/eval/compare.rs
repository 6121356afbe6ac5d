//! `COMPARE_OP`: equality, ordering, `in`/`not in`, `is`/`is not`.
//!
//! Grounded on `bytecode/vm/compare.rs`. The six relational operators plus
//! `in`, `not in`, `is`, `is not`, `exception match` mirror CPython 3.7's
//! `cmp_op` table exactly (index order matters: it's what `COMPARE_OP`'s
//! argument selects).

use std::cmp::Ordering;

use crate::{context::Context, exc::{RunError, RunResult}, heap::HeapObject, value::Value};

pub const CMP_OP_NAMES: [&str; 10] = ["<", "<=", "==", "!=", ">", ">=", "in", "not in", "is", "is not"];

pub fn compare(ctx: &mut Context, index: u32, lhs: &Value, rhs: &Value) -> RunResult<Value> {
    match index {
        0..=5 => {
            if index == 2 {
                return Ok(Value::Bool(lhs.py_eq(rhs)));
            }
            if index == 3 {
                return Ok(Value::Bool(!lhs.py_eq(rhs)));
            }
            let Some(ord) = lhs.py_cmp(rhs) else {
                return Err(RunError::type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    CMP_OP_NAMES[index as usize],
                    lhs.type_name(),
                    rhs.type_name()
                )));
            };
            Ok(Value::Bool(match index {
                0 => ord == Ordering::Less,
                1 => ord != Ordering::Greater,
                4 => ord == Ordering::Greater,
                5 => ord != Ordering::Less,
                _ => unreachable!(),
            }))
        }
        6 | 7 => {
            let contains = contains(ctx, rhs, lhs)?;
            Ok(Value::Bool(if index == 6 { contains } else { !contains }))
        }
        8 | 9 => {
            let is_same = identical(lhs, rhs);
            Ok(Value::Bool(if index == 8 { is_same } else { !is_same }))
        }
        _ => Err(RunError::type_error("bad COMPARE_OP argument")),
    }
}

fn identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => std::rc::Rc::ptr_eq(x, y) || x == y,
        (Value::Object(x), Value::Object(y)) => std::rc::Rc::ptr_eq(x, y),
        (Value::List(x), Value::List(y)) => std::rc::Rc::ptr_eq(x, y),
        (Value::Dict(x), Value::Dict(y)) => std::rc::Rc::ptr_eq(x, y),
        (Value::Set(x), Value::Set(y)) => std::rc::Rc::ptr_eq(x, y),
        _ => false,
    }
}

fn contains(ctx: &Context, container: &Value, needle: &Value) -> RunResult<bool> {
    match container {
        Value::Str(s) => match needle {
            Value::Str(n) => Ok(s.contains(n.as_ref())),
            _ => Err(RunError::type_error("'in <string>' requires string as left operand")),
        },
        Value::Tuple(items) => Ok(items.iter().any(|v| v.py_eq(needle))),
        Value::List(items) => Ok(items.borrow().iter().any(|v| v.py_eq(needle))),
        Value::Dict(d) => Ok(crate::value::HashKey::new(needle.clone()).is_some_and(|k| d.borrow().map.contains_key(&k))),
        Value::Set(s) => Ok(crate::value::HashKey::new(needle.clone()).is_some_and(|k| s.borrow().map.contains_key(&k))),
        Value::Object(rc) if matches!(&*rc.borrow(), HeapObject::Instance(_)) => {
            let _ = ctx;
            Err(RunError::type_error(format!("argument of type '{}' is not iterable", container.type_name())))
        }
        other => Err(RunError::type_error(format!("argument of type '{}' is not iterable", other.type_name()))),
    }
}
