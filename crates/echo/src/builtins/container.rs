//! Built-in methods on `list`/`dict`/`set` (`append`, `get`, `keys`, ...).
//!
//! These live outside the class/MRO machinery: `list`/`dict`/`set` values
//! are immediates on [`crate::value::Value`], not `Instance`s, so their
//! methods are resolved directly by name in [`Context::getattr`] rather
//! than through a populated class dict.

use crate::{
    builtins::BuiltinId,
    exc::{RunError, RunResult},
    value::{HashKey, Value},
};

/// Returns the [`BuiltinId`] for `name` as a method of `receiver`'s type,
/// if one exists -- the hook `Context::getattr` consults before falling
/// back to the ordinary class-based attribute lookup.
#[must_use]
pub fn method_for(receiver: &Value, name: &str) -> Option<BuiltinId> {
    match (receiver, name) {
        (Value::List(_), "append") => Some(BuiltinId::ListAppend),
        (Value::List(_), "extend") => Some(BuiltinId::ListExtend),
        (Value::List(_), "pop") => Some(BuiltinId::ListPop),
        (Value::Dict(_), "get") => Some(BuiltinId::DictGet),
        (Value::Dict(_), "keys") => Some(BuiltinId::DictKeys),
        (Value::Dict(_), "values") => Some(BuiltinId::DictValues),
        (Value::Dict(_), "items") => Some(BuiltinId::DictItems),
        _ => None,
    }
}

pub fn dispatch(id: BuiltinId, args: &[Value]) -> RunResult<Value> {
    match id {
        BuiltinId::ListAppend => {
            let Value::List(items) = &args[0] else { return Err(not_a_list()) };
            items.borrow_mut().push(args[1].clone());
            Ok(Value::None)
        }
        BuiltinId::ListExtend => {
            let Value::List(items) = &args[0] else { return Err(not_a_list()) };
            let extra = sequence_values(&args[1])?;
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        BuiltinId::ListPop => {
            let Value::List(items) = &args[0] else { return Err(not_a_list()) };
            let mut items = items.borrow_mut();
            let index = match args.get(1) {
                Some(Value::Int(i)) => {
                    let i = num_traits::ToPrimitive::to_isize(i).unwrap_or(-1);
                    if i < 0 { items.len() as isize + i } else { i }
                }
                _ => items.len() as isize - 1,
            };
            if index < 0 || index as usize >= items.len() {
                return Err(RunError::index_error("pop index out of range"));
            }
            Ok(items.remove(index as usize))
        }
        BuiltinId::DictGet => {
            let Value::Dict(d) = &args[0] else { return Err(RunError::type_error("expected a dict")) };
            let Some(key) = HashKey::new(args[1].clone()) else { return Err(RunError::type_error(format!("unhashable type: '{}'", args[1].type_name()))) };
            Ok(d.borrow().map.get(&key).cloned().unwrap_or_else(|| args.get(2).cloned().unwrap_or(Value::None)))
        }
        BuiltinId::DictKeys => {
            let Value::Dict(d) = &args[0] else { return Err(RunError::type_error("expected a dict")) };
            Ok(Value::List(std::rc::Rc::new(std::cell::RefCell::new(d.borrow().map.keys().map(|k| k.0.clone()).collect()))))
        }
        BuiltinId::DictValues => {
            let Value::Dict(d) = &args[0] else { return Err(RunError::type_error("expected a dict")) };
            Ok(Value::List(std::rc::Rc::new(std::cell::RefCell::new(d.borrow().map.values().cloned().collect()))))
        }
        BuiltinId::DictItems => {
            let Value::Dict(d) = &args[0] else { return Err(RunError::type_error("expected a dict")) };
            let pairs = d.borrow().map.iter().map(|(k, v)| Value::Tuple(vec![k.0.clone(), v.clone()].into())).collect();
            Ok(Value::List(std::rc::Rc::new(std::cell::RefCell::new(pairs))))
        }
        other => Err(RunError::type_error(format!("{other:?} is not a container method"))),
    }
}

fn not_a_list() -> RunError {
    RunError::type_error("expected a list")
}

fn sequence_values(v: &Value) -> RunResult<Vec<Value>> {
    match v {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Tuple(items) => Ok(items.to_vec()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string().into())).collect()),
        other => Err(RunError::type_error(format!("'{}' object is not iterable", other.type_name()))),
    }
}
