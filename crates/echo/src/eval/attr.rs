//! `LOAD_ATTR`/`STORE_ATTR`/`DELETE_ATTR` and the `LOAD_METHOD`/`CALL_METHOD`
//! fast path CPython 3.7 added for attribute-then-call expressions.
//!
//! Grounded on `bytecode/vm/attr.rs`.

use crate::{context::Context, exc::RunResult, heap::HeapObject, value::Value};

pub fn load_attr(ctx: &mut Context, obj: &Value, name: &str) -> RunResult<Value> {
    ctx.getattr(obj, name)
}

pub fn store_attr(ctx: &mut Context, obj: &Value, name: &str, value: Value) -> RunResult<()> {
    ctx.setattr(obj, name, value)
}

pub fn delete_attr(ctx: &mut Context, obj: &Value, name: &str) -> RunResult<()> {
    match obj {
        Value::Object(rc) => {
            if let Some(instance) = rc.borrow().as_instance() {
                if instance.remove(name) {
                    return Ok(());
                }
            }
            if let HeapObject::Exception(e) = &mut *rc.borrow_mut() {
                if e.dict.shift_remove(name).is_some() {
                    return Ok(());
                }
            }
            Err(crate::exc::RunError::attribute_error(format!("'{}' object has no attribute '{name}'", obj.type_name())))
        }
        _ => Err(crate::exc::RunError::attribute_error(format!("'{}' object has no attribute '{name}'", obj.type_name()))),
    }
}

/// `LOAD_METHOD obj, name`: resolves the method the same way `LOAD_ATTR`
/// would (the descriptor protocol already produces a bound `Method`/
/// `Builtin` with `self` folded in), so the two-value "unbound method +
/// self" fast path CPython itself uses collapses to a single bound
/// callable here plus a placeholder.
pub fn load_method(ctx: &mut Context, obj: &Value, name: &str) -> RunResult<(Value, Value)> {
    let method = ctx.getattr(obj, name)?;
    Ok((Value::None, method))
}
