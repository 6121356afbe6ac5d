//! `isinstance`, `issubclass`, `type`, `repr`, `str`, `len`, `hash`,
//! `callable`, `dir`, `id`, `getattr`/`setattr`/`hasattr`.

use crate::{
    context::Context,
    exc::{RunError, RunResult},
    heap::HeapObject,
    value::Value,
};

pub fn len(_ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::Tuple(t) => t.len(),
        Value::List(l) => l.borrow().len(),
        Value::Dict(d) => d.borrow().map.len(),
        Value::Set(s) => s.borrow().map.len(),
        other => return Err(RunError::type_error(format!("object of type '{}' has no len()", other.type_name()))),
    };
    Ok(Value::Int(n.into()))
}

pub fn repr(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    if let Some(dunder) = dunder_result(ctx, &args[0], "__repr__")? {
        return Ok(dunder);
    }
    Ok(Value::Str(args[0].py_repr().into()))
}

pub fn str_(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    if args.is_empty() {
        return Ok(Value::Str("".into()));
    }
    if let Some(dunder) = dunder_result(ctx, &args[0], "__str__")? {
        return Ok(dunder);
    }
    Ok(Value::Str(args[0].py_str().into()))
}

/// Calls `value.__dunder__()` if `value` is an instance whose class (or an
/// ancestor) defines it, returning `None` so the caller falls back to the
/// built-in behavior for every other type.
fn dunder_result(ctx: &mut Context, value: &Value, dunder: &str) -> RunResult<Option<Value>> {
    let Value::Object(rc) = value else { return Ok(None) };
    let class = match &*rc.borrow() {
        HeapObject::Instance(i) => std::rc::Rc::clone(&i.class),
        _ => return Ok(None),
    };
    let Some(method) = class.borrow().as_class().and_then(|c| c.lookup(dunder)) else { return Ok(None) };
    let bound = ctx.bind_descriptor(&method, value, &class)?;
    Ok(Some(ctx.call(&bound, &[], &indexmap::IndexMap::new())?))
}

pub fn abs(args: &[Value]) -> RunResult<Value> {
    use num_traits::Signed;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(i.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b).into())),
        other => Err(RunError::type_error(format!("bad operand type for abs(): '{}'", other.type_name()))),
    }
}

pub fn hash(args: &[Value]) -> RunResult<Value> {
    args[0]
        .py_hash()
        .map(|h| Value::Int(h.into()))
        .ok_or_else(|| RunError::type_error(format!("unhashable type: '{}'", args[0].type_name())))
}

pub fn callable(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    let is_callable = match &args[0] {
        Value::Object(rc) => match &*rc.borrow() {
            HeapObject::Function(_) | HeapObject::Method(_) | HeapObject::Builtin(_) | HeapObject::Class(_) | HeapObject::Partial(_) => true,
            HeapObject::Instance(i) => i.class.borrow().as_class().is_some_and(|c| c.lookup("__call__").is_some()),
            _ => false,
        },
        _ => false,
    };
    let _ = ctx;
    Ok(Value::Bool(is_callable))
}

pub fn dir(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    let type_obj = ctx.type_of(&args[0]);
    let mut names: Vec<String> = type_obj.borrow().as_class().map(|c| {
        let mut n: Vec<String> = c.mro.iter().flat_map(|base| base.borrow().as_class().map(|bc| bc.dict.keys().cloned().collect::<Vec<_>>()).unwrap_or_default()).collect();
        n.sort();
        n.dedup();
        n
    }).unwrap_or_default();
    if let Value::Object(rc) = &args[0] {
        if let HeapObject::Instance(i) = &*rc.borrow() {
            names.extend(i.keys());
        }
    }
    names.sort();
    names.dedup();
    Ok(Value::List(std::rc::Rc::new(std::cell::RefCell::new(names.into_iter().map(|n| Value::Str(n.into())).collect()))))
}

pub fn id(args: &[Value]) -> RunResult<Value> {
    let addr = match &args[0] {
        Value::Object(rc) => std::rc::Rc::as_ptr(rc) as usize,
        other => {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            use std::hash::{Hash, Hasher};
            other.py_repr().hash(&mut hasher);
            hasher.finish() as usize
        }
    };
    Ok(Value::Int(addr.into()))
}

pub fn isinstance(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    let class = class_arg(&args[1])?;
    Ok(Value::Bool(ctx.is_instance(&args[0], &class)))
}

pub fn issubclass(args: &[Value]) -> RunResult<Value> {
    let subject = class_arg(&args[0])?;
    let parent = class_arg(&args[1])?;
    Ok(Value::Bool(subject.borrow().as_class().is_some_and(|c| c.is_subclass_of(&parent))))
}

fn class_arg(value: &Value) -> RunResult<crate::heap::ObjRef> {
    match value {
        Value::Object(rc) if matches!(&*rc.borrow(), HeapObject::Class(_)) => Ok(std::rc::Rc::clone(rc)),
        other => Err(RunError::type_error(format!("isinstance() arg 2 must be a type, not {}", other.type_name()))),
    }
}

pub fn type_builtin(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    Ok(Value::Object(ctx.type_of(&args[0])))
}

pub fn getattr_builtin(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    let name = match &args[1] {
        Value::Str(s) => s.to_string(),
        other => return Err(RunError::type_error(format!("attribute name must be string, not '{}'", other.type_name()))),
    };
    match ctx.getattr(&args[0], &name) {
        Ok(v) => Ok(v),
        Err(err) => args.get(2).cloned().ok_or(err),
    }
}

pub fn setattr_builtin(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    let name = match &args[1] {
        Value::Str(s) => s.to_string(),
        other => return Err(RunError::type_error(format!("attribute name must be string, not '{}'", other.type_name()))),
    };
    ctx.setattr(&args[0], &name, args[2].clone())?;
    Ok(Value::None)
}

pub fn hasattr_builtin(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    let name = match &args[1] {
        Value::Str(s) => s.to_string(),
        other => return Err(RunError::type_error(format!("attribute name must be string, not '{}'", other.type_name()))),
    };
    Ok(Value::Bool(ctx.getattr(&args[0], &name).is_ok()))
}
