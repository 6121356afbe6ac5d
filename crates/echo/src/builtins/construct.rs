//! The built-in type constructors (`list`, `tuple`, `dict`, `set`, `int`,
//! `float`, `bool`) used both as free functions called from Python code and
//! internally by a handful of opcodes (e.g. `list(range(...))` patterns in
//! comprehensions compiled to a genexpr).

use std::{cell::RefCell, rc::Rc};

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::{
    context::Context,
    exc::{RunError, RunResult},
    value::{HashKey, PyDict, PySet, Value},
};

pub fn list_builtin(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    let items = match args.first() {
        None => Vec::new(),
        Some(v) => crate::eval::drain_iterable(ctx, v)?,
    };
    Ok(Value::List(Rc::new(RefCell::new(items))))
}

pub fn tuple_builtin(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    let items = match args.first() {
        None => Vec::new(),
        Some(v) => crate::eval::drain_iterable(ctx, v)?,
    };
    Ok(Value::Tuple(items.into()))
}

pub fn set_builtin(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    let items = match args.first() {
        None => Vec::new(),
        Some(v) => crate::eval::drain_iterable(ctx, v)?,
    };
    let mut set = PySet::default();
    for item in items {
        let key = HashKey::new(item.clone()).ok_or_else(|| RunError::type_error(format!("unhashable type: '{}'", item.type_name())))?;
        set.map.insert(key, ());
    }
    Ok(Value::Set(Rc::new(RefCell::new(set))))
}

pub fn dict_builtin(ctx: &mut Context, args: &[Value], kwargs: &indexmap::IndexMap<String, Value>) -> RunResult<Value> {
    let mut dict = PyDict::default();
    if let Some(v) = args.first() {
        for pair in crate::eval::drain_iterable(ctx, v)? {
            let Value::Tuple(kv) = &pair else {
                return Err(RunError::type_error("cannot convert dictionary update sequence element to a pair"));
            };
            if kv.len() != 2 {
                return Err(RunError::value_error("dictionary update sequence element has wrong length"));
            }
            let key = HashKey::new(kv[0].clone()).ok_or_else(|| RunError::type_error(format!("unhashable type: '{}'", kv[0].type_name())))?;
            dict.map.insert(key, kv[1].clone());
        }
    }
    for (k, v) in kwargs {
        dict.map.insert(HashKey::new(Value::Str(k.clone().into())).expect("str is hashable"), v.clone());
    }
    Ok(Value::Dict(Rc::new(RefCell::new(dict))))
}

pub fn int_builtin(args: &[Value]) -> RunResult<Value> {
    match args.first() {
        None => Ok(Value::Int(BigInt::from(0))),
        Some(Value::Int(i)) => Ok(Value::Int(i.clone())),
        Some(Value::Bool(b)) => Ok(Value::Int(BigInt::from(i64::from(*b)))),
        Some(Value::Float(f)) => Ok(Value::Int(BigInt::from(f.trunc() as i64))),
        Some(Value::Str(s)) => {
            let radix = match args.get(1) {
                Some(Value::Int(r)) => r.to_u32().unwrap_or(10),
                _ => 10,
            };
            BigInt::parse_bytes(s.trim().as_bytes(), radix)
                .map(Value::Int)
                .ok_or_else(|| RunError::value_error(format!("invalid literal for int() with base {radix}: {s:?}")))
        }
        Some(other) => Err(RunError::type_error(format!("int() argument must be a string or a number, not '{}'", other.type_name()))),
    }
}

pub fn float_builtin(args: &[Value]) -> RunResult<Value> {
    match args.first() {
        None => Ok(Value::Float(0.0)),
        Some(Value::Float(f)) => Ok(Value::Float(*f)),
        Some(Value::Int(i)) => Ok(Value::Float(i.to_f64().unwrap_or(f64::NAN))),
        Some(Value::Bool(b)) => Ok(Value::Float(f64::from(u8::from(*b)))),
        Some(Value::Str(s)) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| RunError::value_error(format!("could not convert string to float: {s:?}"))),
        Some(other) => Err(RunError::type_error(format!("float() argument must be a string or a number, not '{}'", other.type_name()))),
    }
}

pub fn bool_builtin(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    match args.first() {
        None => Ok(Value::Bool(false)),
        Some(v) => Ok(Value::Bool(ctx.is_truthy(v)?)),
    }
}

/// `__build_class__(body_func, name, *bases, metaclass=..., **kwargs)`,
/// pushed by `LOAD_BUILD_CLASS` and called by the `class` statement's
/// compiled bytecode.
pub fn build_class_builtin(ctx: &mut Context, args: &[Value], kwargs: &indexmap::IndexMap<String, Value>) -> RunResult<Value> {
    let Some(Value::Object(body_rc)) = args.first() else {
        return Err(RunError::type_error("__build_class__: func must be a function"));
    };
    let Some(Value::Str(name)) = args.get(1) else {
        return Err(RunError::type_error("__build_class__: name must be a string"));
    };
    let bases = args.get(2..).unwrap_or(&[]).to_vec();
    let explicit_metaclass = kwargs.get("metaclass").cloned();

    let namespace = crate::eval::call::run_class_body(ctx, body_rc)?;
    ctx.build_class(name.to_string(), bases, namespace, explicit_metaclass)
}
