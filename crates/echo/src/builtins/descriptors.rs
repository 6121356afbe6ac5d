//! `super()`, `property()`, `classmethod()`, `staticmethod()`.

use crate::{
    context::Context,
    exc::{RunError, RunResult},
    heap::{wrap, HeapObject},
    types::method::{Classmethod, Property, Staticmethod},
    value::Value,
};

/// The two-argument form `super(StartClass, obj_or_cls)`. The zero-argument
/// sugar form (`super()` inferring both arguments from the enclosing
/// method's `__class__` cell and first parameter) is resolved by
/// `Op::CallFunction`'s bare-`super()` check in `eval::mod`, which supplies
/// both arguments before this builtin ever runs -- so by the time `args` gets
/// here, a zero-arg call has already become a two-arg one.
pub fn super_builtin(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    let Some(Value::Object(start)) = args.first() else {
        return Err(RunError::type_error("super() argument 1 must be a type"));
    };
    if !matches!(&*start.borrow(), HeapObject::Class(_)) {
        return Err(RunError::type_error("super() argument 1 must be a type"));
    }
    let bound = args.get(1).cloned().unwrap_or(Value::None);
    Ok(ctx.make_super(std::rc::Rc::clone(start), bound))
}

pub fn property(args: &[Value]) -> RunResult<Value> {
    let prop = Property {
        fget: args.first().cloned().filter(|v| !matches!(v, Value::None)),
        fset: args.get(1).cloned().filter(|v| !matches!(v, Value::None)),
        fdel: args.get(2).cloned().filter(|v| !matches!(v, Value::None)),
        doc: None,
    };
    Ok(Value::Object(wrap(HeapObject::Property(prop))))
}

pub fn property_getter(args: &[Value]) -> RunResult<Value> {
    replace_accessor(args, |p, f| p.fget = Some(f))
}

pub fn property_setter(args: &[Value]) -> RunResult<Value> {
    replace_accessor(args, |p, f| p.fset = Some(f))
}

pub fn property_deleter(args: &[Value]) -> RunResult<Value> {
    replace_accessor(args, |p, f| p.fdel = Some(f))
}

fn replace_accessor(args: &[Value], set: impl FnOnce(&mut Property, Value)) -> RunResult<Value> {
    let Value::Object(rc) = &args[0] else {
        return Err(RunError::type_error("expected a property object"));
    };
    let mut borrowed = rc.borrow_mut();
    let HeapObject::Property(prop) = &mut *borrowed else {
        return Err(RunError::type_error("expected a property object"));
    };
    let mut next = Property { fget: prop.fget.clone(), fset: prop.fset.clone(), fdel: prop.fdel.clone(), doc: prop.doc.clone() };
    set(&mut next, args[1].clone());
    drop(borrowed);
    Ok(Value::Object(wrap(HeapObject::Property(next))))
}

pub fn classmethod(args: &[Value]) -> RunResult<Value> {
    Ok(Value::Object(wrap(HeapObject::Classmethod(Classmethod { func: args[0].clone() }))))
}

pub fn staticmethod(args: &[Value]) -> RunResult<Value> {
    Ok(Value::Object(wrap(HeapObject::Staticmethod(Staticmethod { func: args[0].clone() }))))
}
