//! `iter()`, `next()`, `range()`, `enumerate()`, and advancing the native
//! iterator kinds they produce.
//!
//! `range`/`enumerate` are supplemented beyond spec.md's explicit builtin
//! list (SPEC_FULL.md §11) since S1's `range(10)` and the generator/iterator
//! invariant (spec.md §8 invariant 6) both need a real iterator protocol,
//! not a stub.

use crate::{
    context::Context,
    exc::{RunError, RunResult},
    heap::{wrap, HeapObject},
    types::native_iter::NativeIter,
    value::Value,
};

pub fn range_builtin(args: &[Value]) -> RunResult<Value> {
    let to_i64 = |v: &Value| match v {
        Value::Int(i) => num_traits::ToPrimitive::to_i64(i).ok_or_else(|| RunError::value_error("range argument too large")),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(RunError::type_error(format!("'{}' object cannot be interpreted as an integer", other.type_name()))),
    };
    let (cur, stop, step) = match args.len() {
        1 => (0, to_i64(&args[0])?, 1),
        2 => (to_i64(&args[0])?, to_i64(&args[1])?, 1),
        _ => (to_i64(&args[0])?, to_i64(&args[1])?, to_i64(&args[2])?),
    };
    if step == 0 {
        return Err(RunError::value_error("range() arg 3 must not be zero"));
    }
    Ok(Value::Object(wrap(HeapObject::NativeIter(NativeIter::Range { cur, stop, step }))))
}

pub fn enumerate_builtin(args: &[Value]) -> RunResult<Value> {
    let start = match args.get(1) {
        Some(Value::Int(i)) => num_traits::ToPrimitive::to_i64(i).unwrap_or(0),
        _ => 0,
    };
    Ok(Value::Object(wrap(HeapObject::NativeIter(NativeIter::Enumerate { inner: args[0].clone(), index: start }))))
}

/// `iter(x)`: for a sequence, builds a `Sequence` native iterator; for
/// anything already iterator-shaped (a generator or another native
/// iterator), returns it unchanged; otherwise raises `TypeError`.
pub fn iter_builtin(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    get_iter(ctx, &args[0])
}

pub fn get_iter(_ctx: &mut Context, value: &Value) -> RunResult<Value> {
    match value {
        Value::Object(rc) if matches!(&*rc.borrow(), HeapObject::NativeIter(_) | HeapObject::Generator(_)) => Ok(value.clone()),
        Value::Tuple(items) => Ok(Value::Object(wrap(HeapObject::NativeIter(NativeIter::Sequence { values: items.to_vec(), index: 0 })))),
        Value::List(items) => Ok(Value::Object(wrap(HeapObject::NativeIter(NativeIter::Sequence { values: items.borrow().clone(), index: 0 })))),
        Value::Str(s) => {
            let chars: Vec<Value> = s.chars().map(|c| Value::Str(c.to_string().into())).collect();
            Ok(Value::Object(wrap(HeapObject::NativeIter(NativeIter::Sequence { values: chars, index: 0 }))))
        }
        Value::Dict(d) => {
            let keys: Vec<Value> = d.borrow().map.keys().map(|k| k.0.clone()).collect();
            Ok(Value::Object(wrap(HeapObject::NativeIter(NativeIter::Sequence { values: keys, index: 0 }))))
        }
        Value::Set(s) => {
            let items: Vec<Value> = s.borrow().map.keys().map(|k| k.0.clone()).collect();
            Ok(Value::Object(wrap(HeapObject::NativeIter(NativeIter::Sequence { values: items, index: 0 }))))
        }
        other => Err(RunError::type_error(format!("'{}' object is not iterable", other.type_name()))),
    }
}

pub fn next_builtin(ctx: &mut Context, args: &[Value]) -> RunResult<Value> {
    match advance(ctx, &args[0])? {
        Some(v) => Ok(v),
        None => match args.get(1) {
            Some(default) => Ok(default.clone()),
            None => Err(RunError::stop_iteration()),
        },
    }
}

/// Advances any iterator-shaped value by one step. Generators delegate to
/// `eval::generator::resume`; native iterators mutate their state in place.
pub fn advance(ctx: &mut Context, value: &Value) -> RunResult<Option<Value>> {
    let Value::Object(rc) = value else {
        return Err(RunError::type_error(format!("'{}' object is not an iterator", value.type_name())));
    };
    let is_generator = matches!(&*rc.borrow(), HeapObject::Generator(_));
    if is_generator {
        return crate::eval::generator::resume(ctx, rc);
    }

    let inner_for_enumerate = if let HeapObject::NativeIter(NativeIter::Enumerate { inner, .. }) = &*rc.borrow() {
        Some(inner.clone())
    } else {
        None
    };

    if let Some(inner) = inner_for_enumerate {
        let item = advance(ctx, &inner)?;
        let mut borrowed = rc.borrow_mut();
        let HeapObject::NativeIter(NativeIter::Enumerate { index, .. }) = &mut *borrowed else {
            unreachable!()
        };
        return Ok(item.map(|v| {
            let i = *index;
            *index += 1;
            Value::Tuple(vec![Value::Int(i.into()), v].into())
        }));
    }

    let mut borrowed = rc.borrow_mut();
    match &mut *borrowed {
        HeapObject::NativeIter(NativeIter::Range { cur, stop, step }) => {
            let has_next = if *step > 0 { *cur < *stop } else { *cur > *stop };
            if !has_next {
                return Ok(None);
            }
            let value = *cur;
            *cur += *step;
            Ok(Some(Value::Int(value.into())))
        }
        HeapObject::NativeIter(NativeIter::Sequence { values, index }) => {
            let item = values.get(*index).cloned();
            if item.is_some() {
                *index += 1;
            }
            Ok(item)
        }
        _ => Err(RunError::type_error(format!("'{}' object is not an iterator", value.type_name()))),
    }
}
