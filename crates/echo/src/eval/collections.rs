//! Container construction (`BUILD_TUPLE`/`LIST`/`SET`/`MAP`/`STRING`/
//! `SLICE`), subscript access, comprehension appenders
//! (`LIST_APPEND`/`SET_ADD`/`MAP_ADD`), and `FORMAT_VALUE`.
//!
//! Grounded on `bytecode/vm/collections.rs`.

use std::{cell::RefCell, rc::Rc};

use crate::{
    exc::{RunError, RunResult},
    value::{HashKey, PyDict, PySet, Slice, Value},
};

pub fn build_tuple(items: Vec<Value>) -> Value {
    Value::Tuple(items.into())
}

pub fn build_list(items: Vec<Value>) -> Value {
    Value::List(Rc::new(RefCell::new(items)))
}

pub fn build_set(items: Vec<Value>) -> RunResult<Value> {
    let mut set = PySet::default();
    for item in items {
        let key = HashKey::new(item.clone()).ok_or_else(|| RunError::type_error(format!("unhashable type: '{}'", item.type_name())))?;
        set.map.insert(key, ());
    }
    Ok(Value::Set(Rc::new(RefCell::new(set))))
}

pub fn build_map(pairs: Vec<(Value, Value)>) -> RunResult<Value> {
    let mut dict = PyDict::default();
    for (k, v) in pairs {
        let key = HashKey::new(k.clone()).ok_or_else(|| RunError::type_error(format!("unhashable type: '{}'", k.type_name())))?;
        dict.map.insert(key, v);
    }
    Ok(Value::Dict(Rc::new(RefCell::new(dict))))
}

pub fn build_const_key_map(keys: Vec<Value>, values: Vec<Value>) -> RunResult<Value> {
    build_map(keys.into_iter().zip(values).collect())
}

pub fn build_string(parts: Vec<Value>) -> Value {
    Value::Str(parts.iter().map(Value::py_str).collect::<String>().into())
}

pub fn build_slice(start: Value, stop: Value, step: Value) -> Value {
    Value::Slice(Rc::new(Slice { start, stop, step }))
}

pub fn format_value(value: &Value, spec: Option<&str>) -> RunResult<Value> {
    let base = value.py_str();
    let formatted = match spec {
        None | Some("") => base,
        Some(spec) => apply_format_spec(value, spec)?,
    };
    Ok(Value::Str(formatted.into()))
}

fn apply_format_spec(value: &Value, spec: &str) -> RunResult<String> {
    if let Some(width) = spec.strip_prefix('0').and_then(|w| w.parse::<usize>().ok()) {
        return Ok(format!("{:0>width$}", value.py_str(), width = width));
    }
    if let Ok(width) = spec.parse::<usize>() {
        return Ok(format!("{:>width$}", value.py_str(), width = width));
    }
    Ok(value.py_str())
}

/// `BINARY_SUBSCR`: `container[key]`.
pub fn get_item(container: &Value, key: &Value) -> RunResult<Value> {
    match container {
        Value::List(items) => index_sequence(&items.borrow(), key, "list"),
        Value::Tuple(items) => index_sequence(items, key, "tuple"),
        Value::Str(s) => index_str(s, key),
        Value::Dict(d) => {
            let hk = HashKey::new(key.clone()).ok_or_else(|| RunError::type_error(format!("unhashable type: '{}'", key.type_name())))?;
            d.borrow().map.get(&hk).cloned().ok_or_else(|| RunError::key_error(key.py_repr()))
        }
        other => Err(RunError::type_error(format!("'{}' object is not subscriptable", other.type_name()))),
    }
}

fn index_sequence(items: &[Value], key: &Value, type_name: &str) -> RunResult<Value> {
    if let Value::Slice(slice) = key {
        return Ok(Value::List(Rc::new(RefCell::new(slice_indices(items.len(), slice)?.into_iter().map(|i| items[i].clone()).collect()))));
    }
    let index = normalize_index(items.len(), key)?;
    items.get(index).cloned().ok_or_else(|| RunError::index_error(format!("{type_name} index out of range")))
}

fn index_str(s: &str, key: &Value) -> RunResult<Value> {
    let chars: Vec<char> = s.chars().collect();
    if let Value::Slice(slice) = key {
        let indices = slice_indices(chars.len(), slice)?;
        return Ok(Value::Str(indices.into_iter().map(|i| chars[i]).collect::<String>().into()));
    }
    let index = normalize_index(chars.len(), key)?;
    chars.get(index).map(|c| Value::Str(c.to_string().into())).ok_or_else(|| RunError::index_error("string index out of range"))
}

fn normalize_index(len: usize, key: &Value) -> RunResult<usize> {
    let i = match key {
        Value::Int(i) => num_traits::ToPrimitive::to_isize(i).ok_or_else(|| RunError::index_error("index too large"))?,
        Value::Bool(b) => isize::from(*b),
        other => return Err(RunError::type_error(format!("indices must be integers, not {}", other.type_name()))),
    };
    let resolved = if i < 0 { i + len as isize } else { i };
    if resolved < 0 { Err(RunError::index_error("index out of range")) } else { Ok(resolved as usize) }
}

fn slice_indices(len: usize, slice: &Slice) -> RunResult<Vec<usize>> {
    let step = match &slice.step {
        Value::None => 1,
        Value::Int(i) => num_traits::ToPrimitive::to_isize(i).unwrap_or(1),
        _ => 1,
    };
    if step == 0 {
        return Err(RunError::value_error("slice step cannot be zero"));
    }
    let len_i = len as isize;
    let clamp = |v: isize| v.clamp(if step > 0 { 0 } else { -1 }, if step > 0 { len_i } else { len_i - 1 });
    let default_start = if step > 0 { 0 } else { len_i - 1 };
    let default_stop = if step > 0 { len_i } else { -1 };
    let start = match &slice.start {
        Value::None => default_start,
        Value::Int(i) => {
            let raw = num_traits::ToPrimitive::to_isize(i).unwrap_or(0);
            clamp(if raw < 0 { raw + len_i } else { raw })
        }
        _ => default_start,
    };
    let stop = match &slice.stop {
        Value::None => default_stop,
        Value::Int(i) => {
            let raw = num_traits::ToPrimitive::to_isize(i).unwrap_or(0);
            clamp(if raw < 0 { raw + len_i } else { raw })
        }
        _ => default_stop,
    };

    let mut out = Vec::new();
    let mut cur = start;
    if step > 0 {
        while cur < stop {
            out.push(cur as usize);
            cur += step;
        }
    } else {
        while cur > stop {
            if cur >= 0 && (cur as usize) < len {
                out.push(cur as usize);
            }
            cur += step;
        }
    }
    Ok(out)
}

/// `STORE_SUBSCR`: `container[key] = value`.
pub fn set_item(container: &Value, key: &Value, value: Value) -> RunResult<()> {
    match container {
        Value::List(items) => {
            let index = normalize_index(items.borrow().len(), key)?;
            let mut items = items.borrow_mut();
            if index >= items.len() {
                return Err(RunError::index_error("list assignment index out of range"));
            }
            items[index] = value;
            Ok(())
        }
        Value::Dict(d) => {
            let hk = HashKey::new(key.clone()).ok_or_else(|| RunError::type_error(format!("unhashable type: '{}'", key.type_name())))?;
            d.borrow_mut().map.insert(hk, value);
            Ok(())
        }
        other => Err(RunError::type_error(format!("'{}' object does not support item assignment", other.type_name()))),
    }
}

/// `DELETE_SUBSCR`.
pub fn del_item(container: &Value, key: &Value) -> RunResult<()> {
    match container {
        Value::List(items) => {
            let index = normalize_index(items.borrow().len(), key)?;
            let mut items = items.borrow_mut();
            if index >= items.len() {
                return Err(RunError::index_error("list assignment index out of range"));
            }
            items.remove(index);
            Ok(())
        }
        Value::Dict(d) => {
            let hk = HashKey::new(key.clone()).ok_or_else(|| RunError::type_error(format!("unhashable type: '{}'", key.type_name())))?;
            d.borrow_mut().map.shift_remove(&hk).map(|_| ()).ok_or_else(|| RunError::key_error(key.py_repr()))
        }
        other => Err(RunError::type_error(format!("'{}' object doesn't support item deletion", other.type_name()))),
    }
}

/// Collects any iterable sequence's elements into a plain `Vec`, shared by
/// `UNPACK_SEQUENCE` and `UNPACK_EX` (the latter splits the result around a
/// starred middle target instead of requiring an exact count).
pub fn sequence_items(value: &Value) -> RunResult<Vec<Value>> {
    match value {
        Value::Tuple(items) => Ok(items.to_vec()),
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string().into())).collect()),
        Value::Set(set) => Ok(set.borrow().map.keys().map(|k| k.0.clone()).collect()),
        Value::Dict(d) => Ok(d.borrow().map.keys().map(|k| k.0.clone()).collect()),
        other => Err(RunError::type_error(format!("cannot unpack non-sequence {}", other.type_name()))),
    }
}

/// `UNPACK_SEQUENCE`: pops a sequence, pushes `count` values in reverse
/// order (CPython pushes right-to-left so the ensuing `STORE_FAST`s read
/// left-to-right).
pub fn unpack_sequence(value: &Value, count: usize) -> RunResult<Vec<Value>> {
    let items = sequence_items(value)?;
    if items.len() != count {
        return Err(RunError::value_error(format!(
            "{} {} values to unpack (expected {count})",
            if items.len() < count { "not enough" } else { "too many" },
            items.len()
        )));
    }
    Ok(items.into_iter().rev().collect())
}

/// `UNPACK_EX`: `a, *b, c = seq`. Returns values already in push order (so
/// the caller can just push each in turn and let the following `STORE_FAST`s
/// read left to right, same convention as [`unpack_sequence`]).
pub fn unpack_ex(value: &Value, before: usize, after: usize) -> RunResult<Vec<Value>> {
    let items = sequence_items(value)?;
    if items.len() < before + after {
        return Err(RunError::value_error(format!("not enough values to unpack (expected at least {}, got {})", before + after, items.len())));
    }
    let split = items.len() - after;
    let head = &items[..before];
    let star = items[before..split].to_vec();
    let tail = &items[split..];

    let mut push_order = Vec::with_capacity(items.len() + 1);
    push_order.extend(tail.iter().rev().cloned());
    push_order.push(Value::List(Rc::new(RefCell::new(star))));
    push_order.extend(head.iter().rev().cloned());
    Ok(push_order)
}

pub fn list_append(container: &Value, item: Value) {
    if let Value::List(items) = container {
        items.borrow_mut().push(item);
    }
}

pub fn set_add(container: &Value, item: Value) -> RunResult<()> {
    if let Value::Set(set) = container {
        let key = HashKey::new(item.clone()).ok_or_else(|| RunError::type_error(format!("unhashable type: '{}'", item.type_name())))?;
        set.borrow_mut().map.insert(key, ());
    }
    Ok(())
}

pub fn map_add(container: &Value, key: Value, value: Value) -> RunResult<()> {
    if let Value::Dict(d) = container {
        let hk = HashKey::new(key.clone()).ok_or_else(|| RunError::type_error(format!("unhashable type: '{}'", key.type_name())))?;
        d.borrow_mut().map.insert(hk, value);
    }
    Ok(())
}
