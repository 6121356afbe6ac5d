//! Runtime value representation.
//!
//! `Value` is the primary type flowing through the evaluator: small immediates
//! (`None`, `Bool`, `Int`, `Float`) are stored inline, while everything with
//! reference semantics in Python (`str`, `list`, `dict`, `set`, and every kind
//! of [`crate::heap::HeapObject`]) is stored behind an `Rc` so that Python's
//! "assignment binds a name to an existing object" semantics fall out of
//! ordinary Rust `Clone`.
//!
//! Unlike the teacher this crate is grounded on, there is no arena + manual
//! `drop_with_heap` bookkeeping: reference counting is `Rc`'s job. Cycles
//! (e.g. a class referencing its own subclasses) are broken with `Weak`
//! instead of a tracked heap of slots (see `types::class`).

use std::{
    cell::RefCell,
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
};

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::heap::ObjRef;

/// A Python value at runtime.
///
/// `int` is arbitrary precision (`BigInt`) rather than the teacher's
/// dual `Int(i64)`/`BigInt(BigInt)` split: spec.md's object model lists a
/// single `int` built-in type with no mention of a fast/slow-path split, so
/// collapsing to one representation is a direct simplification rather than a
/// missing feature.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Str(Rc<str>),
    Tuple(Rc<[Value]>),
    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<PyDict>>),
    Set(Rc<RefCell<PySet>>),
    Slice(Rc<Slice>),
    /// Every object-model kind: module, class, instance, function, method,
    /// builtin, property/classmethod/staticmethod, super, generator,
    /// exception, partial, cell. See `crate::heap::HeapObject`.
    Object(ObjRef),
}

#[derive(Debug, Clone)]
pub struct Slice {
    pub start: Value,
    pub stop: Value,
    pub step: Value,
}

/// Insertion-ordered mapping backing Python's `dict`.
///
/// Keyed by [`HashKey`] so that values which are not hashable (e.g. a `list`)
/// simply cannot be inserted as keys -- callers construct a `HashKey` via
/// [`HashKey::new`], which returns `None` for unhashable values, exactly
/// mirroring `TypeError: unhashable type`.
#[derive(Default)]
pub struct PyDict {
    pub map: IndexMap<HashKey, Value>,
}

#[derive(Default)]
pub struct PySet {
    pub map: IndexMap<HashKey, ()>,
}

/// A value wrapped for use as a hash-map key, implementing Python's
/// equality/hash contract (`hash(1) == hash(1.0) == hash(True)`, cross-type
/// numeric equality) rather than Rust's derived one.
#[derive(Clone)]
pub struct HashKey(pub Value);

impl HashKey {
    /// Returns `None` for values with no Python hash (lists, dicts, sets,
    /// and plain instances with no `__hash__`).
    #[must_use]
    pub fn new(value: Value) -> Option<Self> {
        if value.is_hashable() { Some(Self(value)) } else { None }
    }
}

impl Value {
    #[must_use]
    pub fn is_hashable(&self) -> bool {
        match self {
            Self::None | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Str(_) => true,
            Self::Tuple(items) => items.iter().all(Self::is_hashable),
            Self::List(_) | Self::Dict(_) | Self::Set(_) | Self::Slice(_) => false,
            Self::Object(obj) => crate::heap::is_hashable(obj),
        }
    }

    /// Python truthiness: `bool(x)`.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => !i.is_zero(),
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Tuple(t) => !t.is_empty(),
            Self::List(l) => !l.borrow().is_empty(),
            Self::Dict(d) => !d.borrow().map.is_empty(),
            Self::Set(s) => !s.borrow().map.is_empty(),
            Self::Slice(_) => true,
            Self::Object(obj) => crate::heap::is_truthy(obj),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::None => "NoneType".to_owned(),
            Self::Bool(_) => "bool".to_owned(),
            Self::Int(_) => "int".to_owned(),
            Self::Float(_) => "float".to_owned(),
            Self::Str(_) => "str".to_owned(),
            Self::Tuple(_) => "tuple".to_owned(),
            Self::List(_) => "list".to_owned(),
            Self::Dict(_) => "dict".to_owned(),
            Self::Set(_) => "set".to_owned(),
            Self::Slice(_) => "slice".to_owned(),
            Self::Object(obj) => crate::heap::type_name(obj),
        }
    }

    #[must_use]
    pub fn py_repr(&self) -> String {
        match self {
            Self::None => "None".to_owned(),
            Self::Bool(true) => "True".to_owned(),
            Self::Bool(false) => "False".to_owned(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::Str(s) => string_repr(s),
            Self::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(Self::py_repr).collect();
                if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                }
            }
            Self::List(items) => {
                let parts: Vec<String> = items.borrow().iter().map(Self::py_repr).collect();
                format!("[{}]", parts.join(", "))
            }
            Self::Dict(d) => {
                let parts: Vec<String> = d
                    .borrow()
                    .map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.0.py_repr(), v.py_repr()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Self::Set(s) => {
                let inner = s.borrow();
                if inner.map.is_empty() {
                    "set()".to_owned()
                } else {
                    let parts: Vec<String> = inner.map.keys().map(|k| k.0.py_repr()).collect();
                    format!("{{{}}}", parts.join(", "))
                }
            }
            Self::Slice(slice) => format!(
                "slice({}, {}, {})",
                slice.start.py_repr(),
                slice.stop.py_repr(),
                slice.step.py_repr()
            ),
            Self::Object(obj) => crate::heap::py_repr(obj),
        }
    }

    #[must_use]
    pub fn py_str(&self) -> String {
        match self {
            Self::Str(s) => s.to_string(),
            other => other.py_repr(),
        }
    }

    /// Python equality (`==`), used by `dict`/`set` lookups and `COMPARE_OP`.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        use Value::{Bool, Dict, Float, Int, List, None as VNone, Object, Set, Slice as VSlice, Str, Tuple};
        match (self, other) {
            (VNone, VNone) => true,
            (Bool(a), Bool(b)) => a == b,
            (Bool(a), Int(b)) | (Int(b), Bool(a)) => BigInt::from(i64::from(*a)) == *b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => a.to_f64().is_some_and(|a| a == *b),
            (Bool(a), Float(b)) | (Float(b), Bool(a)) => (f64::from(u8::from(*a))) == *b,
            (Str(a), Str(b)) => a == b,
            (Tuple(a), Tuple(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.py_eq(y)),
            (List(a), List(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.py_eq(y))
            }
            (Dict(a), Dict(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.map.len() == b.map.len() && a.map.iter().all(|(k, v)| b.map.get(k).is_some_and(|bv| bv.py_eq(v)))
            }
            (Set(a), Set(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.map.len() == b.map.len() && a.map.keys().all(|k| b.map.contains_key(k))
            }
            (VSlice(a), VSlice(b)) => a.start.py_eq(&b.start) && a.stop.py_eq(&b.stop) && a.step.py_eq(&b.step),
            (Object(a), Object(b)) => crate::heap::py_eq(a, b),
            _ => false,
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`. Returns `None` for incomparable
    /// types (the caller raises `TypeError`).
    #[must_use]
    pub fn py_cmp(&self, other: &Self) -> Option<Ordering> {
        use Value::{Bool, Float, Int, Str};
        match (self, other) {
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Int(a), Float(b)) => a.to_f64()?.partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&b.to_f64()?),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Bool(a), Int(b)) => Some(BigInt::from(i64::from(*a)).cmp(b)),
            (Int(a), Bool(b)) => Some(a.cmp(&BigInt::from(i64::from(*b)))),
            (Str(a), Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    #[must_use]
    pub fn py_hash(&self) -> Option<i64> {
        match self {
            Self::None => Some(0),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(i.to_i64().unwrap_or_else(|| {
                let (sign, digits) = i.to_u32_digits();
                let mut h: i64 = 0;
                for d in digits {
                    h = h.wrapping_mul(1_000_003).wrapping_add(i64::from(d));
                }
                if sign == num_bigint::Sign::Minus { -h } else { h }
            })),
            Self::Float(f) => Some(f.to_bits() as i64),
            Self::Str(s) => {
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                s.hash(&mut hasher);
                Some(hasher.finish() as i64)
            }
            Self::Tuple(items) => {
                let mut acc: i64 = 0x345678;
                for item in items.iter() {
                    acc = acc.wrapping_mul(1_000_003).wrapping_add(item.py_hash()?);
                }
                Some(acc)
            }
            Self::Object(obj) => crate::heap::py_hash(obj),
            Self::List(_) | Self::Dict(_) | Self::Set(_) | Self::Slice(_) => None,
        }
    }
}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.py_hash().unwrap_or(0).hash(state);
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.py_eq(&other.0)
    }
}

impl Eq for HashKey {}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.py_repr())
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_owned()
    } else if f.is_infinite() {
        if f > 0.0 { "inf".to_owned() } else { "-inf".to_owned() }
    } else {
        let s = f.to_string();
        if s.contains('.') || s.contains('e') { s } else { format!("{s}.0") }
    }
}

fn string_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_and_int_are_hash_and_eq_consistent() {
        let one = Value::Int(BigInt::from(1));
        let t = Value::Bool(true);
        assert!(one.py_eq(&t));
        assert_eq!(one.py_hash(), t.py_hash());
    }

    #[test]
    fn float_repr_always_has_a_decimal_point() {
        assert_eq!(Value::Float(3.0).py_repr(), "3.0");
        assert_eq!(Value::Float(3.5).py_repr(), "3.5");
    }

    #[test]
    fn string_repr_prefers_single_quotes() {
        assert_eq!(string_repr("hi"), "'hi'");
        assert_eq!(string_repr("it's"), "\"it's\"");
    }
}
