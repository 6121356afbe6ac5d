//! Bound methods, native builtins, and the descriptor trio
//! (`property`/`classmethod`/`staticmethod`).

use crate::{builtins::BuiltinId, value::Value};

/// A user-defined function bound to an instance (the result of the
/// descriptor protocol's `__get__` on a plain `Function` accessed through
/// an instance).
pub struct Method {
    pub func: Value,
    pub self_value: Value,
    pub func_name: String,
}

/// A native, Rust-implemented callable. Builtins are identified by
/// [`BuiltinId`] rather than a boxed closure, keeping with the tagged-sum
/// dispatch style used throughout the object model instead of trait
/// objects.
pub struct Builtin {
    pub name: String,
    pub id: BuiltinId,
    /// `Some` for a builtin bound to a receiver (e.g. `[].append`, a bound
    /// method on a built-in container), `None` for a free function like
    /// `len` or `isinstance`.
    pub bound_self: Option<Value>,
}

pub struct Property {
    pub fget: Option<Value>,
    pub fset: Option<Value>,
    pub fdel: Option<Value>,
    pub doc: Option<String>,
}

pub struct Classmethod {
    pub func: Value,
}

pub struct Staticmethod {
    pub func: Value,
}
