//! `functools.partial`-style argument currying, used internally to
//! represent a classmethod/staticmethod already bound to its owning class
//! before it reaches the call machinery.

use indexmap::IndexMap;

use crate::value::Value;

pub struct Partial {
    pub func: Value,
    pub args: Vec<Value>,
    pub kwargs: IndexMap<String, Value>,
}
