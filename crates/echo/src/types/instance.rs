//! Plain instances of user-defined (or built-in) classes.

use std::{cell::RefCell, rc::Rc};

use crate::{
    heap::ObjRef,
    value::{HashKey, PyDict, Value},
};

pub struct Instance {
    pub class: ObjRef,
    /// Backing storage for `instance.__dict__`: a real `dict` object, not a
    /// private map, so `instance.__dict__['x'] = v` (spec.md §4.2's special
    /// `__dict__` name) reads and writes the same storage `getattr`/
    /// `setattr` use.
    pub dict: Rc<RefCell<PyDict>>,
    /// Set when the instance's class (or an ancestor) defines `__bool__` or
    /// `__len__` and evaluating it at construction time is impractical;
    /// left `None` for ordinary instances, which are always truthy.
    pub bool_override: Option<bool>,
    /// `false` once a class defines `__eq__` without `__hash__` (CPython
    /// sets `__hash__ = None` in that case), matching "unhashable type".
    pub hashable: bool,
    /// Backing storage for a user subclass of a built-in container type
    /// (`class MyList(list): ...`). `None` for ordinary instances.
    pub builtin_base: Option<Value>,
}

impl Instance {
    #[must_use]
    pub fn new(class: ObjRef) -> Self {
        Self { class, dict: Rc::new(RefCell::new(PyDict::default())), bool_override: None, hashable: true, builtin_base: None }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        let key = HashKey::new(Value::Str(Rc::from(name)))?;
        self.dict.borrow().map.get(&key).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        if let Some(key) = HashKey::new(Value::Str(Rc::from(name))) {
            self.dict.borrow_mut().map.insert(key, value);
        }
    }

    pub fn remove(&self, name: &str) -> bool {
        HashKey::new(Value::Str(Rc::from(name))).is_some_and(|key| self.dict.borrow_mut().map.shift_remove(&key).is_some())
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.dict.borrow().map.keys().filter_map(|k| match &k.0 { Value::Str(s) => Some(s.to_string()), _ => None }).collect()
    }

    /// `instance.__dict__`: the live dict, not a snapshot -- mutating it
    /// through ordinary `dict` operations is visible to subsequent
    /// attribute access the same way CPython's is.
    #[must_use]
    pub fn dict_value(&self) -> Value {
        Value::Dict(Rc::clone(&self.dict))
    }
}
