//! Closure cells: the indirection `LOAD_DEREF`/`STORE_DEREF`/`LOAD_CLOSURE`
//! operate on, shared between an enclosing frame and every nested function
//! that closes over the same variable.

use crate::value::Value;

pub struct Cell {
    pub value: Option<Value>,
}

impl Cell {
    #[must_use]
    pub fn new(value: Option<Value>) -> Self {
        Self { value }
    }
}
