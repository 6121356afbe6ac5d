//! User-defined functions: a code object plus the closure environment it
//! needs to run (globals module, default arguments, free-variable cells).

use std::rc::Rc;

use indexmap::IndexMap;

use crate::{bytecode::CodeObject, heap::ObjRef, value::Value};

pub struct Function {
    pub name: String,
    pub qualname: String,
    pub code: Rc<CodeObject>,
    /// The module whose `dict` backs `LOAD_GLOBAL`/`STORE_GLOBAL` for this
    /// function, regardless of where it is later called from.
    pub globals: ObjRef,
    pub defaults: Vec<Value>,
    pub kwdefaults: IndexMap<String, Value>,
    /// One `Cell` heap object per free variable, in `code.freevars` order.
    pub closure: Vec<ObjRef>,
    pub doc: Option<String>,
    pub annotations: IndexMap<String, Value>,
}

impl Function {
    #[must_use]
    pub fn new(code: Rc<CodeObject>, globals: ObjRef) -> Self {
        Self {
            name: code.name.clone(),
            qualname: code.name.clone(),
            code,
            globals,
            defaults: Vec::new(),
            kwdefaults: IndexMap::new(),
            closure: Vec::new(),
            doc: None,
            annotations: IndexMap::new(),
        }
    }
}
