//! The heap-object form of an exception instance: what `raise` actually
//! constructs and what `except ... as e:` binds.

use indexmap::IndexMap;

use crate::{exc::TracebackEntry, heap::ObjRef, value::Value};

pub struct ExceptionObj {
    pub exc_type_name: String,
    /// The class object this instance belongs to (a built-in exception
    /// class or a user-defined subclass of one).
    pub class: ObjRef,
    pub args: Vec<Value>,
    pub dict: IndexMap<String, Value>,
    pub traceback: Vec<TracebackEntry>,
    pub cause: Option<Value>,
    pub context: Option<Value>,
}

impl ExceptionObj {
    #[must_use]
    pub fn display(&self) -> String {
        let msg = match self.args.as_slice() {
            [] => String::new(),
            [one] => one.py_str(),
            many => format!("({})", many.iter().map(Value::py_repr).collect::<Vec<_>>().join(", ")),
        };
        if msg.is_empty() {
            self.exc_type_name.clone()
        } else {
            format!("{}: {msg}", self.exc_type_name)
        }
    }
}
