//! Module objects: the namespace a compiled file or package `__init__`
//! executes into, and the unit cached by the import subsystem.

use indexmap::IndexMap;

use crate::value::Value;

pub struct Module {
    pub name: String,
    pub dict: IndexMap<String, Value>,
    pub file_path: Option<String>,
    /// `Some` for a package (a directory with `__init__.py`), giving the
    /// search path used when resolving `from .sibling import x`.
    pub package_path: Option<String>,
}

impl Module {
    #[must_use]
    pub fn new(name: String, file_path: Option<String>) -> Self {
        Self { name, dict: IndexMap::new(), file_path, package_path: None }
    }
}
