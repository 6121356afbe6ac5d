//! The object-model tagged sum: every non-immediate Python object besides
//! `str`/`list`/`dict`/`set`/`tuple` (which live directly on [`crate::value::Value`])
//! is a [`HeapObject`] behind an `Rc<RefCell<_>>`.
//!
//! Dispatch is by explicit `match` rather than trait objects, per spec.md
//! §9's "tagged sum + switch-and-dispatch" guidance and mirroring the
//! teacher's `object.rs` `HeapData` enum.

use std::{cell::RefCell, rc::Rc};

use crate::bytecode::CodeObject;
use crate::types::{
    cell::Cell,
    class::Class,
    exception::ExceptionObj,
    function::Function,
    generator::Generator,
    method::{Builtin, Classmethod, Method, Property, Staticmethod},
    module::Module,
    native_iter::NativeIter,
    partial::Partial,
    instance::Instance,
    super_::SuperObj,
};

pub type ObjRef = Rc<RefCell<HeapObject>>;

pub enum HeapObject {
    Module(Module),
    Class(Class),
    Instance(Instance),
    Function(Function),
    Method(Method),
    Builtin(Builtin),
    Property(Property),
    Classmethod(Classmethod),
    Staticmethod(Staticmethod),
    Super(SuperObj),
    Generator(Generator),
    Exception(ExceptionObj),
    Partial(Partial),
    Cell(Cell),
    NativeIter(NativeIter),
    /// A nested code object reached via `co_consts`, not a Python-visible
    /// value in its own right -- `MAKE_FUNCTION` is the only consumer,
    /// pulling it back out to build a [`crate::types::function::Function`].
    Code(Rc<CodeObject>),
}

/// Wraps a freshly built [`HeapObject`] in the standard `Rc<RefCell<_>>`
/// handle used everywhere else in the crate.
#[must_use]
pub fn wrap(obj: HeapObject) -> ObjRef {
    Rc::new(RefCell::new(obj))
}

impl HeapObject {
    #[must_use]
    pub fn as_class(&self) -> Option<&Class> {
        match self {
            Self::Class(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_class_mut(&mut self) -> Option<&mut Class> {
        match self {
            Self::Class(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Self::Instance(i) => Some(i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_instance_mut(&mut self) -> Option<&mut Instance> {
        match self {
            Self::Instance(i) => Some(i),
            _ => None,
        }
    }
}

#[must_use]
pub fn type_name(obj: &ObjRef) -> String {
    match &*obj.borrow() {
        HeapObject::Module(_) => "module".to_owned(),
        HeapObject::Class(c) => c.metaclass_name(),
        HeapObject::Instance(i) => i.class.borrow().as_class().map_or_else(|| "object".to_owned(), |c| c.name.clone()),
        HeapObject::Function(_) => "function".to_owned(),
        HeapObject::Method(_) => "method".to_owned(),
        HeapObject::Builtin(_) => "builtin_function_or_method".to_owned(),
        HeapObject::Property(_) => "property".to_owned(),
        HeapObject::Classmethod(_) => "classmethod".to_owned(),
        HeapObject::Staticmethod(_) => "staticmethod".to_owned(),
        HeapObject::Super(_) => "super".to_owned(),
        HeapObject::Generator(_) => "generator".to_owned(),
        HeapObject::Exception(e) => e.exc_type_name.clone(),
        HeapObject::Partial(_) => "functools.partial".to_owned(),
        HeapObject::Cell(_) => "cell".to_owned(),
        HeapObject::NativeIter(_) => "iterator".to_owned(),
        HeapObject::Code(_) => "code".to_owned(),
    }
}

#[must_use]
pub fn is_truthy(obj: &ObjRef) -> bool {
    match &*obj.borrow() {
        HeapObject::Instance(i) => i.bool_override.unwrap_or(true),
        HeapObject::Generator(_) | HeapObject::Exception(_) | HeapObject::Cell(_) => true,
        _ => true,
    }
}

#[must_use]
pub fn is_hashable(obj: &ObjRef) -> bool {
    match &*obj.borrow() {
        HeapObject::Instance(i) => i.hashable,
        _ => true,
    }
}

#[must_use]
pub fn py_eq(a: &ObjRef, b: &ObjRef) -> bool {
    Rc::ptr_eq(a, b)
}

#[must_use]
pub fn py_hash(obj: &ObjRef) -> Option<i64> {
    if is_hashable(obj) {
        Some(Rc::as_ptr(obj) as i64)
    } else {
        None
    }
}

#[must_use]
pub fn py_repr(obj: &ObjRef) -> String {
    match &*obj.borrow() {
        HeapObject::Module(m) => format!("<module '{}'>", m.name),
        HeapObject::Class(c) => format!("<class '{}'>", c.name),
        HeapObject::Instance(i) => {
            let class_name = i.class.borrow().as_class().map_or_else(|| "object".to_owned(), |c| c.name.clone());
            format!("<{class_name} object at {:p}>", Rc::as_ptr(obj))
        }
        HeapObject::Function(f) => format!("<function {} at {:p}>", f.name, Rc::as_ptr(obj)),
        HeapObject::Method(m) => format!("<bound method {} of ...>", m.func_name),
        HeapObject::Builtin(b) => format!("<built-in function {}>", b.name),
        HeapObject::Property(_) => "<property object>".to_owned(),
        HeapObject::Classmethod(_) => "<classmethod object>".to_owned(),
        HeapObject::Staticmethod(_) => "<staticmethod object>".to_owned(),
        HeapObject::Super(_) => "<super object>".to_owned(),
        HeapObject::Generator(g) => format!("<generator object {} at {:p}>", g.name, Rc::as_ptr(obj)),
        HeapObject::Exception(e) => e.display(),
        HeapObject::Partial(_) => "<functools.partial object>".to_owned(),
        HeapObject::Cell(_) => format!("<cell at {:p}>", Rc::as_ptr(obj)),
        HeapObject::NativeIter(_) => format!("<iterator at {:p}>", Rc::as_ptr(obj)),
        HeapObject::Code(c) => format!("<code object {} at {:p}>", c.name, Rc::as_ptr(obj)),
    }
}
