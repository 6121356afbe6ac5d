//! `super()` proxy objects.
//!
//! `super(StartClass, obj_or_cls)` looks up attributes starting one step
//! past `StartClass` in `obj_or_cls`'s actual (possibly more-derived) MRO --
//! not `StartClass`'s own MRO -- which is what makes cooperative
//! multiple-inheritance chains work. See spec.md §4.2.

use crate::{heap::ObjRef, value::Value};

pub struct SuperObj {
    /// The class argument to `super()`: attribute search begins at the
    /// class immediately following this one in `mro_source`'s MRO.
    pub start_class: ObjRef,
    /// The instance (or class, for `super(C, D)` class-method form) whose
    /// MRO is actually walked.
    pub bound: Value,
    /// The class whose MRO supplies the search order: `bound`'s class for
    /// an instance, or `bound` itself when `bound` is a class.
    pub mro_source: ObjRef,
}
