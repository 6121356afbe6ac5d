//! Classes, method resolution order, and metaclass instantiation.
//!
//! Grounded on the teacher's `types/class.rs` `ClassObject` (dict, bases,
//! subclasses tracked by weak reference so the inheritance graph doesn't
//! keep every subclass alive forever). The MRO algorithm itself is switched
//! from the teacher's preorder-DFS heuristic to C3 linearization, per
//! SPEC_FULL.md §13's open-question resolution.

use std::rc::{Rc, Weak};

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::{
    exc::{RunError, RunResult},
    heap::ObjRef,
    value::Value,
};

pub struct Class {
    pub name: String,
    pub qualname: String,
    pub bases: Vec<ObjRef>,
    /// Computed once at class-creation time by [`compute_mro`].
    pub mro: Vec<ObjRef>,
    pub dict: IndexMap<String, Value>,
    /// `None` means the implicit metaclass is `type` (the common case);
    /// `Some` holds an explicit `metaclass=` argument or one inherited from
    /// a base whose own metaclass is more derived, per §4.2's metaclass
    /// selection rule.
    pub metaclass: Option<ObjRef>,
    /// Subclasses that registered themselves here; weak so a subclass being
    /// garbage collected doesn't need this class to drop it explicitly.
    pub subclasses: Vec<Weak<std::cell::RefCell<crate::heap::HeapObject>>>,
    pub is_builtin: bool,
}

impl Class {
    /// Builds the class with an empty `mro`; callers must wrap the result in
    /// an [`ObjRef`] and call [`link_mro`] before the class is usable, since
    /// C3 linearization needs the class's own handle to put `self` first.
    #[must_use]
    pub fn new_unlinked(name: String, bases: Vec<ObjRef>, dict: IndexMap<String, Value>, metaclass: Option<ObjRef>) -> Self {
        Self {
            qualname: name.clone(),
            name,
            bases,
            mro: Vec::new(),
            dict,
            metaclass,
            subclasses: Vec::new(),
            is_builtin: false,
        }
    }

    #[must_use]
    pub fn metaclass_name(&self) -> String {
        self.metaclass.as_ref().map_or_else(|| "type".to_owned(), |m| {
            m.borrow().as_class().map_or_else(|| "type".to_owned(), |c| c.name.clone())
        })
    }

    /// Looks up `name` along the MRO, returning the first hit's owning class
    /// and the raw attribute value (descriptors are resolved by the caller,
    /// see `context::getattr_instance`/`getattr_class`).
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        for base in &self.mro {
            if let Some(v) = base.borrow().as_class().and_then(|c| c.dict.get(name).cloned()) {
                return Some(v);
            }
        }
        None
    }

    #[must_use]
    pub fn is_subclass_of(&self, other: &ObjRef) -> bool {
        self.mro.iter().any(|c| Rc::ptr_eq(c, other))
    }

    pub fn register_subclass(&mut self, subclass: &ObjRef) {
        self.subclasses.push(Rc::downgrade(subclass));
    }

    #[must_use]
    pub fn live_subclasses(&self) -> Vec<ObjRef> {
        self.subclasses.iter().filter_map(Weak::upgrade).collect()
    }
}

/// Computes `self_obj`'s MRO in place: `L[C] = C + merge(L[B1], ..., L[Bn],
/// [B1, ..., Bn])`. Must be called exactly once, right after `self_obj` is
/// wrapped, before the class is published anywhere else (e.g. registered as
/// a subclass of its bases).
///
/// Returns `TypeError` when no consistent order exists (e.g. bases given in
/// an order that contradicts their own inheritance), matching CPython's own
/// diagnostic for the same failure.
pub fn link_mro(self_obj: &ObjRef) -> RunResult<()> {
    let (name, bases) = {
        let borrowed = self_obj.borrow();
        let class = borrowed.as_class().expect("link_mro called on a non-class object");
        (class.name.clone(), class.bases.clone())
    };

    let mut sequences: Vec<Vec<ObjRef>> = bases
        .iter()
        .map(|b| b.borrow().as_class().map(|c| c.mro.clone()).unwrap_or_default())
        .collect();
    sequences.push(bases.clone());

    let mut result = vec![Rc::clone(self_obj)];
    loop {
        sequences.retain(|seq| !seq.is_empty());
        if sequences.is_empty() {
            break;
        }
        let mut chosen = None;
        'candidates: for seq in &sequences {
            let head = &seq[0];
            for other in &sequences {
                if other[1..].iter().any(|c| Rc::ptr_eq(c, head)) {
                    continue 'candidates;
                }
            }
            chosen = Some(Rc::clone(head));
            break;
        }
        let Some(head) = chosen else {
            return Err(RunError::type_error(format!(
                "Cannot create a consistent method resolution order (MRO) for bases of class '{name}'"
            )));
        };
        for seq in &mut sequences {
            seq.retain(|c| !Rc::ptr_eq(c, &head));
        }
        result.push(head);
    }

    self_obj.borrow_mut().as_class_mut().expect("link_mro called on a non-class object").mro = result;
    Ok(())
}

#[must_use]
pub fn subclass_set_contains(set: &AHashSet<usize>, obj: &ObjRef) -> bool {
    set.contains(&(Rc::as_ptr(obj) as usize))
}
