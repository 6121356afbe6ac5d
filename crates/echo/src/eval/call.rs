//! Invoking a user-defined [`crate::types::function::Function`]: binding
//! arguments into a fresh frame, wiring closure cells, and either running
//! the frame to completion or, for a generator/coroutine function, handing
//! back a suspended [`crate::types::generator::Generator`] without running
//! a single instruction of its body.
//!
//! Grounded on `bytecode/vm/mod.rs`'s `call_function`/frame-setup path and
//! spec.md §4.1's argument-binding algorithm (delegated to
//! [`crate::signature::Signature::bind`]).

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    context::Context,
    exc::{RunError, RunResult, TracebackEntry},
    frame::Frame,
    heap::{wrap, HeapObject, ObjRef},
    types::{cell::Cell, generator::Generator},
    value::Value,
};

pub fn call_function(ctx: &mut Context, rc: &ObjRef, args: &[Value], kwargs: &IndexMap<String, Value>) -> RunResult<Value> {
    let (name, code, globals, defaults, kwdefaults, closure) = {
        let borrowed = rc.borrow();
        let HeapObject::Function(f) = &*borrowed else {
            return Err(RunError::type_error("object is not a function"));
        };
        (f.name.clone(), Rc::clone(&f.code), Rc::clone(&f.globals), f.defaults.clone(), f.kwdefaults.clone(), f.closure.clone())
    };

    ctx.tracer.on_call(&name);

    let signature = code.signature(defaults, kwdefaults);
    let slots = signature.bind(&name, args, kwargs)?;

    let mut cells = Vec::with_capacity(code.cellvars.len() + code.freevars.len());
    for cellvar in &code.cellvars {
        let initial = code.local_index(cellvar).and_then(|i| slots.get(i).cloned().flatten());
        cells.push(wrap(HeapObject::Cell(Cell::new(initial))));
    }
    cells.extend(closure);

    let filename = code.filename.clone();
    let is_generator = code.is_generator();
    let is_coroutine = code.is_coroutine();
    let mut frame = Frame::new(code, name.clone(), filename, globals, cells);
    for (i, slot) in slots.into_iter().enumerate() {
        if i < frame.locals.len() {
            frame.locals[i] = slot;
        }
    }

    if is_generator || is_coroutine {
        let generator = Generator::new(name, Box::new(frame), is_coroutine);
        return Ok(Value::Object(wrap(HeapObject::Generator(generator))));
    }

    run_to_completion(ctx, &mut frame, &name)
}

/// Runs a `class` statement's body function to completion, collecting the
/// namespace its `STORE_NAME`s wrote into rather than its return value
/// (which is always `None`). This is the first half of `__build_class__`.
pub fn run_class_body(ctx: &mut Context, rc: &ObjRef) -> RunResult<IndexMap<String, Value>> {
    let (name, code, globals, closure) = {
        let borrowed = rc.borrow();
        let HeapObject::Function(f) = &*borrowed else {
            return Err(RunError::type_error("__build_class__: func must be a function"));
        };
        (f.name.clone(), Rc::clone(&f.code), Rc::clone(&f.globals), f.closure.clone())
    };

    let mut cells = Vec::with_capacity(code.cellvars.len() + code.freevars.len());
    for _ in &code.cellvars {
        cells.push(wrap(HeapObject::Cell(Cell::new(None))));
    }
    cells.extend(closure);

    let filename = code.filename.clone();
    let mut frame = Frame::new(code, name.clone(), filename, globals, cells);
    let namespace = Rc::new(RefCell::new(IndexMap::new()));
    frame.name_scope = Some(Rc::clone(&namespace));

    run_to_completion(ctx, &mut frame, &name)?;
    Ok(Rc::try_unwrap(namespace).map(RefCell::into_inner).unwrap_or_else(|rc| rc.borrow().clone()))
}

/// Zero-argument `super()`: CPython's compiler gives any method body that
/// mentions a bare `super()` (or `__class__`) an implicit `__class__` cell,
/// and the calling frame's first fast local is `self`/`cls`. This mirrors
/// `super_init_without_args` in CPython's own `typeobject.c` -- the cell is
/// searched among this frame's cellvars/freevars by name rather than a fixed
/// slot, since the compiler places it wherever the method's other cells go.
pub fn resolve_bare_super(frame: &Frame) -> RunResult<(ObjRef, Value)> {
    let cell_idx = (0..frame.cells.len()).find(|&i| crate::eval::cell_name(&frame.code, i) == "__class__");
    let Some(cell_idx) = cell_idx else {
        return Err(RunError::simple("RuntimeError", "super(): __class__ cell not found"));
    };
    let Some(Value::Object(class)) = crate::eval::cell_value(&frame.cells[cell_idx]) else {
        return Err(RunError::simple("RuntimeError", "super(): empty __class__ cell"));
    };
    let Some(self_value) = frame.locals.first().cloned().flatten() else {
        return Err(RunError::simple("RuntimeError", "super(): no arguments"));
    };
    Ok((class, self_value))
}

/// Drives a freshly built, non-generator frame to completion, attaching a
/// traceback entry if it raises.
pub fn run_to_completion(ctx: &mut Context, frame: &mut Frame, name: &str) -> RunResult<Value> {
    match crate::eval::run_frame(ctx, frame) {
        Ok(crate::eval::FrameStep::Returned(value)) => Ok(value),
        Ok(crate::eval::FrameStep::Yielded(_)) => Err(RunError::type_error(format!("{name}() yielded outside of a generator"))),
        Err(mut err) => {
            err.push_frame(TracebackEntry { file: frame.filename.clone(), line: frame.current_line, func_name: name.to_owned() });
            Err(err)
        }
    }
}

