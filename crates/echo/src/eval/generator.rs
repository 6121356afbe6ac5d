//! Resuming a suspended generator frame.
//!
//! Per spec.md §5, `YIELD_VALUE` is the only suspension point: a generator
//! owns its [`crate::frame::Frame`] outright, so resuming it is "run this
//! frame until it yields, returns, or raises" -- no separate scheduler.

use crate::{
    exc::RunResult,
    heap::{HeapObject, ObjRef},
};

/// Advances a generator by one step, returning the next yielded value or
/// `None` once it returns. A generator that already finished (or never
/// started and is asked to resume again after exhaustion) just reports
/// `None` -- `next()` turns that into `StopIteration`.
///
/// The real return value of a finished generator (if any) is not
/// surfaced here: spec.md's iterator protocol only asks for "exhausted or
/// not", not `StopIteration.value`.
pub fn resume(ctx: &mut crate::context::Context, rc: &ObjRef) -> RunResult<Option<crate::value::Value>> {
    let mut frame = {
        let mut borrowed = rc.borrow_mut();
        let HeapObject::Generator(gen) = &mut *borrowed else {
            return Err(crate::exc::RunError::type_error("resume() called on a non-generator"));
        };
        if gen.finished {
            return Ok(None);
        }
        let already_started = gen.started;
        let frame = match gen.frame.take() {
            Some(frame) => frame,
            None => return Ok(None),
        };
        if already_started {
            // YIELD_VALUE popped the yielded value off the stack; resuming
            // past it (into whatever follows -- e.g. a statement-level
            // yield's POP_TOP) needs the `.send()` argument pushed back on,
            // same as CPython does. `next()` always sends `None`.
            let mut frame = frame;
            frame.push(crate::value::Value::None);
            frame
        } else {
            frame
        }
    };

    let step = crate::eval::run_frame(ctx, &mut frame);

    let mut borrowed = rc.borrow_mut();
    let HeapObject::Generator(gen) = &mut *borrowed else { unreachable!() };
    gen.started = true;
    match step {
        Ok(crate::eval::FrameStep::Yielded(value)) => {
            gen.frame = Some(frame);
            Ok(Some(value))
        }
        Ok(crate::eval::FrameStep::Returned(_)) => {
            gen.finished = true;
            Ok(None)
        }
        Err(err) => {
            gen.finished = true;
            Err(err)
        }
    }
}
