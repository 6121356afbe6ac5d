//! Block-stack exception handling, matching CPython 3.7's own algorithm
//! since the bytecode this crate runs is produced by a real `compile()`
//! call and already assumes that algorithm's stack conventions (the
//! `DUP_TOP`/`COMPARE_OP exception-match`/`POP_EXCEPT`/`END_FINALLY`
//! sequences an `except` clause compiles to).
//!
//! Grounded on spec.md §4.3's restated version of that same algorithm.

use crate::{
    context::Context,
    exc::{PyException, RunError, RunResult},
    frame::{BlockEntry, BlockKind, Frame, PendingUnwind},
    heap::{wrap, HeapObject},
    types::exception::ExceptionObj,
    value::Value,
};

/// What unwinding a raised exception into the block stack produced.
pub enum Unwound {
    /// A handler block caught it; the frame's `ip` now points at the
    /// handler and the three exception values are already on the value
    /// stack (traceback, value, type -- type on top, as CPython pushes
    /// them), ready for the `DUP_TOP`/`COMPARE_OP`/`END_FINALLY` sequence
    /// the compiled bytecode expects.
    Handled,
    /// No block caught it; the frame itself fails with this exception.
    Propagate(RunError),
}

/// Builds the three stack values (type, value, traceback) CPython pushes
/// when a `SETUP_EXCEPT`/`SETUP_FINALLY` block catches a raised exception,
/// and the user-visible exception object itself.
pub fn materialize(ctx: &mut Context, exc: &PyException) -> (Value, Value, Value) {
    let exc_value = exc.value.clone().unwrap_or_else(|| {
        let class = ctx
            .builtin_classes
            .get(exc.exc_type.as_str())
            .cloned()
            .unwrap_or_else(|| ctx.builtin_class("Exception"));
        let args = if exc.message.is_empty() { vec![] } else { vec![Value::Str(exc.message.clone().into())] };
        Value::Object(wrap(HeapObject::Exception(ExceptionObj {
            exc_type_name: exc.exc_type.clone(),
            class,
            args,
            dict: indexmap::IndexMap::new(),
            traceback: exc.traceback.clone(),
            cause: None,
            context: None,
        })))
    });
    let exc_type = ctx.type_of(&exc_value);
    (Value::Object(exc_type), exc_value, Value::None)
}

/// Walks `frame`'s block stack from the top looking for a block that
/// catches exceptions (`Finally`/`With`; `Loop` blocks only matter for
/// `break`/`continue` and are simply unwound past). On a hit, the block
/// is converted into an `ExceptHandler` entry (so a nested `raise` inside
/// the handler unwinds past it rather than looping back into itself) and
/// the three exception values are pushed for the handler bytecode to
/// consume.
pub fn unwind(ctx: &mut Context, frame: &mut Frame, err: RunError) -> Unwound {
    let RunError::Exception(exc) = &err else {
        return Unwound::Propagate(err);
    };
    ctx.tracer.on_exception(&exc.exc_type, &exc.message);

    while let Some(block) = frame.block_stack.pop() {
        if matches!(block.kind, BlockKind::Except | BlockKind::Finally | BlockKind::With) {
            frame.value_stack.truncate(block.stack_depth);
            let (exc_type, exc_value, exc_tb) = materialize(ctx, exc);
            frame.push(exc_tb);
            frame.push(exc_value);
            frame.push(exc_type);
            frame.block_stack.push(BlockEntry { kind: BlockKind::ExceptHandler, handler: block.handler, stack_depth: block.stack_depth });
            frame.ip = frame.code.index_at_offset(block.handler as u32).unwrap_or(frame.ip);
            frame.current_exception = Some(exc.clone());
            return Unwound::Handled;
        }
    }
    Unwound::Propagate(err)
}

/// `POP_EXCEPT`: pops the surrounding `ExceptHandler` block, restoring the
/// value stack to the level it had at handler entry (the three exception
/// values this crate's `unwind` pushed are expected to already be consumed
/// by the handler bytecode at this point).
pub fn pop_except(frame: &mut Frame) {
    if matches!(frame.block_stack.last(), Some(b) if b.kind == BlockKind::ExceptHandler) {
        frame.block_stack.pop();
    }
}

/// Outcome of trying to run a `return`/`break`/`continue` out through the
/// block stack: either it was caught by a `Finally`/`With` cleanup block
/// (whose body now runs, `frame.ip` already pointing at it) or by the
/// matching `Loop` (for `break`/`continue`), or nothing caught it at all.
pub enum WhyOutcome {
    Handled,
    Uncaught,
}

/// Scans `frame`'s block stack from the top for whatever catches `why`,
/// exactly mirroring CPython 3.7's `fast_block_end` loop: `Except` blocks
/// never catch control flow (only exceptions do, via [`unwind`]); `Loop`
/// blocks catch `Break`/`Continue` for themselves and are simply popped out
/// from under a `Return`; `Finally`/`With` blocks catch everything, run
/// their cleanup body, and land back here (via `END_FINALLY`) to keep
/// unwinding once that body completes.
pub fn propagate_why(frame: &mut Frame, why: PendingUnwind) -> WhyOutcome {
    while let Some(block) = frame.block_stack.last().copied() {
        match block.kind {
            BlockKind::Except | BlockKind::ExceptHandler => {
                frame.block_stack.pop();
            }
            BlockKind::Loop => match &why {
                PendingUnwind::Break => {
                    frame.block_stack.pop();
                    frame.value_stack.truncate(block.stack_depth);
                    frame.ip = frame.code.index_at_offset(block.handler as u32).unwrap_or(frame.ip);
                    return WhyOutcome::Handled;
                }
                PendingUnwind::Continue(target) => {
                    frame.value_stack.truncate(block.stack_depth);
                    frame.ip = frame.code.index_at_offset(*target as u32).unwrap_or(frame.ip);
                    return WhyOutcome::Handled;
                }
                PendingUnwind::Return(_) => {
                    frame.block_stack.pop();
                }
            },
            BlockKind::Finally | BlockKind::With => {
                frame.block_stack.pop();
                frame.value_stack.truncate(block.stack_depth);
                frame.pending_unwind = Some(why);
                frame.ip = frame.code.index_at_offset(block.handler as u32).unwrap_or(frame.ip);
                return WhyOutcome::Handled;
            }
        }
    }
    WhyOutcome::Uncaught
}

/// `END_FINALLY`: either re-raises a class/instance the handler bytecode
/// left on top of the stack (the exception-unwind path from [`unwind`]), or
/// -- if a `return`/`break`/`continue` is mid-propagation through this
/// cleanup block -- tries to push it further out through any remaining
/// `Finally`/`With` blocks.
pub fn end_finally(frame: &mut Frame) -> RunResult<()> {
    if let Some(why) = frame.pending_unwind.take() {
        if matches!(propagate_why(frame, why.clone()), WhyOutcome::Handled) {
            return Ok(());
        }
        match why {
            PendingUnwind::Return(value) => frame.returning = Some(value),
            PendingUnwind::Break | PendingUnwind::Continue(_) => {
                unreachable!("break/continue always has an enclosing loop block")
            }
        }
        return Ok(());
    }
    let Some(top) = frame.value_stack.pop() else {
        return Ok(());
    };
    match top {
        Value::Object(rc) if matches!(&*rc.borrow(), HeapObject::Class(_) | HeapObject::Exception(_)) => {
            let exc_value = frame.pop();
            let _exc_tb = frame.pop();
            let exc_type_name = match &*rc.borrow() {
                HeapObject::Class(c) => c.name.clone(),
                HeapObject::Exception(e) => e.exc_type_name.clone(),
                _ => unreachable!(),
            };
            Err(RunError::Exception(PyException {
                exc_type: exc_type_name,
                message: exc_message(&exc_value),
                value: Some(exc_value),
                traceback: Vec::new(),
            }))
        }
        Value::None => Ok(()),
        _ => Err(RunError::simple("SystemError", "'finally' pops bad exception")),
    }
}

fn exc_message(value: &Value) -> String {
    if let Value::Object(rc) = value {
        if let HeapObject::Exception(e) = &*rc.borrow() {
            return e.args.first().map(Value::py_str).unwrap_or_default();
        }
    }
    String::new()
}

/// `COMPARE_OP` argument index 10, CPython's "exception match" pseudo-
/// comparison: `isinstance`-style check used by `except Foo:` clauses,
/// except the left operand is always an exception type rather than an
/// instance.
pub fn exception_match(ctx: &Context, raised_type: &Value, candidate: &Value) -> RunResult<bool> {
    let Value::Object(candidate_rc) = candidate else {
        return Err(RunError::type_error("catching classes that do not inherit from BaseException is not allowed"));
    };
    if !matches!(&*candidate_rc.borrow(), HeapObject::Class(_)) {
        if let Value::Tuple(items) = candidate {
            for item in items.iter() {
                if exception_match(ctx, raised_type, item)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }
        return Err(RunError::type_error("catching classes that do not inherit from BaseException is not allowed"));
    }
    Ok(same_or_builtin_subclass(raised_type, candidate_rc))
}

fn same_or_builtin_subclass(raised_type: &Value, candidate: &crate::heap::ObjRef) -> bool {
    let Value::Object(raised_rc) = raised_type else { return false };
    if std::rc::Rc::ptr_eq(raised_rc, candidate) {
        return true;
    }
    raised_rc.borrow().as_class().is_some_and(|c| c.is_subclass_of(candidate))
}
