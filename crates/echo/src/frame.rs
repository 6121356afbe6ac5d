//! Frame state: one activation record per function call, generator, or
//! module body currently executing (or, for a generator, suspended).
//!
//! Grounded on `bytecode/vm/mod.rs`'s frame lifecycle and spec.md §3's Frame
//! / Block entry data model.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{bytecode::CodeObject, heap::ObjRef, value::Value};

/// One entry of the block stack spec.md §3 describes: pushed by
/// `SETUP_FINALLY`/`SETUP_WITH` and popped by `POP_BLOCK` or unwound by the
/// exception-handling algorithm in `eval::exceptions`.
#[derive(Debug, Clone, Copy)]
pub struct BlockEntry {
    pub kind: BlockKind,
    /// Instruction index to jump to if this block is triggered (an
    /// exception unwinds into it, or `break`/`continue` target it).
    pub handler: usize,
    /// Value-stack depth to restore to when the block is entered/unwound.
    pub stack_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Loop,
    /// A `SETUP_EXCEPT` block: catches raised exceptions but, unlike
    /// `Finally`/`With`, does not intercept a plain `return`/`break`/
    /// `continue` falling out of its try-body.
    Except,
    Finally,
    ExceptHandler,
    With,
}

/// A `return`/`break`/`continue` working its way out through any `Finally`/
/// `With` blocks in between, set aside while the intervening cleanup body
/// runs and consulted again by `END_FINALLY`.
#[derive(Debug, Clone)]
pub enum PendingUnwind {
    Return(Value),
    Break,
    Continue(usize),
}

pub struct Frame {
    pub code: Rc<CodeObject>,
    pub name: String,
    pub filename: String,
    pub locals: Vec<Option<Value>>,
    /// One cell per `cellvars` entry followed by one per `freevars` entry,
    /// matching `co_cellvars ++ co_freevars` indexing used by
    /// `LOAD_DEREF`/`STORE_DEREF`/`LOAD_CLOSURE`.
    pub cells: Vec<ObjRef>,
    pub globals: ObjRef,
    pub value_stack: Vec<Value>,
    pub block_stack: Vec<BlockEntry>,
    /// Index into `code.instructions`; not a byte offset.
    pub ip: usize,
    pub current_line: u32,
    /// Set by `RETURN_VALUE`/an uncaught exception to unwind the dispatch
    /// loop without a `RunError` (an ordinary return isn't an error).
    pub returning: Option<Value>,
    /// A `return`/`break`/`continue` currently working its way out through
    /// a `Finally`/`With` block's cleanup body, re-checked by `END_FINALLY`.
    pub pending_unwind: Option<PendingUnwind>,
    /// Namespace `STORE_NAME`/`LOAD_NAME`/`DELETE_NAME` write through to
    /// instead of `globals`, for a class body executing between
    /// `LOAD_BUILD_CLASS` and `__build_class__` returning. `None` for
    /// everything else (module bodies use `globals` directly, matching
    /// CPython's `locals() is globals()` at module scope).
    pub name_scope: Option<Rc<RefCell<IndexMap<String, Value>>>>,
    /// The exception last caught by an active handler in this frame, kept
    /// around so a bare `raise` (`RAISE_VARARGS` with no operand) has
    /// something to re-raise. Set by `eval::exceptions::unwind`.
    pub current_exception: Option<crate::exc::PyException>,
}

impl Frame {
    #[must_use]
    pub fn new(code: Rc<CodeObject>, name: String, filename: String, globals: ObjRef, cells: Vec<ObjRef>) -> Self {
        let nlocals = code.nlocals.max(code.varnames.len());
        Self {
            locals: vec![None; nlocals],
            cells,
            globals,
            value_stack: Vec::new(),
            block_stack: Vec::new(),
            ip: 0,
            current_line: code.first_lineno,
            returning: None,
            pending_unwind: None,
            name_scope: None,
            current_exception: None,
            filename,
            name,
            code,
        }
    }

    pub fn push(&mut self, value: Value) {
        self.value_stack.push(value);
    }

    /// Pops a value, treating an empty stack as an interpreter-internal bug
    /// rather than interpreted-program data -- the compiler guarantees
    /// balanced stack effects, so this can only fail if this crate's own
    /// opcode handling is wrong.
    pub fn pop(&mut self) -> Value {
        self.value_stack.pop().expect("value stack underflow")
    }

    #[must_use]
    pub fn peek(&self) -> &Value {
        self.value_stack.last().expect("value stack underflow")
    }

    pub fn pop_n(&mut self, n: usize) -> Vec<Value> {
        let start = self.value_stack.len() - n;
        self.value_stack.split_off(start)
    }
}
