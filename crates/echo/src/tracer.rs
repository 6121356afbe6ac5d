//! Diagnostic observers the evaluator calls into after notable events.
//!
//! Grounded on the teacher's `tracer.rs` (`VmTracer` trait plus `NoopTracer`/
//! `StderrTracer` implementations); this is the bytecode-trace dump's
//! producer that spec.md §1 excludes the *comparator* half of from scope.

use crate::{bytecode::Instr, value::Value};

pub trait VmTracer {
    fn on_instruction(&self, frame_name: &str, instr: &Instr) {
        let _ = (frame_name, instr);
    }

    fn on_call(&self, callee_name: &str) {
        let _ = callee_name;
    }

    fn on_import(&self, module_name: &str) {
        let _ = module_name;
    }

    fn on_exception(&self, exc_type: &str, message: &str) {
        let _ = (exc_type, message);
    }
}

pub struct NoopTracer;

impl VmTracer for NoopTracer {}

/// Honors `ECHO_DUMP_INSTS`, `ECHO_DEBUG`, `DEBUG_PRINT_IMPORTS`, and
/// `DEBUG_PRINT_BYTECODE_LINE` (spec.md §6), each gating one kind of line
/// written to stderr.
pub struct StderrTracer {
    pub dump_insts: bool,
    pub debug: bool,
    pub print_imports: bool,
    pub print_bytecode_line: bool,
}

impl StderrTracer {
    #[must_use]
    pub fn from_env() -> Self {
        let set = |name: &str| std::env::var(name).is_ok_and(|v| v != "0" && !v.is_empty());
        Self {
            dump_insts: set("ECHO_DUMP_INSTS"),
            debug: set("ECHO_DEBUG"),
            print_imports: set("DEBUG_PRINT_IMPORTS"),
            print_bytecode_line: set("DEBUG_PRINT_BYTECODE_LINE"),
        }
    }
}

impl VmTracer for StderrTracer {
    fn on_instruction(&self, frame_name: &str, instr: &Instr) {
        if self.dump_insts {
            eprintln!("[{frame_name}] {:>4} {:?}", instr.offset, instr.op);
        }
        if self.print_bytecode_line {
            eprintln!("[{frame_name}] line {}", instr.line);
        }
    }

    fn on_call(&self, callee_name: &str) {
        if self.debug {
            eprintln!("call -> {callee_name}");
        }
    }

    fn on_import(&self, module_name: &str) {
        if self.print_imports {
            eprintln!("import {module_name}");
        }
    }

    fn on_exception(&self, exc_type: &str, message: &str) {
        if self.debug {
            eprintln!("exception: {exc_type}: {message}");
        }
    }
}

#[must_use]
pub fn repr_for_trace(value: &Value) -> String {
    value.py_repr()
}
