//! The one seam where this crate touches a real Python: `compile_source`
//! hands source text to the host's own `compile()` via `pyo3` and walks the
//! resulting code object into this crate's own [`crate::bytecode::CodeObject`]
//! tree, and [`run_file`] wires that up into a runnable `__main__` module.
//!
//! Grounded on `ouros-python/src/convert.rs`'s `py_to_ouros` (the
//! cast-by-type, bool-before-int conversion idiom, adapted here to walk a
//! code object's constant pool instead of a plain value) and
//! `ouros-python/src/exceptions.rs`'s convention of giving a failed host
//! call its own named error variant rather than a bare string.

use std::rc::Rc;

use num_bigint::BigInt;
use pyo3::{
    prelude::*,
    types::{PyBool, PyBytes, PyFrozenSet, PyInt, PyString, PyTuple},
};

use crate::{
    builtins,
    bytecode::{build_offset_index, decode_instructions, CodeObject},
    config::Config,
    context::{self, Context},
    exc::{RunError, RunResult},
    heap::{wrap, HeapObject},
    value::Value,
};

/// Compiles `source` the same way `exec(compile(source, filename, "exec"))`
/// would, then converts the resulting code object into this crate's own
/// representation. Any failure -- a syntax error from the host's parser, or
/// an unexpected shape from its `compile()` -- surfaces as a `SyntaxError`,
/// since every other outcome here indicates the source itself was bad.
pub fn compile_source(source: &str, filename: &str) -> RunResult<Rc<CodeObject>> {
    Python::with_gil(|py| {
        let builtins_module = py.import("builtins").map_err(py_err)?;
        let compile_fn = builtins_module.getattr("compile").map_err(py_err)?;
        let code_obj = compile_fn.call1((source, filename, "exec")).map_err(py_err)?;
        convert_code(&code_obj).map(Rc::new)
    })
}

/// Wraps a `compile()` failure as a `SyntaxError`, matching CPython's own
/// behavior when handed unparsable source.
fn py_err(err: PyErr) -> RunError {
    Python::with_gil(|py| {
        let exc = err.value(py);
        let message = exc.str().ok().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| err.to_string());
        RunError::simple("SyntaxError", message)
    })
}

/// A code object attribute came back a different shape than CPython
/// guarantees -- this can only mean a host interpreter version this crate
/// wasn't built against.
fn shape_err(attr: &str) -> RunError {
    RunError::simple("SystemError", format!("unexpected shape for code object attribute {attr}"))
}

/// Converts a `Bound<'_, PyAny>` code object (as found directly, or nested
/// in another code object's `co_consts`) into a [`CodeObject`].
fn convert_code(code_obj: &Bound<'_, PyAny>) -> RunResult<CodeObject> {
    let get_str = |attr: &str| -> RunResult<String> {
        code_obj.getattr(attr).and_then(|v| v.extract()).map_err(py_err)
    };
    let get_u32 = |attr: &str| -> RunResult<u32> {
        code_obj.getattr(attr).and_then(|v| v.extract()).map_err(py_err)
    };
    let get_usize = |attr: &str| -> RunResult<usize> {
        code_obj.getattr(attr).and_then(|v| v.extract()).map_err(py_err)
    };
    let get_strs = |attr: &str| -> RunResult<Vec<String>> {
        let tuple = code_obj.getattr(attr).map_err(py_err)?;
        let tuple = tuple.cast::<PyTuple>().map_err(|_| shape_err(attr))?;
        tuple.iter().map(|item| item.extract::<String>().map_err(py_err)).collect()
    };

    let name = get_str("co_name")?;
    let filename = get_str("co_filename")?;
    let first_lineno = get_u32("co_firstlineno")?;
    let argcount = get_usize("co_argcount")?;
    let kwonlyargcount = get_usize("co_kwonlyargcount")?;
    let nlocals = get_usize("co_nlocals")?;
    let flags = get_u32("co_flags")?;
    let varnames = get_strs("co_varnames")?;
    let cellvars = get_strs("co_cellvars")?;
    let freevars = get_strs("co_freevars")?;
    let names = get_strs("co_names")?;

    let code_bytes = code_obj.getattr("co_code").map_err(py_err)?;
    let code_bytes = code_bytes.cast::<PyBytes>().map_err(|_| shape_err("co_code"))?;
    let lnotab = code_obj.getattr("co_lnotab").map_err(py_err)?;
    let lnotab = lnotab.cast::<PyBytes>().map_err(|_| shape_err("co_lnotab"))?;
    let instructions = decode_instructions(code_bytes.as_bytes(), lnotab.as_bytes(), first_lineno);
    let offset_index = build_offset_index(&instructions);

    let consts_tuple = code_obj.getattr("co_consts").map_err(py_err)?;
    let consts_tuple = consts_tuple.cast::<PyTuple>().map_err(|_| shape_err("co_consts"))?;
    let consts = consts_tuple.iter().map(|item| convert_const(&item)).collect::<RunResult<Vec<_>>>()?;

    Ok(CodeObject {
        name,
        filename,
        first_lineno,
        argcount,
        kwonlyargcount,
        nlocals,
        flags,
        varnames,
        cellvars,
        freevars,
        consts,
        names,
        instructions,
        offset_index,
    })
}

/// Converts one entry of `co_consts` to a [`Value`]. Mirrors
/// `py_to_ouros`'s type-by-type cast chain, checking `bool` before `int`
/// since Python's `bool` is a subclass of `int`, plus a case for a nested
/// code object (reached only from another code object's `co_consts`).
fn convert_const(obj: &Bound<'_, PyAny>) -> RunResult<Value> {
    if obj.is_none() {
        Ok(Value::None)
    } else if let Ok(b) = obj.cast::<PyBool>() {
        Ok(Value::Bool(b.is_true()))
    } else if let Ok(i) = obj.cast::<PyInt>() {
        let big: BigInt = i.extract().map_err(py_err)?;
        Ok(Value::Int(big))
    } else if obj.getattr("co_code").is_ok() {
        // A nested code object: co_consts entries have no float/str overlap
        // with this shape, so the attribute probe above is unambiguous.
        let nested = convert_code(obj)?;
        Ok(Value::Object(wrap(HeapObject::Code(Rc::new(nested)))))
    } else if let Ok(f) = obj.extract::<f64>() {
        Ok(Value::Float(f))
    } else if let Ok(s) = obj.cast::<PyString>() {
        let text: String = s.extract().map_err(py_err)?;
        Ok(Value::Str(Rc::from(text.as_str())))
    } else if let Ok(bytes) = obj.cast::<PyBytes>() {
        let items: Vec<Value> = bytes.as_bytes().iter().map(|b| Value::Int(BigInt::from(*b))).collect();
        Ok(Value::Tuple(Rc::from(items)))
    } else if let Ok(tuple) = obj.cast::<PyTuple>() {
        let items = tuple.iter().map(|item| convert_const(&item)).collect::<RunResult<Vec<_>>>()?;
        Ok(Value::Tuple(Rc::from(items)))
    } else if let Ok(frozen) = obj.cast::<PyFrozenSet>() {
        let mut set = crate::value::PySet::default();
        for item in frozen.iter() {
            let value = convert_const(&item)?;
            if let Some(key) = crate::value::HashKey::new(value) {
                set.map.insert(key, ());
            }
        }
        Ok(Value::Set(Rc::new(std::cell::RefCell::new(set))))
    } else {
        let type_name = obj.get_type().name().map(|n| n.to_string()).unwrap_or_else(|_| "object".to_owned());
        Err(RunError::value_error(format!("unsupported constant type in code object: {type_name}")))
    }
}

/// Reads `path`, compiles it, and runs it to completion as `__main__`, the
/// way `python path` does: a fresh [`Context`] with its builtins installed,
/// `search_paths` set to the script's own directory (so a sibling `import`
/// resolves the way CPython's `sys.path[0]` does), and the module's body
/// executed as its own top-level frame.
pub fn run_file(path: &str, config: Config) -> RunResult<Value> {
    let source = std::fs::read_to_string(path)
        .map_err(|err| RunError::simple("OSError", format!("cannot read {path}: {err}")))?;
    let code = compile_source(&source, path)?;

    let mut ctx = Context::new(config);
    if ctx.config.echo_debug || ctx.config.debug_print_imports || ctx.config.echo_dump_insts || ctx.config.debug_print_bytecode_line {
        ctx.use_tracer(Box::new(crate::tracer::StderrTracer::from_env()));
    }
    builtins::install(&mut ctx);

    let script_dir = std::path::Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ".".to_owned());
    ctx.search_paths = vec![script_dir];

    let module = context::new_module("__main__", Some(path.to_owned()));
    let builtins_ns = context::builtins_namespace(&ctx);
    {
        let mut borrowed = module.borrow_mut();
        let HeapObject::Module(m) = &mut *borrowed else { unreachable!("just constructed as a Module") };
        m.dict.insert("__name__".to_owned(), Value::Str(Rc::from("__main__")));
        m.dict.insert("__file__".to_owned(), Value::Str(Rc::from(path)));
        m.dict.insert("__builtins__".to_owned(), builtins_ns);
        m.dict.insert("__doc__".to_owned(), Value::None);
    }
    ctx.modules.insert("__main__".to_owned(), Rc::clone(&module));

    let mut frame = ctx.code_to_frame(code, "<module>".to_owned(), path.to_owned(), module);
    crate::eval::call::run_to_completion(&mut ctx, &mut frame, "<module>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_runs_trivial_source() {
        let code = compile_source("x = 1 + 2\n", "<test>").expect("compile should succeed");
        assert_eq!(code.name, "<module>");
        assert!(!code.instructions.is_empty());
    }

    #[test]
    fn rejects_invalid_syntax() {
        let err = compile_source("def (:\n", "<test>").unwrap_err();
        assert!(matches!(err, RunError::Exception(exc) if exc.exc_type == "SyntaxError"));
    }
}
