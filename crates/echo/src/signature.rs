//! Argument binding: positional, keyword, `*args`, `**kwargs`, defaults, and
//! keyword-only parameters, bound into a callee's local-variable slots.
//!
//! This is a near-direct port of the teacher's `signature.rs` `Signature`/
//! `bind()` algorithm, which already implements spec.md §4.1's contract
//! almost verbatim; the manual `drop_with_heap` cleanup on the bind-failure
//! path is simply gone; `Rc`'s `Drop` impl does that for free.

use indexmap::IndexMap;

use crate::{exc::RunResult, value::Value};

/// One parameter in a code object's declared signature.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Positional,
    KeywordOnly,
}

#[derive(Debug, Clone)]
pub struct Signature {
    pub params: Vec<Param>,
    pub argcount: usize,
    pub kwonlyargcount: usize,
    pub has_varargs: bool,
    pub has_varkw: bool,
    pub defaults: Vec<Value>,
    pub kwdefaults: IndexMap<String, Value>,
}

impl Signature {
    /// Binds `args`/`kwargs` into a vector of local slots ordered
    /// `[positional params][kwonly params][*args slot?][**kwargs slot?]`,
    /// matching the code object's `varnames` layout.
    pub fn bind(&self, func_name: &str, args: &[Value], kwargs: &IndexMap<String, Value>) -> RunResult<Vec<Option<Value>>> {
        let total_slots = self.params.len() + usize::from(self.has_varargs) + usize::from(self.has_varkw);
        let mut slots: Vec<Option<Value>> = vec![None; total_slots];

        let positional_count = self.argcount;
        if args.len() > positional_count && !self.has_varargs {
            return Err(crate::exc::RunError::type_error(format!(
                "{func_name}() takes {positional_count} positional argument{} but {} {} given",
                if positional_count == 1 { "" } else { "s" },
                args.len(),
                if args.len() == 1 { "was" } else { "were" },
            )));
        }
        for (i, arg) in args.iter().take(positional_count).enumerate() {
            slots[i] = Some(arg.clone());
        }
        if self.has_varargs {
            let extra: Vec<Value> = args.iter().skip(positional_count).cloned().collect();
            let varargs_idx = self.params.len();
            slots[varargs_idx] = Some(Value::Tuple(extra.into()));
        }

        let mut used_kwargs: IndexMap<String, bool> = kwargs.keys().map(|k| (k.clone(), false)).collect();
        for (i, param) in self.params.iter().enumerate() {
            if i < args.len() && param.kind == ParamKind::Positional {
                continue;
            }
            if let Some(value) = kwargs.get(&param.name) {
                if i < args.len() {
                    return Err(crate::exc::RunError::type_error(format!(
                        "{func_name}() got multiple values for argument '{}'",
                        param.name
                    )));
                }
                slots[i] = Some(value.clone());
                used_kwargs.insert(param.name.clone(), true);
            }
        }

        if self.has_varkw {
            let varkw_idx = self.params.len() + usize::from(self.has_varargs);
            let mut extra = crate::value::PyDict::default();
            for (k, v) in kwargs {
                if !used_kwargs.get(k).copied().unwrap_or(false) {
                    if let Some(key) = crate::value::HashKey::new(Value::Str(k.as_str().into())) {
                        extra.map.insert(key, v.clone());
                    }
                }
            }
            slots[varkw_idx] = Some(Value::Dict(std::rc::Rc::new(std::cell::RefCell::new(extra))));
        } else if let Some((unexpected, _)) = used_kwargs.iter().find(|(_, used)| !**used) {
            return Err(crate::exc::RunError::type_error(format!(
                "{func_name}() got an unexpected keyword argument '{unexpected}'"
            )));
        }

        let n_positional_params = self.params.len() - self.kwonlyargcount;
        let default_start = n_positional_params.saturating_sub(self.defaults.len());
        for (i, default) in self.defaults.iter().enumerate() {
            let idx = default_start + i;
            if idx < slots.len() && slots[idx].is_none() {
                slots[idx] = Some(default.clone());
            }
        }
        for (i, param) in self.params.iter().enumerate() {
            if param.kind == ParamKind::KeywordOnly && slots[i].is_none() {
                if let Some(default) = self.kwdefaults.get(&param.name) {
                    slots[i] = Some(default.clone());
                }
            }
        }

        let missing_kwonly: Vec<&str> = self
            .params
            .iter()
            .enumerate()
            .filter(|(i, p)| p.kind == ParamKind::KeywordOnly && slots[*i].is_none())
            .map(|(_, p)| p.name.as_str())
            .collect();
        if !missing_kwonly.is_empty() {
            return Err(crate::exc::RunError::type_error(format!(
                "{func_name}() missing {} required keyword-only argument{}: {}",
                missing_kwonly.len(),
                if missing_kwonly.len() == 1 { "" } else { "s" },
                join_names(&missing_kwonly),
            )));
        }

        let missing_positional: Vec<&str> = self
            .params
            .iter()
            .enumerate()
            .filter(|(i, p)| p.kind == ParamKind::Positional && slots[*i].is_none())
            .map(|(_, p)| p.name.as_str())
            .collect();
        if !missing_positional.is_empty() {
            return Err(crate::exc::RunError::type_error(format!(
                "{func_name}() missing {} required positional argument{}: {}",
                missing_positional.len(),
                if missing_positional.len() == 1 { "" } else { "s" },
                join_names(&missing_positional),
            )));
        }

        Ok(slots)
    }
}

/// Joins parameter names the way CPython's own `TypeError` messages do:
/// a single name is just quoted, otherwise every name but the last is
/// comma-joined and the last is appended after `", and "`.
fn join_names(names: &[&str]) -> String {
    if names.len() == 1 {
        return format!("'{}'", names[0]);
    }
    let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    let (last, rest) = quoted.split_last().expect("checked len != 0 above");
    format!("{}, and {last}", rest.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(argcount: usize, defaults: Vec<Value>, varargs: bool, varkw: bool) -> Signature {
        let params = (0..argcount)
            .map(|i| Param { name: format!("p{i}"), kind: ParamKind::Positional })
            .collect();
        Signature { params, argcount, kwonlyargcount: 0, has_varargs: varargs, has_varkw: varkw, defaults, kwdefaults: IndexMap::new() }
    }

    #[test]
    fn binds_plain_positional_args() {
        let signature = sig(2, vec![], false, false);
        let bound = signature.bind("f", &[Value::Int(1.into()), Value::Int(2.into())], &IndexMap::new()).unwrap();
        assert_eq!(bound.len(), 2);
    }

    #[test]
    fn missing_required_argument_is_a_type_error() {
        let signature = sig(2, vec![], false, false);
        let err = signature.bind("f", &[Value::Int(1.into())], &IndexMap::new()).unwrap_err();
        assert!(err.to_string().contains("missing 1 required"));
    }

    #[test]
    fn unexpected_keyword_without_varkw_is_a_type_error() {
        let signature = sig(1, vec![], false, false);
        let mut kwargs = IndexMap::new();
        kwargs.insert("bogus".to_owned(), Value::None);
        let err = signature.bind("f", &[Value::Int(1.into())], &kwargs).unwrap_err();
        assert!(err.to_string().contains("unexpected keyword"));
    }
}
