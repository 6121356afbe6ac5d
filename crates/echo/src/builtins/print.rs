//! `print(*args, sep=' ', end='\n')`.

use indexmap::IndexMap;

use crate::{context::Context, exc::RunResult, value::Value};

pub fn print(_ctx: &mut Context, args: &[Value], kwargs: &IndexMap<String, Value>) -> RunResult<Value> {
    let sep = match kwargs.get("sep") {
        Some(Value::Str(s)) => s.to_string(),
        _ => " ".to_owned(),
    };
    let end = match kwargs.get("end") {
        Some(Value::Str(s)) => s.to_string(),
        _ => "\n".to_owned(),
    };
    let parts: Vec<String> = args.iter().map(Value::py_str).collect();
    print!("{}{end}", parts.join(&sep));
    Ok(Value::None)
}
