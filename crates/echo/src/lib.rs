//! A metacircular interpreter for Python 3.7-era bytecode: given a code
//! object produced by the host's own `compile()` (see [`entry`]), runs it on
//! an evaluator with its own object model, call machinery, and import
//! subsystem, parallel to (but disjoint from) the host's.

pub mod builtins;
pub mod bytecode;
pub mod config;
pub mod context;
pub mod entry;
pub mod eval;
pub mod exc;
pub mod frame;
pub mod heap;
pub mod import;
pub mod opcode;
pub mod resource;
pub mod signature;
pub mod tracer;
pub mod types;
pub mod value;

pub use config::{Config, LogLevel};
pub use context::Context;
pub use exc::{RunError, RunResult};
pub use value::Value;
