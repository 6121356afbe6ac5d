//! Error handling: `RunResult<T>`, `RunError`, and the exception-type
//! hierarchy used by `except` clause matching and by `isinstance`/
//! `issubclass` on built-in exception types.
//!
//! Grounded on the teacher's `exception_private.rs` (`RunResult`, `ExcType`
//! strum enum, `is_subclass_of`) and `resource.rs` (`ResourceError`).

use std::fmt;

use strum::{Display, EnumString, IntoStaticStr};

use crate::value::Value;

pub type RunResult<T> = Result<T, RunError>;

/// Everything that can abort evaluation of a frame.
#[derive(Debug, Clone)]
pub enum RunError {
    /// A Python-visible exception, either a built-in type with a message
    /// or a user-raised instance (`Value::Object` holding an `Exception` or
    /// a user-defined class instance).
    Exception(PyException),
    /// The one resource limit this crate enforces: recursion depth.
    Resource(ResourceError),
}

#[derive(Debug, Clone)]
pub struct PyException {
    pub exc_type: String,
    pub message: String,
    /// Present once the exception is actually raised as a `Value` (e.g. a
    /// user-defined exception subclass instance); absent for exceptions
    /// synthesized purely from a builtin operation error.
    pub value: Option<Value>,
    pub traceback: Vec<TracebackEntry>,
}

#[derive(Debug, Clone)]
pub struct TracebackEntry {
    pub file: String,
    pub line: u32,
    pub func_name: String,
}

#[derive(Debug, Clone, Copy)]
pub enum ResourceError {
    RecursionExceeded,
}

impl ResourceError {
    #[must_use]
    pub fn into_exception(self) -> PyException {
        match self {
            Self::RecursionExceeded => PyException {
                exc_type: "RecursionError".to_owned(),
                message: "maximum recursion depth exceeded".to_owned(),
                value: None,
                traceback: Vec::new(),
            },
        }
    }
}

impl RunError {
    #[must_use]
    pub fn simple(exc_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Exception(PyException {
            exc_type: exc_type.into(),
            message: message.into(),
            value: None,
            traceback: Vec::new(),
        })
    }

    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::simple("TypeError", message)
    }

    #[must_use]
    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::simple("AttributeError", message)
    }

    #[must_use]
    pub fn name_error(message: impl Into<String>) -> Self {
        Self::simple("NameError", message)
    }

    #[must_use]
    pub fn import_error(message: impl Into<String>) -> Self {
        Self::simple("ImportError", message)
    }

    #[must_use]
    pub fn key_error(message: impl Into<String>) -> Self {
        Self::simple("KeyError", message)
    }

    #[must_use]
    pub fn index_error(message: impl Into<String>) -> Self {
        Self::simple("IndexError", message)
    }

    #[must_use]
    pub fn value_error(message: impl Into<String>) -> Self {
        Self::simple("ValueError", message)
    }

    #[must_use]
    pub fn stop_iteration() -> Self {
        Self::simple("StopIteration", String::new())
    }

    #[must_use]
    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::simple("ZeroDivisionError", message)
    }

    pub fn push_frame(&mut self, entry: TracebackEntry) {
        if let Self::Exception(exc) = self {
            exc.traceback.push(entry);
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exception(exc) if exc.message.is_empty() => write!(f, "{}", exc.exc_type),
            Self::Exception(exc) => write!(f, "{}: {}", exc.exc_type, exc.message),
            Self::Resource(err) => write!(f, "{}", err.into_exception().message),
        }
    }
}

impl std::error::Error for RunError {}

/// The built-in exception hierarchy. User classes that subclass `Exception`
/// are tracked separately via the ordinary class/MRO machinery; this enum
/// only models the built-in ladder so that `except ValueError` can match
/// `except ArithmeticError`-style ancestry without walking a class object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "PascalCase")]
pub enum ExcType {
    BaseException,
    Exception,
    ArithmeticError,
    ZeroDivisionError,
    OverflowError,
    AssertionError,
    AttributeError,
    EOFError,
    ImportError,
    ModuleNotFoundError,
    LookupError,
    IndexError,
    KeyError,
    NameError,
    UnboundLocalError,
    NotImplementedError,
    OSError,
    RuntimeError,
    RecursionError,
    StopIteration,
    StopAsyncIteration,
    SyntaxError,
    SystemError,
    TypeError,
    ValueError,
    UnicodeError,
    GeneratorExit,
    KeyboardInterrupt,
    SystemExit,
}

impl ExcType {
    #[must_use]
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::BaseException => None,
            Self::Exception
            | Self::GeneratorExit
            | Self::KeyboardInterrupt
            | Self::SystemExit => Some(Self::BaseException),
            Self::ArithmeticError
            | Self::AssertionError
            | Self::AttributeError
            | Self::EOFError
            | Self::ImportError
            | Self::LookupError
            | Self::NameError
            | Self::NotImplementedError
            | Self::OSError
            | Self::RuntimeError
            | Self::StopIteration
            | Self::StopAsyncIteration
            | Self::SyntaxError
            | Self::SystemError
            | Self::TypeError
            | Self::ValueError
            | Self::UnicodeError => Some(Self::Exception),
            Self::ZeroDivisionError | Self::OverflowError => Some(Self::ArithmeticError),
            Self::IndexError | Self::KeyError => Some(Self::LookupError),
            Self::UnboundLocalError => Some(Self::NameError),
            Self::ModuleNotFoundError => Some(Self::ImportError),
            Self::RecursionError => Some(Self::RuntimeError),
        }
    }

    #[must_use]
    pub fn is_subclass_of(self, ancestor: Self) -> bool {
        let mut cur = self;
        loop {
            if cur == ancestor {
                return true;
            }
            match cur.parent() {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_division_is_an_arithmetic_error() {
        assert!(ExcType::ZeroDivisionError.is_subclass_of(ExcType::ArithmeticError));
        assert!(ExcType::ZeroDivisionError.is_subclass_of(ExcType::Exception));
        assert!(!ExcType::ValueError.is_subclass_of(ExcType::LookupError));
    }
}
