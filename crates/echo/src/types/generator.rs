//! Generators: a suspended [`crate::frame::Frame`] that resumes on `next()`.
//!
//! Per spec.md §5, a generator is the *only* place execution suspends; it
//! owns its frame outright rather than sharing it with a call stack, so
//! resuming it is just "run this frame until it yields, returns, or raises"
//! again.

use crate::frame::Frame;

pub struct Generator {
    pub name: String,
    pub frame: Option<Box<Frame>>,
    pub started: bool,
    pub finished: bool,
    /// `true` for an `async def` function marked as a coroutine/async
    /// generator at compile time; spec.md's non-goals stop short of real
    /// `await` scheduling, so this only affects which builtin wraps it.
    pub is_async: bool,
}

impl Generator {
    #[must_use]
    pub fn new(name: String, frame: Box<Frame>, is_async: bool) -> Self {
        Self { name, frame: Some(frame), started: false, finished: false, is_async }
    }
}
