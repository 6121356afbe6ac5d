//! The one resource budget this crate enforces: call/frame recursion depth.
//!
//! Grounded on the teacher's `resource.rs` (`ResourceTracker` trait,
//! `NoLimitTracker`/`LimitedTracker`), trimmed to recursion only per
//! SPEC_FULL.md §10.4 -- wall-clock and allocation budgets are out of scope.

use crate::exc::ResourceError;

pub trait ResourceTracker {
    /// Called when a new frame is pushed; return `Err` to abort the call
    /// before it starts rather than risk a host stack overflow.
    fn enter_frame(&mut self, depth: usize) -> Result<(), ResourceError>;

    fn leave_frame(&mut self) {}
}

pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    fn enter_frame(&mut self, _depth: usize) -> Result<(), ResourceError> {
        Ok(())
    }
}

pub struct LimitedTracker {
    pub max_depth: usize,
}

impl LimitedTracker {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl ResourceTracker for LimitedTracker {
    fn enter_frame(&mut self, depth: usize) -> Result<(), ResourceError> {
        if depth > self.max_depth { Err(ResourceError::RecursionExceeded) } else { Ok(()) }
    }
}

impl Default for LimitedTracker {
    fn default() -> Self {
        // Matches CPython's own default `sys.getrecursionlimit()`.
        Self::new(1000)
    }
}
