//! Native iterator state for `range`, `enumerate`, and the plain sequence
//! iterator `GET_ITER` produces for `list`/`tuple`/`str`. These are
//! structurally the same "paused, resumable" shape as a generator (spec.md
//! §3 Generator, §8 invariant 6) but need no frame at all, so they get their
//! own lightweight heap-object kind instead of wrapping a `Frame`. Advancing
//! one lives in `builtins::iterators`, since `Enumerate` needs to recurse
//! into the interpreter to advance its inner iterator.

use crate::value::Value;

pub enum NativeIter {
    Range { cur: i64, stop: i64, step: i64 },
    Enumerate { inner: Value, index: i64 },
    Sequence { values: Vec<Value>, index: usize },
}
