//! Error types for the stack's fallible operations.

use std::error::Error;
use std::fmt;

/// Error returned when an absent value is handed to an operation that
/// requires one, such as [`push`](crate::EliminationStack::push),
/// [`remove`](crate::EliminationStack::remove) or
/// [`contains`](crate::EliminationStack::contains).
///
/// This is a precondition violation and is reported synchronously before any
/// head or arena mutation takes place. Lost CAS races and exhausted spin
/// budgets are internal control flow and are never surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullElement;

impl fmt::Display for NullElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("absent element passed to the stack")
    }
}

impl Error for NullElement {}
