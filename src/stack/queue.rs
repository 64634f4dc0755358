//! A queue-shaped view over the stack.

use crate::error::NullElement;

use super::iter::Iter;
use super::EliminationStack;

/// A last-in-first-out queue facade over an [`EliminationStack`].
///
/// Purely a vocabulary adapter for callers that want a queue-shaped API with
/// LIFO semantics: `enqueue` maps to push, `dequeue` to pop and `peek` to
/// peek. No logic of its own; every contract of the underlying stack
/// (non-blocking, weakly consistent traversal, relaxed ordering for
/// eliminated pairs) applies unchanged.
#[derive(Debug)]
pub struct LifoQueueView<'a, T> {
    stack: &'a EliminationStack<T>,
}

impl<'a, T> LifoQueueView<'a, T> {
    pub(crate) fn new(stack: &'a EliminationStack<T>) -> Self {
        Self { stack }
    }

    /// Adds an element to the queue (the top of the stack).
    ///
    /// # Errors
    ///
    /// Returns [`NullElement`] if `value` converts to `None`.
    pub fn enqueue(&self, value: impl Into<Option<T>>) -> Result<(), NullElement> {
        self.stack.push(value)
    }

    /// Removes and returns the next element (the top of the stack), or
    /// `None` if the queue is empty.
    pub fn dequeue(&self) -> Option<T>
    where
        T: Clone,
    {
        self.stack.pop()
    }

    /// Returns the next element without removing it, or `None` if the queue
    /// is empty.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.stack.peek()
    }

    /// Returns `true` if the queue contains no elements.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Returns the number of elements in the queue. O(n), like
    /// [`EliminationStack::len`].
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Returns a weakly consistent iterator in dequeue order.
    pub fn iter(&self) -> Iter<'a, T> {
        self.stack.iter()
    }
}
