//! Weakly consistent iteration over the stack.

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed};

use crossbeam_epoch::{self as epoch, Guard, Shared};

use super::{EliminationStack, Node};

/// A weakly consistent iterator over an [`EliminationStack`].
///
/// Yields clones of the elements from most recently pushed to least,
/// reflecting some valid state of the stack at or since the iterator's
/// creation. Concurrent pushes, pops and removals never make it fail;
/// elements present for the whole traversal are yielded, elements added or
/// removed mid-flight may or may not be.
///
/// The iterator pins the current epoch for as long as it lives, which delays
/// memory reclamation stack-wide. Drop it promptly.
pub struct Iter<'a, T> {
    guard: Guard,
    current: *const Node<T>,
    last: *const Node<T>,
    _stack: PhantomData<&'a EliminationStack<T>>,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(stack: &'a EliminationStack<T>) -> Self {
        let guard = epoch::pin();
        let current = stack.head().load(Acquire, &guard).as_raw();
        Self {
            guard,
            current,
            last: ptr::null(),
            _stack: PhantomData,
        }
    }

    /// Logically removes the element most recently yielded by `next`.
    ///
    /// The node's payload is cleared in place, exactly like
    /// [`EliminationStack::remove`]; the node stays linked until a pop or
    /// peek unlinks it. Returns `false` if `next` has not been called yet,
    /// or if the payload was already taken by a concurrent pop or removal.
    pub fn remove(&mut self) -> bool {
        if self.last.is_null() {
            return false;
        }
        // The guard this iterator holds has kept the node alive since we
        // traversed it.
        let node = unsafe { &*self.last };
        let value = node.value.load(Acquire, &self.guard);
        if value.is_null() {
            return false;
        }
        if node
            .value
            .compare_exchange(value, Shared::null(), AcqRel, Relaxed, &self.guard)
            .is_ok()
        {
            unsafe { self.guard.defer_destroy(value) };
            true
        } else {
            false
        }
    }
}

impl<T: Clone> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        while !self.current.is_null() {
            let node = unsafe { &*self.current };
            let value = node.value.load(Acquire, &self.guard);
            self.last = self.current;
            self.current = node.next.load(Relaxed, &self.guard).as_raw();
            if let Some(value) = unsafe { value.as_ref() } {
                return Some(value.clone());
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // Removed nodes are skipped and the stack mutates underneath us;
        // nothing tighter than "unknown" is honest.
        (0, None)
    }
}
