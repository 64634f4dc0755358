//! The Treiber stack core and its elimination backoff.
//!
//! The stack proper is a singly-linked chain of heap nodes behind one atomic
//! `head` reference; push and pop are CAS retry loops on `head`. A node's
//! payload is itself an atomic nullable pointer: a null payload marks a node
//! as logically removed while still physically linked. Pop, peek and the
//! traversal operations treat such nodes as transparent and unlink them from
//! the head path when a single CAS can do it.
//!
//! When a push or pop loses its head CAS it detours through the elimination
//! arena before retrying, trying to meet an operation of the opposite kind
//! and exchange the value directly.
//!
//! Reclamation is epoch-based: nodes and payload cells are destroyed via
//! deferred-destroy by whichever thread wins the CAS that makes them
//! unreachable, so concurrent iterators and peekers holding references to
//! already-unlinked nodes never observe freed memory.

use std::fmt;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed};

use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};
use crossbeam_utils::CachePadded;

use crate::config::Tuning;
use crate::error::NullElement;

use self::arena::ExchangeArena;
use self::iter::Iter;
use self::queue::LifoQueueView;

pub(crate) mod arena;
pub mod iter;
pub mod queue;
#[cfg(test)]
mod tests;

/// A single cell of the stack's linked chain.
///
/// `value` is null once the element has been popped or logically removed;
/// `next` is written only before the node is published and never changes
/// afterwards.
pub(crate) struct Node<T> {
    pub(crate) value: Atomic<T>,
    pub(crate) next: Atomic<Node<T>>,
}

/// An unbounded, lock-free LIFO stack with elimination backoff.
///
/// The *top* of the stack is the element that has been on the stack the
/// shortest time. Many threads may push and pop concurrently; contended
/// operations pair off through a collision arena instead of hammering the
/// shared head reference. See the [crate docs](crate) for the full ordering
/// and consistency contract.
pub struct EliminationStack<T> {
    head: CachePadded<Atomic<Node<T>>>,
    arena: ExchangeArena<T>,
    tuning: Tuning,
}

unsafe impl<T: Send> Send for EliminationStack<T> {}
unsafe impl<T: Send + Sync> Sync for EliminationStack<T> {}

impl<T> EliminationStack<T> {
    /// Creates an empty stack tuned for the host's hardware parallelism.
    pub fn new() -> Self {
        Self::with_tuning(Tuning::for_host())
    }

    /// Creates an empty stack tuned for an explicit parallelism level.
    ///
    /// Useful when the stack serves a thread pool smaller than the machine,
    /// and for forcing deterministic spin budgets in tests.
    pub fn with_parallelism(ncpu: usize) -> Self {
        Self::with_tuning(Tuning::with_parallelism(ncpu))
    }

    fn with_tuning(tuning: Tuning) -> Self {
        Self {
            head: CachePadded::new(Atomic::null()),
            arena: ExchangeArena::new(tuning),
            tuning,
        }
    }

    /// Returns the instance's arena and spin tuning.
    pub fn tuning(&self) -> Tuning {
        self.tuning
    }

    /// Pushes an element onto the top of the stack.
    ///
    /// Accepts anything convertible to `Option<T>`, so `stack.push(v)` works
    /// directly; an absent value is rejected with [`NullElement`] before any
    /// shared state is touched.
    ///
    /// # Errors
    ///
    /// Returns [`NullElement`] if `value` converts to `None`.
    pub fn push(&self, value: impl Into<Option<T>>) -> Result<(), NullElement> {
        let value = value.into().ok_or(NullElement)?;
        self.push_value(value);
        Ok(())
    }

    fn push_value(&self, value: T) {
        let guard = epoch::pin();
        let value = Owned::new(value).into_shared(&guard);
        let mut node = Owned::new(Node {
            value: Atomic::from(value),
            next: Atomic::null(),
        });
        loop {
            let head = self.head.load(Acquire, &guard);
            node.next.store(head, Relaxed);

            // Attempt to push onto the stack, backing off to the
            // elimination arena if contended.
            node = match self.head.compare_exchange(head, node, AcqRel, Acquire, &guard) {
                Ok(_) => return,
                Err(err) => err.new,
            };
            if self.arena.try_transfer(value, &guard) {
                // A consumer owns the payload cell now; the node shell was
                // never published and is freed here.
                drop(node);
                return;
            }
        }
    }

    /// Removes and returns the top element, or `None` if the stack is empty.
    ///
    /// Never blocks: a contended pop retries through the elimination arena
    /// until it either claims a value or observes an exhausted chain.
    pub fn pop(&self) -> Option<T>
    where
        T: Clone,
    {
        let guard = epoch::pin();
        loop {
            let head = self.head.load(Acquire, &guard);
            let Some(node) = (unsafe { head.as_ref() }) else {
                return None;
            };
            let next = node.next.load(Relaxed, &guard);

            // Attempt to pop from the stack, backing off to the elimination
            // arena if contended.
            if self
                .head
                .compare_exchange(head, next, AcqRel, Acquire, &guard)
                .is_ok()
            {
                let value = node.value.swap(Shared::null(), AcqRel, &guard);
                unsafe { guard.defer_destroy(head) };
                if value.is_null() {
                    // Logically removed before we got here; keep consuming
                    // the chain rather than reporting empty.
                    continue;
                }
                let popped = unsafe { value.deref() }.clone();
                unsafe { guard.defer_destroy(value) };
                return Some(popped);
            }
            if let Some(received) = self.arena.try_receive(&guard) {
                return Some(received);
            }
        }
    }

    /// Returns the top element without removing it, or `None` if the stack
    /// is empty.
    ///
    /// A pure reader: it never enters the arena and creates no CAS
    /// contention beyond opportunistically unlinking removed nodes it finds
    /// at the top.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let guard = epoch::pin();
        loop {
            let head = self.head.load(Acquire, &guard);
            let node = unsafe { head.as_ref() }?;
            let value = node.value.load(Acquire, &guard);
            if let Some(value) = unsafe { value.as_ref() } {
                return Some(value.clone());
            }
            // Removed node at the top; help unlink it before looking again.
            let next = node.next.load(Relaxed, &guard);
            if self
                .head
                .compare_exchange(head, next, AcqRel, Acquire, &guard)
                .is_ok()
            {
                unsafe { guard.defer_destroy(head) };
            }
        }
    }

    /// Returns `true` if the stack contains no elements.
    ///
    /// O(n) worst case: logically removed nodes at the top must be skipped
    /// (and are unlinked along the way) before the answer is known.
    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        loop {
            let head = self.head.load(Acquire, &guard);
            let Some(node) = (unsafe { head.as_ref() }) else {
                return true;
            };
            if !node.value.load(Acquire, &guard).is_null() {
                return false;
            }
            let next = node.next.load(Relaxed, &guard);
            if self
                .head
                .compare_exchange(head, next, AcqRel, Acquire, &guard)
                .is_ok()
            {
                unsafe { guard.defer_destroy(head) };
            }
        }
    }

    /// Returns the number of elements in the stack.
    ///
    /// Beware that, unlike most collections, this is *not* a constant-time
    /// operation: it traverses the whole chain, and the result may already
    /// be stale on return if the stack is mutated concurrently. It is mostly
    /// useful at quiescence.
    pub fn len(&self) -> usize {
        let guard = epoch::pin();
        let mut count = 0;
        let mut node = self.head.load(Acquire, &guard);
        while let Some(n) = unsafe { node.as_ref() } {
            if !n.value.load(Acquire, &guard).is_null() {
                count += 1;
            }
            node = n.next.load(Relaxed, &guard);
        }
        count
    }

    /// Returns `true` if the stack contains at least one element equal to
    /// `value`.
    ///
    /// O(n) traversal; weakly consistent under concurrent mutation.
    ///
    /// # Errors
    ///
    /// Returns [`NullElement`] if `value` converts to `None`.
    pub fn contains<'a>(&self, value: impl Into<Option<&'a T>>) -> Result<bool, NullElement>
    where
        T: PartialEq + 'a,
    {
        let value = value.into().ok_or(NullElement)?;
        let guard = epoch::pin();
        let mut node = self.head.load(Acquire, &guard);
        while let Some(n) = unsafe { node.as_ref() } {
            if let Some(current) = unsafe { n.value.load(Acquire, &guard).as_ref() } {
                if current == value {
                    return Ok(true);
                }
            }
            node = n.next.load(Relaxed, &guard);
        }
        Ok(false)
    }

    /// Logically removes at most one element equal to `value`, returning
    /// whether one was removed.
    ///
    /// The matching node's payload is cleared in place; the node itself
    /// stays linked until a later pop or peek unlinks it. If the payload CAS
    /// loses to a concurrent pop or remove, the traversal simply moves on.
    ///
    /// # Errors
    ///
    /// Returns [`NullElement`] if `value` converts to `None`.
    pub fn remove<'a>(&self, value: impl Into<Option<&'a T>>) -> Result<bool, NullElement>
    where
        T: PartialEq + 'a,
    {
        let value = value.into().ok_or(NullElement)?;
        let guard = epoch::pin();
        let mut node = self.head.load(Acquire, &guard);
        while let Some(n) = unsafe { node.as_ref() } {
            let current = n.value.load(Acquire, &guard);
            if let Some(present) = unsafe { current.as_ref() } {
                if present == value
                    && n.value
                        .compare_exchange(current, Shared::null(), AcqRel, Relaxed, &guard)
                        .is_ok()
                {
                    unsafe { guard.defer_destroy(current) };
                    return Ok(true);
                }
            }
            node = n.next.load(Relaxed, &guard);
        }
        Ok(false)
    }

    /// Removes all elements from the stack.
    ///
    /// Not serialized against concurrent pushes: a push racing with `clear`
    /// may land on either the old or the new chain depending on timing. The
    /// detaching thread owns the old chain and schedules its reclamation.
    pub fn clear(&self) {
        let guard = epoch::pin();
        let mut node = self.head.swap(Shared::null(), AcqRel, &guard);
        while let Some(n) = unsafe { node.as_ref() } {
            let next = n.next.load(Relaxed, &guard);
            let value = n.value.swap(Shared::null(), AcqRel, &guard);
            unsafe {
                if !value.is_null() {
                    guard.defer_destroy(value);
                }
                guard.defer_destroy(node);
            }
            node = next;
        }
    }

    /// Returns a weakly consistent iterator over the stack's elements, from
    /// most recently pushed to least.
    ///
    /// The iterator tolerates concurrent pushes, pops and removals, never
    /// fails, and supports logical removal of the last yielded element via
    /// [`Iter::remove`]. Call `iter` again for a fresh traversal.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns a queue-shaped view of this stack.
    ///
    /// Useful when an API wants queue vocabulary but LIFO order is
    /// acceptable (or wanted): `enqueue` maps to push, `dequeue` to pop.
    pub fn as_lifo_queue(&self) -> LifoQueueView<'_, T> {
        LifoQueueView::new(self)
    }

    pub(crate) fn head(&self) -> &Atomic<Node<T>> {
        &self.head
    }

    #[cfg(test)]
    pub(crate) fn arena(&self) -> &ExchangeArena<T> {
        &self.arena
    }
}

impl<T> Drop for EliminationStack<T> {
    fn drop(&mut self) {
        // Exclusive access: walk the chain and free everything directly.
        let guard = unsafe { epoch::unprotected() };
        let mut node = self.head.load(Relaxed, guard);
        while let Some(n) = unsafe { node.as_ref() } {
            let next = n.next.load(Relaxed, guard);
            let value = n.value.load(Relaxed, guard);
            unsafe {
                if !value.is_null() {
                    drop(value.into_owned());
                }
                drop(node.into_owned());
            }
            node = next;
        }
    }
}

impl<T> Default for EliminationStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EliminationStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("EliminationStack { .. }")
    }
}

impl<T> FromIterator<T> for EliminationStack<T> {
    /// Builds a stack containing the elements of the iterator, pushed in
    /// iteration order (the last element ends up on top).
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let stack = Self::new();
        for value in iter {
            stack.push_value(value);
        }
        stack
    }
}

impl<T> Extend<T> for EliminationStack<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_value(value);
        }
    }
}

impl<'a, T: Clone> IntoIterator for &'a EliminationStack<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
