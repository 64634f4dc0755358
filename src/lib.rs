//! # `elim-stack` - Lock-Free Elimination-Backoff Stack
//!
//! An unbounded, thread-safe stack based on linked nodes that orders elements
//! LIFO (last-in-first-out). The stack is an appropriate choice when many
//! threads exchange elements through shared access to a common collection and
//! a single compare-and-swap point would otherwise become the bottleneck.
//!
//! ## Design
//!
//! The core is a classic Treiber stack: a singly-linked chain of nodes behind
//! one atomic head reference, with push and pop expressed as CAS retry loops.
//! On top of it sits an *elimination arena*, a small fixed array of
//! cache-line-isolated slots. When a push or pop loses its CAS race, it backs
//! off into the arena and tries to pair up with an operation of the opposite
//! kind: a matched push/pop pair exchanges the value directly and both return
//! without ever touching the head reference. Under contention this converts
//! losers of the central race into successful side-channel exchanges instead
//! of more contention, which is what makes the technique scale.
//!
//! The approach is described in Hendler, Shavit and Yerushalmi,
//! *A Scalable Lock-free Stack Algorithm*, with arena-selection and
//! spin-wait tactics borrowed from `java.util.concurrent.Exchanger`.
//!
//! ## Ordering contract
//!
//! Operations that commit through the head reference are strictly LIFO
//! relative to each other. A push/pop pair that completes by elimination
//! never touches the head, and is therefore *not* ordered relative to
//! concurrent head-path operations. This relaxation is intentional and is
//! the price of scalability; callers that need a total order across all
//! operations should not be using an elimination stack.
//!
//! ## Iteration and size
//!
//! Iterators are *weakly consistent*: they reflect some valid state of the
//! stack at or since their creation, tolerate concurrent mutation, and never
//! fail. Beware that, unlike most collections, [`EliminationStack::len`] is
//! not a constant-time operation: it requires an O(n) traversal and may be
//! stale by the time it returns if the stack is being mutated concurrently.
//!
//! ## Example
//!
//! ```rust
//! use elim_stack::EliminationStack;
//!
//! let stack = EliminationStack::new();
//! stack.push(1)?;
//! stack.push(2)?;
//! stack.push(3)?;
//!
//! assert_eq!(stack.pop(), Some(3));
//! assert_eq!(stack.peek(), Some(2));
//! assert_eq!(stack.pop(), Some(2));
//! assert_eq!(stack.pop(), Some(1));
//! assert_eq!(stack.pop(), None);
//! # Ok::<(), elim_stack::NullElement>(())
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::inline_always)]

pub mod config;
pub mod error;
pub mod stack;

pub use config::Tuning;
pub use error::NullElement;
pub use stack::iter::Iter;
pub use stack::queue::LifoQueueView;
pub use stack::EliminationStack;
