//! Unit tests for the stack internals: arena protocol state machine and the
//! logical-removal lifecycle of chain nodes.

use std::thread;

use crossbeam_epoch::{self as epoch, Owned};

use super::*;

#[test]
fn transfer_fails_with_no_consumer() {
    let stack: EliminationStack<u64> = EliminationStack::with_parallelism(4);
    let guard = epoch::pin();
    let value = Owned::new(42u64).into_shared(&guard);

    assert!(!stack.arena().try_transfer(value, &guard));
    // Failure leaves the cell with the producer.
    drop(unsafe { value.into_owned() });
}

#[test]
fn receive_fails_with_no_producer() {
    let stack: EliminationStack<u64> = EliminationStack::with_parallelism(4);
    let guard = epoch::pin();
    assert_eq!(stack.arena().try_receive(&guard), None);
}

#[test]
fn uniprocessor_budget_gives_up_immediately() {
    // spins == 0 means neither side lingers in the arena.
    let stack: EliminationStack<u64> = EliminationStack::with_parallelism(1);
    let guard = epoch::pin();
    let value = Owned::new(7u64).into_shared(&guard);

    assert!(!stack.arena().try_transfer(value, &guard));
    drop(unsafe { value.into_owned() });
    assert_eq!(stack.arena().try_receive(&guard), None);
}

#[test]
fn forced_rendezvous_exchanges_exact_value() {
    let stack: EliminationStack<u64> = EliminationStack::with_parallelism(8);

    thread::scope(|s| {
        let producer = s.spawn(|| loop {
            let guard = epoch::pin();
            let value = Owned::new(0xDEAD_BEEF_u64).into_shared(&guard);
            if stack.arena().try_transfer(value, &guard) {
                return;
            }
            drop(unsafe { value.into_owned() });
        });
        let consumer = s.spawn(|| loop {
            let guard = epoch::pin();
            if let Some(value) = stack.arena().try_receive(&guard) {
                return value;
            }
        });

        producer.join().unwrap();
        assert_eq!(consumer.join().unwrap(), 0xDEAD_BEEF);
    });

    // The value travelled through the arena, not the stack.
    assert!(stack.is_empty());
}

#[test]
fn rendezvous_pairs_match_one_to_one() {
    const PAIRS: usize = 4;
    let stack: EliminationStack<u64> = EliminationStack::with_parallelism(8);

    let mut received = thread::scope(|s| {
        for i in 0..PAIRS {
            let stack = &stack;
            s.spawn(move || loop {
                let guard = epoch::pin();
                let value = Owned::new(i as u64).into_shared(&guard);
                if stack.arena().try_transfer(value, &guard) {
                    return;
                }
                drop(unsafe { value.into_owned() });
            });
        }
        let consumers: Vec<_> = (0..PAIRS)
            .map(|_| {
                let stack = &stack;
                s.spawn(move || loop {
                    let guard = epoch::pin();
                    if let Some(value) = stack.arena().try_receive(&guard) {
                        return value;
                    }
                })
            })
            .collect();
        consumers
            .into_iter()
            .map(|c| c.join().unwrap())
            .collect::<Vec<_>>()
    });

    received.sort_unstable();
    assert_eq!(received, (0..PAIRS as u64).collect::<Vec<_>>());
}

#[test]
fn pop_skips_logically_removed_nodes() {
    let stack = EliminationStack::new();
    stack.push(1).unwrap();
    stack.push(2).unwrap();
    stack.push(3).unwrap();

    assert_eq!(stack.remove(&2), Ok(true));
    assert_eq!(stack.pop(), Some(3));
    // The cleared node sits at the top of the remaining chain now; pop must
    // consume past it rather than report empty.
    assert_eq!(stack.pop(), Some(1));
    assert_eq!(stack.pop(), None);
}

#[test]
fn peek_unlinks_removed_top() {
    let stack = EliminationStack::new();
    stack.push(1).unwrap();
    stack.push(2).unwrap();

    assert_eq!(stack.remove(&2), Ok(true));
    assert_eq!(stack.peek(), Some(1));
    assert_eq!(stack.len(), 1);
}

#[test]
fn is_empty_skips_removed_chain() {
    let stack = EliminationStack::new();
    stack.push(10).unwrap();
    stack.push(20).unwrap();
    assert_eq!(stack.remove(&10), Ok(true));
    assert_eq!(stack.remove(&20), Ok(true));
    assert!(stack.is_empty());
    assert_eq!(stack.len(), 0);
}

#[test]
fn clear_discards_removed_and_present_nodes() {
    let stack = EliminationStack::new();
    for i in 0..16 {
        stack.push(i).unwrap();
    }
    assert_eq!(stack.remove(&7), Ok(true));
    stack.clear();
    assert!(stack.is_empty());
    assert_eq!(stack.pop(), None);
}

#[test]
fn drop_frees_chain_with_cleared_payloads() {
    // Exercises the Drop path over a mix of present and removed payloads.
    let stack = EliminationStack::new();
    for i in 0..8 {
        stack.push(format!("value-{i}")).unwrap();
    }
    assert_eq!(stack.remove(&String::from("value-3")), Ok(true));
    drop(stack);
}

#[test]
fn null_push_touches_nothing() {
    let stack: EliminationStack<u32> = EliminationStack::new();
    assert_eq!(stack.push(None), Err(NullElement));
    assert!(stack.is_empty());
    assert_eq!(stack.len(), 0);
}
