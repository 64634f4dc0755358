//! The elimination arena: a fixed array of exchange slots.
//!
//! Each slot is an atomic cell in one of three states, encoded in a single
//! epoch pointer so that every transition is one CAS:
//!
//! - *free*: null — no activity;
//! - *waiting*: the address of a dedicated sentinel — a consumer has
//!   announced itself and wants a value;
//! - *offering*: any other non-null pointer, a payload cell deposited by a
//!   producer.
//!
//! Allowed transitions: free ⇄ waiting, free ⇄ offering (publish/withdraw),
//! waiting → offering (the terminal exchange; both sides then return) and
//! offering → free (claim). No two parties can believe they own the same
//! transition because each one is a single compare-and-swap.
//!
//! Slots are individually cache-line padded. Adjacent slots sharing a line
//! would serialize the very threads the arena is supposed to spread apart.

use std::cell::Cell;
use std::hint;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed};

use crossbeam_epoch::{Atomic, Guard, Shared};
use crossbeam_utils::CachePadded;

use crate::config::Tuning;

/// Backing storage whose address marks a slot as held by a waiting consumer.
///
/// The sentinel is never dereferenced, only compared by address. A pointer
/// tag would not work here: epoch tags live in the pointee's alignment bits,
/// and for align-1 element types there are none, so a tagged marker would
/// collapse into the free state. The over-alignment keeps the address valid
/// as a `Shared<T>` for any element alignment up to a cache line, and a
/// non-zero-sized static can never alias a heap-allocated payload cell.
#[repr(align(128))]
struct WaiterCell {
    _occupied: u8,
}

static WAITER: WaiterCell = WaiterCell { _occupied: 0 };

thread_local! {
    /// Per-thread xorshift state used to pick a starting slot.
    static EXCHANGE_SEED: Cell<u64> = Cell::new(initial_seed());
}

/// Seeds the thread-local generator from a stack address, which differs per
/// thread and costs nothing to obtain. The low bit is forced on so the
/// xorshift state is never zero.
fn initial_seed() -> u64 {
    let probe = 0u8;
    (std::ptr::addr_of!(probe) as u64).wrapping_mul(0x2545_F491_4F6C_DD1D) | 1
}

/// The collision arena where contended pushes and pops exchange directly.
pub(crate) struct ExchangeArena<T> {
    slots: Box<[CachePadded<Atomic<T>>]>,
    mask: usize,
    tuning: Tuning,
}

impl<T> ExchangeArena<T> {
    pub(crate) fn new(tuning: Tuning) -> Self {
        let slots = (0..tuning.arena_len)
            .map(|_| CachePadded::new(Atomic::null()))
            .collect();
        Self {
            slots,
            mask: tuning.arena_len - 1,
            tuning,
        }
    }

    /// Picks a pseudo-random starting slot from the thread-local seed.
    ///
    /// Deliberately not derived from the thread id: a fixed mapping would
    /// park the same threads on the same slots forever and recreate the
    /// contention the arena exists to avoid.
    fn start_index(&self) -> usize {
        EXCHANGE_SEED.with(|seed| {
            let mut s = seed.get();
            s ^= s << 13;
            s ^= s >> 7;
            s ^= s << 17;
            seed.set(s);
            (s as usize) & self.mask
        })
    }

    fn slot(&self, index: usize) -> &Atomic<T> {
        &self.slots[index & self.mask]
    }

    /// Attempts to transfer `value` to a concurrently popping thread.
    ///
    /// On success the payload cell's ownership has moved to the consumer and
    /// the caller must not touch it again. On failure the caller still owns
    /// the cell.
    pub(crate) fn try_transfer<'g>(&self, value: Shared<'g, T>, guard: &'g Guard) -> bool {
        let start = self.start_index();
        self.scan_for_waiter(value, start, guard) || self.offer_and_spin(value, start, guard)
    }

    /// Walks every slot once, handing the value to the first waiting
    /// consumer found.
    fn scan_for_waiter<'g>(&self, value: Shared<'g, T>, start: usize, guard: &'g Guard) -> bool {
        for i in 0..self.slots.len() {
            let slot = self.slot(start + i);
            let found = slot.load(Acquire, guard);
            if is_waiting(found)
                && slot
                    .compare_exchange(found, value, AcqRel, Relaxed, guard)
                    .is_ok()
            {
                return true;
            }
        }
        false
    }

    /// Publishes the value into a free slot and spins for a consumer,
    /// stepping through up to `lookahead` slots within the total budget.
    fn offer_and_spin<'g>(&self, value: Shared<'g, T>, start: usize, guard: &'g Guard) -> bool {
        let mut total_spins = 0;
        for step in 0..self.tuning.lookahead {
            if total_spins >= self.tuning.spins {
                break;
            }
            let slot = self.slot(start + step);

            let found = slot.load(Acquire, guard);
            if is_waiting(found) {
                if slot
                    .compare_exchange(found, value, AcqRel, Relaxed, guard)
                    .is_ok()
                {
                    return true;
                }
            } else if is_free(found)
                && slot
                    .compare_exchange(found, value, AcqRel, Relaxed, guard)
                    .is_ok()
            {
                let mut slot_spins = 0;
                loop {
                    if slot.load(Acquire, guard) != value {
                        // A consumer claimed the offer.
                        return true;
                    }
                    if slot_spins >= self.tuning.spins_per_step {
                        match slot.compare_exchange(
                            value,
                            Shared::null(),
                            AcqRel,
                            Relaxed,
                            guard,
                        ) {
                            // Withdrawn; carry the spent spins to the next slot.
                            Ok(_) => {
                                total_spins += slot_spins;
                                break;
                            }
                            // The withdraw lost to a claiming consumer.
                            Err(_) => return true,
                        }
                    }
                    slot_spins += 1;
                    hint::spin_loop();
                }
            }
        }
        false
    }

    /// Attempts to receive a value from a concurrently pushing thread.
    ///
    /// The claimed cell is cloned out and its destruction deferred rather
    /// than freed on the spot: the producer that deposited it may still be
    /// spin-comparing the slot against that address, and freeing the cell
    /// now would let the allocator hand the same address to a different
    /// offer, making the producer misread the slot. The epoch guard the
    /// producer pinned before offering keeps the deferred cell alive for
    /// exactly as long as that comparison can happen.
    pub(crate) fn try_receive<'g>(&self, guard: &'g Guard) -> Option<T>
    where
        T: Clone,
    {
        let start = self.start_index();
        let claimed = self
            .scan_for_offer(start, guard)
            .or_else(|| self.wait_and_spin(start, guard))?;
        let value = unsafe { claimed.deref() }.clone();
        unsafe { guard.defer_destroy(claimed) };
        Some(value)
    }

    /// Walks every slot once, claiming the first offered value found.
    fn scan_for_offer<'g>(&self, start: usize, guard: &'g Guard) -> Option<Shared<'g, T>> {
        for i in 0..self.slots.len() {
            let slot = self.slot(start + i);
            let found = slot.load(Acquire, guard);
            if is_offer(found)
                && slot
                    .compare_exchange(found, Shared::null(), AcqRel, Relaxed, guard)
                    .is_ok()
            {
                return Some(found);
            }
        }
        None
    }

    /// Announces this consumer in a free slot and spins for a producer,
    /// stepping through up to `lookahead` slots within the total budget.
    fn wait_and_spin<'g>(&self, start: usize, guard: &'g Guard) -> Option<Shared<'g, T>> {
        let mut total_spins = 0;
        for step in 0..self.tuning.lookahead {
            if total_spins >= self.tuning.spins {
                break;
            }
            let slot = self.slot(start + step);

            let found = slot.load(Acquire, guard);
            if is_free(found)
                && slot
                    .compare_exchange(found, waiting_marker(), AcqRel, Relaxed, guard)
                    .is_ok()
            {
                let mut slot_spins = 0;
                loop {
                    let seen = slot.load(Acquire, guard);
                    if is_offer(seen) {
                        if slot
                            .compare_exchange(seen, Shared::null(), AcqRel, Relaxed, guard)
                            .is_ok()
                        {
                            return Some(seen);
                        }
                        // Lost the claim to a scanning consumer; re-read.
                    } else if is_free(seen) {
                        // Our announcement was answered and the answer was
                        // claimed by another consumer's scan. The slot is no
                        // longer ours; report failure and let the pop loop
                        // retry from the head.
                        return None;
                    } else if slot_spins >= self.tuning.spins_per_step
                        && slot
                            .compare_exchange(seen, Shared::null(), AcqRel, Relaxed, guard)
                            .is_ok()
                    {
                        // Withdrew the announcement; try the next slot.
                        total_spins += slot_spins;
                        break;
                    }
                    slot_spins += 1;
                    hint::spin_loop();
                }
            }
        }
        None
    }
}

impl<T> Drop for ExchangeArena<T> {
    fn drop(&mut self) {
        // Exclusive access: any offer still parked in a slot was orphaned by
        // a caller that never resolved it (e.g. a panic unwound through
        // push), and must be freed here.
        let guard = unsafe { crossbeam_epoch::unprotected() };
        for slot in self.slots.iter() {
            let found = slot.load(Relaxed, guard);
            if is_offer(found) {
                drop(unsafe { found.into_owned() });
            }
        }
    }
}

fn is_free<T>(found: Shared<'_, T>) -> bool {
    found.is_null()
}

fn is_waiting<T>(found: Shared<'_, T>) -> bool {
    found == waiting_marker()
}

fn is_offer<T>(found: Shared<'_, T>) -> bool {
    !found.is_null() && found != waiting_marker()
}

fn waiting_marker<'g, T>() -> Shared<'g, T> {
    Shared::from(std::ptr::addr_of!(WAITER).cast::<T>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_epoch::{self as epoch, Owned};

    #[test]
    fn slot_states_stay_distinct_for_any_alignment() {
        // Byte-aligned element types have no spare pointer bits; the marker
        // must still read back as waiting, not free.
        assert!(is_waiting(waiting_marker::<u8>()));
        assert!(!is_free(waiting_marker::<u8>()));
        assert!(!is_offer(waiting_marker::<u8>()));

        assert!(is_waiting(waiting_marker::<u64>()));
        assert!(is_free(Shared::<u8>::null()));
        assert!(!is_waiting(Shared::<u8>::null()));
    }

    #[test]
    fn byte_element_announcement_is_not_lost() {
        let arena: ExchangeArena<u8> = ExchangeArena::new(Tuning::with_parallelism(4));
        let guard = epoch::pin();

        let slot = arena.slot(0);
        assert!(slot
            .compare_exchange(Shared::null(), waiting_marker(), AcqRel, Relaxed, &guard)
            .is_ok());
        assert!(
            is_waiting(slot.load(Acquire, &guard)),
            "announcement must survive in the slot"
        );

        // A producer's scan must find the waiter and deposit its value.
        let value = Owned::new(9u8).into_shared(&guard);
        assert!(arena.scan_for_waiter(value, 0, &guard));
        let offered = slot.load(Acquire, &guard);
        assert!(is_offer(offered));
        assert_eq!(unsafe { offered.deref() }, &9);

        slot.store(Shared::null(), Relaxed);
        drop(unsafe { value.into_owned() });
    }
}
