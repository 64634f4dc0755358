//! Host-derived tuning for the elimination arena.
//!
//! All sizing is computed once at stack construction and stored on the
//! instance, so multiple stacks can coexist with independent tuning.

use std::thread;

/// Maximum number of arena steps a single exchange attempt probes.
const MAX_LOOKAHEAD: usize = 4;

/// Total spin budget on a multiprocessor.
///
/// Should be zero on uniprocessors. On multiprocessors this value should be
/// large enough that two threads exchanging items as fast as possible only
/// give up when one of them is stalled (preempted), but not much longer, to
/// avoid wasting CPU. It is roughly half the cycle count of an average
/// context switch across a range of tested systems.
const MULTIPROCESSOR_SPINS: usize = 2000;

/// Arena sizing and spin budgets derived from the host's parallelism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    /// Number of slots in the elimination arena. Always a power of two.
    pub arena_len: usize,
    /// Number of slots a spin-and-wait attempt steps through before giving up.
    pub lookahead: usize,
    /// Total number of spin iterations an exchange attempt may burn.
    pub spins: usize,
    /// Spin iterations allotted to each lookahead step.
    pub spins_per_step: usize,
}

impl Tuning {
    /// Derives tuning from the host's effective hardware parallelism.
    pub fn for_host() -> Self {
        let ncpu = thread::available_parallelism().map_or(1, usize::from);
        Self::with_parallelism(ncpu)
    }

    /// Derives tuning for an explicit parallelism level.
    ///
    /// The arena gets the next power of two at or above half the parallelism
    /// (minimum one slot), bounding both memory overhead and the cost of
    /// scanning every slot.
    pub fn with_parallelism(ncpu: usize) -> Self {
        let ncpu = ncpu.max(1);
        let arena_len = ((ncpu + 1) / 2).next_power_of_two();
        let lookahead = MAX_LOOKAHEAD.min(ncpu);
        let spins = if ncpu == 1 { 0 } else { MULTIPROCESSOR_SPINS };
        Self {
            arena_len,
            lookahead,
            spins,
            spins_per_step: spins / lookahead,
        }
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self::for_host()
    }
}
