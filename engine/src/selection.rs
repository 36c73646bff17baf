//! Deterministic or random selection out of a pre-provisioned resource pool.
//!
//! Pools are created once during setup, shared read-only across iterations,
//! and torn down by whoever created them. Selection is pure: it never
//! mutates the pool.

use rand::{seq::SliceRandom, Rng};

use crate::Error;

/// How a pool element is chosen for an iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionMethod {
    /// Uniform draw with replacement.
    Random,
    /// `pool[(iteration - 1) % len]` for 1-based iteration counters.
    RoundRobin,
}

/// Pick one element of `pool` for the given 1-based iteration.
///
/// Fails explicitly on an empty pool rather than returning nothing.
pub fn select<'a, T>(
    pool: &'a [T],
    method: SelectionMethod,
    iteration: u64,
    rng: &mut impl Rng,
) -> Result<&'a T, Error> {
    match method {
        SelectionMethod::Random => pool.choose(rng).ok_or(Error::EmptyPool),
        SelectionMethod::RoundRobin => {
            if pool.is_empty() {
                return Err(Error::EmptyPool);
            }
            let idx = (iteration.saturating_sub(1) as usize) % pool.len();
            Ok(&pool[idx])
        }
    }
}
