//! Deterministic pseudo-random number generation.

use std::cell::Cell;

/// A pseudo-random number generator based on Wang Yi's Wyrand.
///
/// See: <https://github.com/wangyi-fudan/wyhash>
///
/// The generator is fully determined by its seed: the same seed and the same
/// sequence of draws always produce the same values, which is what makes
/// simulation replay possible.
#[derive(Clone, Debug)]
pub(crate) struct Wyrand {
    state: Cell<u64>,
}

impl Wyrand {
    /// Creates a new generator with the provided seed.
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            state: Cell::new(seed),
        }
    }

    /// Generates a pseudo-random number within the range `0..2⁶⁴`.
    pub(crate) fn next_u64(&self) -> u64 {
        let state = self.state.get().wrapping_add(0xA0761D6478BD642F);
        self.state.set(state);
        let t = state as u128 * (state ^ 0xE7037ED1A0B428DB) as u128;

        (t as u64) ^ (t >> 64) as u64
    }

    /// Generates a pseudo-random number within the range `0..upper_bound`.
    ///
    /// Uses the fast multiply-shift method, which is slightly biased; the
    /// bias is negligible as long as the bound is much smaller than 2⁶⁴.
    pub(crate) fn next_bounded(&self, upper_bound: u64) -> u64 {
        ((self.next_u64() as u128 * upper_bound as u128) >> 64) as u64
    }
}
