//! Clock builder.

use std::fmt;
use std::time::Duration;

use super::{ClockInner, SimClock};
use crate::fault::{FaultHandler, StderrFaultHandler};
use crate::time::InvalidTickError;

/// Builder for a [`SimClock`].
///
/// Collects the seed of the simulation's random number generator, the
/// nominal wall-clock width of one tick and the fault handler, then
/// validates and assembles the clock.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use solclock::clock::SimClock;
///
/// let clock = SimClock::builder()
///     .seed(42)
///     .nominal_tick(Duration::from_millis(50))
///     .build()
///     .unwrap();
///
/// assert_eq!(clock.now().as_ticks(), 0);
/// ```
pub struct ClockBuilder {
    seed: u64,
    nominal_tick: Duration,
    faults: Box<dyn FaultHandler>,
}

impl ClockBuilder {
    /// The default nominal tick width.
    pub const DEFAULT_NOMINAL_TICK: Duration = Duration::from_millis(50);

    pub(crate) fn new() -> Self {
        Self {
            seed: 0,
            nominal_tick: Self::DEFAULT_NOMINAL_TICK,
            faults: Box::new(StderrFaultHandler::new()),
        }
    }

    /// Sets the seed of the clock's random number generator.
    ///
    /// The seed defaults to 0. Two clocks built with the same seed and
    /// driven through the same sequence of calls execute identically.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;

        self
    }

    /// Sets the nominal wall-clock width of one tick.
    ///
    /// The width is only consulted when converting between ticks and
    /// wall-clock durations, typically by a [`Pacer`](crate::time::Pacer);
    /// tick advancement itself is purely logical. Defaults to
    /// [`DEFAULT_NOMINAL_TICK`](Self::DEFAULT_NOMINAL_TICK).
    pub fn nominal_tick(mut self, nominal_tick: Duration) -> Self {
        self.nominal_tick = nominal_tick;

        self
    }

    /// Sets the sink that receives faults raised by scheduled tasks.
    ///
    /// Defaults to [`StderrFaultHandler`].
    pub fn fault_handler(mut self, faults: impl FaultHandler + 'static) -> Self {
        self.faults = Box::new(faults);

        self
    }

    /// Builds the clock, positioned at tick 0.
    ///
    /// Fails if the nominal tick width is zero.
    pub fn build(self) -> Result<SimClock, InvalidTickError> {
        if self.nominal_tick.is_zero() {
            return Err(InvalidTickError {});
        }

        Ok(SimClock::from_inner(ClockInner::new(
            self.seed,
            self.nominal_tick,
            self.faults,
        )))
    }
}

impl fmt::Debug for ClockBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockBuilder")
            .field("seed", &self.seed)
            .field("nominal_tick", &self.nominal_tick)
            .finish_non_exhaustive()
    }
}
