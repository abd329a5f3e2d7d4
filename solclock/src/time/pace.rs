use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};

use crate::time::SolInstant;

/// A type that can pace a driving loop against wall-clock time.
///
/// This trait abstracts over different pacing policies, such as
/// as-fast-as-possible and real-time pacing. It is meant to be called from
/// the loop that owns the clock, typically once after every
/// [`tick_once()`](crate::clock::SimClock::tick_once) call; the clock itself
/// never blocks.
pub trait Pacer: Send {
    /// Blocks until the wall-clock time corresponding to the provided
    /// simulation deadline.
    fn pace(&mut self, deadline: SolInstant) -> SyncStatus;
}

/// The current synchronization status of a pacer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// The driving loop is on time.
    Synchronized,
    /// The deadline had already elapsed when `pace` was called and lags
    /// behind the wall clock by the duration given in the payload.
    OutOfSync(Duration),
}

/// Error returned when a pacer is constructed with a zero nominal tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InvalidTickError {}

impl fmt::Display for InvalidTickError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "the nominal tick duration cannot be zero")
    }
}

impl Error for InvalidTickError {}

/// A dummy [`Pacer`] that never blocks.
///
/// Choosing this pacer effectively makes the driving loop run as fast as
/// possible.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoPacing {}

impl NoPacing {
    /// Constructs a new `NoPacing` object.
    pub fn new() -> Self {
        Self {}
    }
}

impl Pacer for NoPacing {
    /// Returns immediately with status `SyncStatus::Synchronized`.
    fn pace(&mut self, _: SolInstant) -> SyncStatus {
        SyncStatus::Synchronized
    }
}

/// A real-time [`Pacer`] based on the system's monotonic clock.
///
/// The pacer maps simulation ticks to wall-clock time through a reference
/// pair (a simulation instant matched to an [`Instant`] timestamp) and a
/// nominal tick duration: tick `reference + n` corresponds to wall-clock
/// time `wall_reference + n * nominal_tick`. Deadlines earlier than the
/// reference instant are considered already elapsed.
#[derive(Copy, Clone, Debug)]
pub struct SystemPacer {
    reference: SolInstant,
    wall_reference: Instant,
    nominal_tick: Duration,
}

impl SystemPacer {
    /// Constructs a `SystemPacer` from a simulation instant matched to a
    /// wall-clock timestamp, with the specified nominal tick duration.
    ///
    /// The wall-clock reference may lie in the past or in the future.
    pub fn new(
        reference: SolInstant,
        wall_reference: Instant,
        nominal_tick: Duration,
    ) -> Result<Self, InvalidTickError> {
        if nominal_tick.is_zero() {
            return Err(InvalidTickError {});
        }

        Ok(Self {
            reference,
            wall_reference,
            nominal_tick,
        })
    }

    /// Returns the wall-clock timestamp corresponding to a simulation
    /// deadline.
    fn wall_deadline(&self, deadline: SolInstant) -> Instant {
        let ticks = match deadline.checked_duration_since(self.reference) {
            Some(elapsed) => elapsed.as_ticks(),
            None => return self.wall_reference,
        };

        // Saturating on purpose: a pacing offset beyond ~584 years of
        // nanoseconds is indistinguishable from "never" for a driving loop.
        let offset = self.nominal_tick.as_nanos().saturating_mul(ticks as u128);
        let offset = Duration::from_nanos(u64::try_from(offset).unwrap_or(u64::MAX));

        self.wall_reference + offset
    }
}

impl Pacer for SystemPacer {
    /// Blocks until the wall-clock time corresponding to the specified
    /// simulation deadline.
    fn pace(&mut self, deadline: SolInstant) -> SyncStatus {
        let wall_deadline = self.wall_deadline(deadline);
        let now = Instant::now();

        if now <= wall_deadline {
            spin_sleep::sleep(wall_deadline - now);

            return SyncStatus::Synchronized;
        }

        SyncStatus::OutOfSync(now - wall_deadline)
    }
}

/// An automatically initialized real-time [`Pacer`].
///
/// This pacer is similar to [`SystemPacer`] except that the first call to
/// [`pace()`](Pacer::pace) never blocks and implicitly defines the reference
/// pair. In other words, the pacer starts running on its first invocation.
#[derive(Copy, Clone, Debug)]
pub struct AutoSystemPacer {
    nominal_tick: Duration,
    inner: Option<SystemPacer>,
}

impl AutoSystemPacer {
    /// Constructs a new `AutoSystemPacer` with the specified nominal tick
    /// duration.
    pub fn new(nominal_tick: Duration) -> Result<Self, InvalidTickError> {
        if nominal_tick.is_zero() {
            return Err(InvalidTickError {});
        }

        Ok(Self {
            nominal_tick,
            inner: None,
        })
    }
}

impl Pacer for AutoSystemPacer {
    /// Initializes the reference pair and returns immediately on the first
    /// call, otherwise blocks until the wall-clock time corresponding to the
    /// specified simulation deadline.
    fn pace(&mut self, deadline: SolInstant) -> SyncStatus {
        match &mut self.inner {
            None => {
                // Infallible: the nominal tick was validated at construction.
                self.inner = SystemPacer::new(deadline, Instant::now(), self.nominal_tick).ok();

                SyncStatus::Synchronized
            }
            Some(pacer) => pacer.pace(deadline),
        }
    }
}
