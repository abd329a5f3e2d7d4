//! The simulation clock and its scheduling surface.
//!
//! A [`SimClock`] owns the current tick, the queue of deferred tasks and the
//! deterministic random source. It is a cheap-clone handle: clones share the
//! same underlying state, so a callback may capture a clone and schedule
//! further work or read the current tick from within a drain.
//!
//! Time only moves through [`tick_once()`](SimClock::tick_once) (or the
//! [`run_for()`](SimClock::run_for)/[`run_until()`](SimClock::run_until)
//! convenience loops): the tick is advanced by exactly one and every task
//! whose target tick has been reached runs to completion before the call
//! returns. The clock never blocks and never consults wall-clock time; see
//! [`time::Pacer`](crate::time::Pacer) for real-time pacing of the driving
//! loop.
//!
//! Determinism rests on the queue ordering: entries are keyed by
//! `(target tick, sequence number)` where the sequence number is drawn from a
//! single monotonic counter at scheduling time, so the execution order is a
//! pure function of the scheduling call order.

mod builder;
mod scheduler;

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::fault::{Fault, FaultHandler, FaultOrigin};
use crate::time::{SolDuration, SolInstant};
use crate::util::priority_queue::PriorityQueue;
use crate::util::rng::Wyrand;

pub use builder::ClockBuilder;
pub use scheduler::{AutoTaskKey, SchedulingError, TaskKey};

use scheduler::Action;

/// Error returned when advancing the clock would overflow the tick counter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TickOverflowError {}

impl fmt::Display for TickOverflowError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "the simulation tick counter overflowed")
    }
}

impl Error for TickOverflowError {}

/// Clonable handle to the simulation's deterministic random source.
///
/// All clones draw from the same seeded stream, in draw order. Two runs with
/// the same seed and the same sequence of draws observe the same values.
#[derive(Clone)]
pub struct SimRng {
    inner: Arc<Mutex<Wyrand>>,
}

impl SimRng {
    fn new(seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Wyrand::new(seed))),
        }
    }

    /// Draws a pseudo-random number within the range `0..2⁶⁴`.
    pub fn next_u64(&self) -> u64 {
        self.inner.lock().unwrap().next_u64()
    }

    /// Draws a pseudo-random number within the range `0..upper_bound`.
    pub fn next_bounded(&self, upper_bound: u64) -> u64 {
        self.inner.lock().unwrap().next_bounded(upper_bound)
    }
}

impl fmt::Debug for SimRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimRng").finish_non_exhaustive()
    }
}

pub(crate) struct ClockInner {
    queue: Mutex<PriorityQueue<(SolInstant, u64), Action>>,
    tick: AtomicU64,
    next_sequence: AtomicU64,
    rng: SimRng,
    faults: Mutex<Box<dyn FaultHandler>>,
    nominal_tick: Duration,
}

impl ClockInner {
    pub(crate) fn new(seed: u64, nominal_tick: Duration, faults: Box<dyn FaultHandler>) -> Self {
        Self {
            queue: Mutex::new(PriorityQueue::new()),
            tick: AtomicU64::new(0),
            next_sequence: AtomicU64::new(0),
            rng: SimRng::new(seed),
            faults: Mutex::new(faults),
            nominal_tick,
        }
    }
}

/// The simulation clock.
///
/// See the [module-level documentation](self) for the tick and ordering
/// model. Built via [`SimClock::builder()`]; starts at tick 0.
#[derive(Clone)]
pub struct SimClock {
    inner: Arc<ClockInner>,
}

impl SimClock {
    /// Returns a builder for a clock positioned at tick 0.
    pub fn builder() -> ClockBuilder {
        ClockBuilder::new()
    }

    pub(crate) fn from_inner(inner: ClockInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns the current simulation tick.
    ///
    /// Callable from within a scheduled callback; during a drain this is the
    /// tick being drained.
    pub fn now(&self) -> SolInstant {
        SolInstant::from_ticks(self.inner.tick.load(Ordering::Relaxed))
    }

    /// Returns the nominal wall-clock width of one tick.
    pub fn nominal_tick(&self) -> Duration {
        self.inner.nominal_tick
    }

    /// Returns a handle to the clock's deterministic random source.
    pub fn rng(&self) -> SimRng {
        self.inner.rng.clone()
    }

    /// Advances the clock by exactly one tick, then runs every due task.
    ///
    /// Tasks run in `(target tick, scheduling order)` order. A task that
    /// schedules further work for the current tick sees that work run within
    /// the same call. A panicking task is reported to the fault handler and
    /// does not interrupt the drain. Returns the new current tick.
    pub fn tick_once(&self) -> Result<SolInstant, TickOverflowError> {
        let next = self
            .now()
            .checked_add(SolDuration::from_ticks(1))
            .ok_or(TickOverflowError {})?;

        self.inner.tick.store(next.as_ticks(), Ordering::Relaxed);
        self.drain();

        Ok(next)
    }

    /// Advances the clock by `ticks` ticks, draining after each one.
    ///
    /// Returns the final current tick.
    pub fn run_for(&self, ticks: u64) -> Result<SolInstant, TickOverflowError> {
        for _ in 0..ticks {
            self.tick_once()?;
        }

        Ok(self.now())
    }

    /// Advances the clock until the target tick is reached, draining after
    /// each tick.
    ///
    /// A no-op if the clock is already at or past the target. Returns the
    /// final current tick.
    pub fn run_until(&self, target: SolInstant) -> SolInstant {
        while self.now() < target {
            // Cannot overflow: the current tick is strictly below `target`.
            if self.tick_once().is_err() {
                break;
            }
        }

        self.now()
    }

    /// Schedules a callback to run when the clock reaches the target tick.
    ///
    /// The target may be the current tick; when called from within a drain,
    /// such a task still runs in the same drain, after the tasks already
    /// due. Fails if the target lies in the past.
    ///
    /// The returned key cancels the task; a task cancelled before its entry
    /// is popped never runs.
    pub fn schedule_at<F>(&self, target: SolInstant, f: F) -> Result<TaskKey, SchedulingError>
    where
        F: FnOnce() + Send + 'static,
    {
        if target < self.now() {
            return Err(SchedulingError::SchedulingInThePast);
        }

        let key = TaskKey::new();
        self.insert(target, Action::once(f, key.clone()));

        Ok(key)
    }

    /// Schedules a callback to run `delay` ticks from now.
    ///
    /// A zero delay is equivalent to scheduling at the current tick. Fails
    /// with [`SchedulingError::TickOverflow`] if the target is not
    /// representable.
    pub fn schedule_in<F>(&self, delay: SolDuration, f: F) -> Result<TaskKey, SchedulingError>
    where
        F: FnOnce() + Send + 'static,
    {
        let target = self
            .now()
            .checked_add(delay)
            .ok_or(SchedulingError::TickOverflow)?;

        self.schedule_at(target, f)
    }

    /// Schedules a callback to run `repeat` times, at `start` and then once
    /// every `period` ticks.
    ///
    /// The full span `start + period * (repeat - 1)` is validated here, so a
    /// successfully registered periodic task can never overflow the tick
    /// range when re-enqueueing. Fails for a zero period, a zero repeat
    /// count, a start tick in the past or an unrepresentable span.
    ///
    /// Cancelling through the returned key stops all future occurrences; an
    /// occurrence already popped for the current drain still runs once more.
    /// A panicking occurrence counts as an execution and does not alter the
    /// schedule of the remaining ones.
    pub fn schedule_periodic<F>(
        &self,
        start: SolInstant,
        period: SolDuration,
        repeat: u64,
        f: F,
    ) -> Result<TaskKey, SchedulingError>
    where
        F: FnMut() + Send + 'static,
    {
        if period.is_zero() {
            return Err(SchedulingError::ZeroRepetitionPeriod);
        }
        if repeat == 0 {
            return Err(SchedulingError::ZeroRepeatCount);
        }
        if start < self.now() {
            return Err(SchedulingError::SchedulingInThePast);
        }
        period
            .checked_mul(repeat - 1)
            .and_then(|span| start.checked_add(span))
            .ok_or(SchedulingError::TickOverflow)?;

        let key = TaskKey::new();
        self.insert(start, Action::periodic(f, period, repeat, key.clone()));

        Ok(key)
    }

    /// Enqueues an action, assigning the next scheduling sequence number.
    fn insert(&self, at: SolInstant, action: Action) {
        let sequence = self.inner.next_sequence.fetch_add(1, Ordering::Relaxed);

        self.inner.queue.lock().unwrap().insert((at, sequence), action);
    }

    /// Runs every task due at the current tick, in key order.
    ///
    /// The queue lock is released before each callback runs so callbacks can
    /// schedule or cancel freely; the head is re-inspected after every
    /// execution, which is what makes nested same-tick scheduling effective.
    fn drain(&self) {
        let now = self.now();

        loop {
            let mut queue = self.inner.queue.lock().unwrap();
            match queue.peek_key() {
                Some(&(tick, _)) if tick <= now => {}
                _ => return,
            }
            let ((tick, sequence), action) = queue.pull().unwrap();
            drop(queue);

            // Lazy cancellation: the heap entry outlives the cancel call and
            // is discarded here, in its natural pop order.
            if action.is_cancelled() {
                continue;
            }

            let successor = action.next();

            if let Err(payload) = action.run() {
                let fault = Fault::from_panic(FaultOrigin::Task { tick, sequence }, payload);
                self.inner.faults.lock().unwrap().report(&fault);
            }

            if let Some((successor, period)) = successor {
                if !successor.is_cancelled() {
                    self.insert(tick + period, successor);
                }
            }
        }
    }
}

impl fmt::Debug for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimClock")
            .field("now", &self.now())
            .field("nominal_tick", &self.inner.nominal_tick)
            .finish_non_exhaustive()
    }
}
