//! Scheduled actions and cancellation keys.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::time::SolDuration;

/// Handle to a scheduled task.
///
/// A `TaskKey` is the cancellation capability returned by the scheduling
/// methods: its only purpose is to later cancel the task it was issued for.
/// For a periodic task, all occurrences share the same key, and cancelling
/// stops future re-enqueueing. An occurrence already popped off the queue
/// for the current drain still runs once more, since cancellation is checked
/// when an entry is popped and again before re-enqueueing, never
/// retroactively.
#[derive(Clone, Debug)]
#[must_use = "prefer dropping the key immediately if the task is never cancelled"]
pub struct TaskKey {
    is_cancelled: Arc<AtomicBool>,
}

impl TaskKey {
    /// Creates a key for a pending task.
    pub(crate) fn new() -> Self {
        Self {
            is_cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Checks whether the task was cancelled.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.is_cancelled.load(Ordering::Relaxed)
    }

    /// Cancels the associated task.
    ///
    /// Cancelling a task that has already run has no effect.
    pub fn cancel(self) {
        self.is_cancelled.store(true, Ordering::Relaxed);
    }

    /// Converts the key into a managed key that cancels the task on drop.
    pub fn into_auto(self) -> AutoTaskKey {
        AutoTaskKey {
            is_cancelled: self.is_cancelled,
        }
    }
}

impl PartialEq for TaskKey {
    /// Implements equality by considering clones to be equivalent, rather
    /// than keys with the same cancellation state.
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(&*self.is_cancelled, &*other.is_cancelled)
    }
}

impl Eq for TaskKey {}

impl Hash for TaskKey {
    /// Implements `Hash` by considering clones to be equivalent.
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        ptr::hash(&*self.is_cancelled, state)
    }
}

/// Managed handle to a scheduled task that cancels the task on drop.
#[derive(Debug)]
#[must_use = "managed task key shall be used"]
pub struct AutoTaskKey {
    is_cancelled: Arc<AtomicBool>,
}

impl Drop for AutoTaskKey {
    fn drop(&mut self) {
        self.is_cancelled.store(true, Ordering::Relaxed);
    }
}

/// Error returned when the arguments of a scheduling call are invalid.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchedulingError {
    /// The target tick lies in the past of the current simulation tick.
    SchedulingInThePast,
    /// The repetition period of a periodic task is zero.
    ZeroRepetitionPeriod,
    /// The repeat count of a periodic task is zero.
    ZeroRepeatCount,
    /// The target tick computation overflowed the representable tick range.
    TickOverflow,
}

impl fmt::Display for SchedulingError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchedulingInThePast => write!(
                fmt,
                "the target tick should not lie in the past of the current simulation tick"
            ),
            Self::ZeroRepetitionPeriod => write!(fmt, "the repetition period cannot be zero"),
            Self::ZeroRepeatCount => write!(fmt, "the repeat count cannot be zero"),
            Self::TickOverflow => write!(fmt, "the target tick overflows the representable range"),
        }
    }
}

impl Error for SchedulingError {}

/// A possibly periodic, cancellable unit of deferred work.
pub(crate) struct Action {
    inner: Box<dyn ActionInner>,
}

impl Action {
    /// Creates a one-shot action.
    pub(crate) fn once<F>(f: F, key: TaskKey) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            inner: Box::new(OnceAction { f, key }),
        }
    }

    /// Creates the first occurrence of a periodic action executing `repeat`
    /// times in total, one period apart.
    ///
    /// The remaining-repeats counter and the cancellation flag are shared
    /// between all occurrences; the callback sits behind a mutex so each
    /// generation can borrow it in turn.
    pub(crate) fn periodic<F>(f: F, period: SolDuration, repeat: u64, key: TaskKey) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self {
            inner: Box::new(PeriodicAction {
                f: Arc::new(Mutex::new(f)),
                period,
                remaining: Arc::new(AtomicU64::new(repeat)),
                key,
            }),
        }
    }

    /// Reports whether the action was cancelled.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// For a periodic action with repetitions left, decrements the shared
    /// countdown and returns the next occurrence together with its period;
    /// otherwise returns `None`.
    pub(crate) fn next(&self) -> Option<(Action, SolDuration)> {
        self.inner
            .next()
            .map(|(inner, period)| (Self { inner }, period))
    }

    /// Runs the action, returning the panic payload if the callback
    /// panicked.
    pub(crate) fn run(self) -> Result<(), Box<dyn Any + Send>> {
        self.inner.run()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").finish_non_exhaustive()
    }
}

/// Trait abstracting over the inner type of an action.
trait ActionInner: Send + 'static {
    /// Reports whether the action was cancelled.
    fn is_cancelled(&self) -> bool;

    /// If this is a periodic action with repetitions left, returns the next
    /// occurrence and its period; otherwise returns `None`.
    fn next(&self) -> Option<(Box<dyn ActionInner>, SolDuration)>;

    /// Runs the action, containing any panic raised by the callback.
    fn run(self: Box<Self>) -> Result<(), Box<dyn Any + Send>>;
}

/// A single-shot action.
struct OnceAction<F>
where
    F: FnOnce() + Send + 'static,
{
    f: F,
    key: TaskKey,
}

impl<F> ActionInner for OnceAction<F>
where
    F: FnOnce() + Send + 'static,
{
    fn is_cancelled(&self) -> bool {
        self.key.is_cancelled()
    }

    fn next(&self) -> Option<(Box<dyn ActionInner>, SolDuration)> {
        None
    }

    fn run(self: Box<Self>) -> Result<(), Box<dyn Any + Send>> {
        let f = self.f;

        panic::catch_unwind(AssertUnwindSafe(f))
    }
}

/// One occurrence of a periodic action.
///
/// The callback, the countdown and the cancellation flag are all shared with
/// the occurrences that preceded and follow this one; only the generation
/// currently popped off the queue ever touches them.
struct PeriodicAction {
    f: Arc<Mutex<dyn FnMut() + Send>>,
    period: SolDuration,
    remaining: Arc<AtomicU64>,
    key: TaskKey,
}

impl ActionInner for PeriodicAction {
    fn is_cancelled(&self) -> bool {
        self.key.is_cancelled()
    }

    fn next(&self) -> Option<(Box<dyn ActionInner>, SolDuration)> {
        // Check-and-decrement happens exactly once per popped occurrence,
        // before the callback runs, so a panicking callback still counts as
        // an execution and does not alter the repeat schedule.
        let left = self.remaining.fetch_sub(1, Ordering::Relaxed);
        if left <= 1 {
            return None;
        }

        let successor = Box::new(Self {
            f: self.f.clone(),
            period: self.period,
            remaining: self.remaining.clone(),
            key: self.key.clone(),
        });

        Some((successor, self.period))
    }

    fn run(self: Box<Self>) -> Result<(), Box<dyn Any + Send>> {
        // The guard is taken outside the catch so a panicking callback never
        // poisons the mutex; contention is only possible if the callback
        // re-entrantly drains its own next occurrence.
        let mut f = match self.f.try_lock() {
            Ok(f) => f,
            Err(_) => return Err(Box::new("re-entrant periodic task execution")),
        };

        panic::catch_unwind(AssertUnwindSafe(|| (*f)()))
    }
}
