//! Fault reporting for user-supplied callbacks.
//!
//! A panic inside a scheduled task or an event handler is recovered at the
//! dispatch boundary: the clock's drain loop and the bus's fan-out both
//! catch it, hand a [`Fault`] to the configured [`FaultHandler`], and move
//! on to the next due task or matching handler. One faulty callback can
//! therefore never leave the simulation in a partially advanced state.
//!
//! The handler is injected at construction time (see
//! [`ClockBuilder::fault_handler()`](crate::clock::ClockBuilder::fault_handler)
//! and [`EventBus::with_fault_handler()`](crate::bus::EventBus::with_fault_handler)),
//! so an embedding application decides where faults surface; the default
//! [`StderrFaultHandler`] writes one line per fault to standard error.

use std::any::Any;
use std::fmt;

use crate::time::SolInstant;

/// Where a fault was raised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FaultOrigin {
    /// A scheduled task panicked while running.
    Task {
        /// The tick at which the task ran.
        tick: SolInstant,
        /// The task's scheduling sequence number.
        sequence: u64,
    },
    /// An event handler panicked during fan-out.
    EventHandler {
        /// The handler's subscription priority.
        priority: i32,
        /// The handler's registration sequence number.
        sequence: u64,
    },
    /// An event handler was skipped because it was already running when a
    /// matching event reached it again.
    ReentrantHandler {
        /// The handler's subscription priority.
        priority: i32,
        /// The handler's registration sequence number.
        sequence: u64,
    },
}

/// A report about one failed callback invocation.
#[derive(Clone, Debug)]
pub struct Fault {
    /// Where the fault was raised.
    pub origin: FaultOrigin,
    /// The panic message, when one could be extracted.
    pub payload: String,
}

impl Fault {
    pub(crate) fn new(origin: FaultOrigin, payload: impl Into<String>) -> Self {
        Self {
            origin,
            payload: payload.into(),
        }
    }

    /// Builds a fault from a caught panic payload.
    pub(crate) fn from_panic(origin: FaultOrigin, payload: Box<dyn Any + Send>) -> Self {
        let payload = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "opaque panic payload".to_string()
        };

        Self { origin, payload }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            FaultOrigin::Task { tick, sequence } => write!(
                f,
                "scheduled task panicked at {} (sequence {}): {}",
                tick, sequence, self.payload
            ),
            FaultOrigin::EventHandler { priority, sequence } => write!(
                f,
                "event handler panicked (priority {}, sequence {}): {}",
                priority, sequence, self.payload
            ),
            FaultOrigin::ReentrantHandler { priority, sequence } => write!(
                f,
                "event handler skipped re-entrant delivery (priority {}, sequence {}): {}",
                priority, sequence, self.payload
            ),
        }
    }
}

/// A sink for callback faults.
///
/// Implementations should be cheap and must never panic; a typical test
/// implementation records faults in a vector, while applications usually
/// forward them to their logging facility.
pub trait FaultHandler: Send {
    /// Reports one fault.
    fn report(&mut self, fault: &Fault);
}

/// The default [`FaultHandler`]: one line per fault on standard error.
#[derive(Copy, Clone, Debug, Default)]
pub struct StderrFaultHandler {}

impl StderrFaultHandler {
    /// Constructs a new `StderrFaultHandler`.
    pub fn new() -> Self {
        Self {}
    }
}

impl FaultHandler for StderrFaultHandler {
    fn report(&mut self, fault: &Fault) {
        eprintln!("solclock: {fault}");
    }
}
