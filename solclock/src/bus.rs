//! Synchronous, type-matched event bus.
//!
//! An [`EventBus`] fans typed events out to subscribers, synchronously, from
//! within the [`post()`](EventBus::post) call. Delivery order is fully
//! deterministic: matching handlers run by descending priority, and handlers
//! of equal priority run in registration order.
//!
//! Subscribers register either for a concrete event type
//! ([`subscribe()`](EventBus::subscribe)) or for a *family*
//! ([`subscribe_family()`](EventBus::subscribe_family)), a marker type that
//! events opt into by listing it in [`Event::families()`]. The family
//! relation stands in for subtype matching: an event reaches the subscribers
//! of its concrete type and of every family it declares. The relation is not
//! transitive, an event lists each of its families explicitly.
//!
//! A bus bound to a [`SimClock`] can also defer a posting to a future tick
//! with [`post_at()`](EventBus::post_at) and [`post_in()`](EventBus::post_in).
//!
//! # Example
//!
//! ```
//! use std::any::TypeId;
//!
//! use solclock::bus::{Event, EventBus};
//!
//! // A family tag: never posted itself, only subscribed to.
//! struct ColonyAlert;
//!
//! struct DustStorm {
//!     severity: u8,
//! }
//!
//! impl Event for DustStorm {
//!     fn families(&self) -> Vec<TypeId> {
//!         vec![TypeId::of::<ColonyAlert>()]
//!     }
//! }
//!
//! let bus = EventBus::new();
//!
//! let specific = bus.subscribe(0, |storm: &DustStorm| {
//!     println!("dust storm, severity {}", storm.severity);
//! });
//! let broad = bus.subscribe_family::<ColonyAlert, _>(10, |event: &dyn Event| {
//!     assert!(event.is::<DustStorm>());
//! });
//!
//! // Reaches both subscribers, the priority-10 family one first.
//! bus.post(&DustStorm { severity: 3 });
//!
//! broad.close();
//! specific.close();
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::clock::{SchedulingError, SimClock, TaskKey};
use crate::fault::{Fault, FaultHandler, FaultOrigin, StderrFaultHandler};
use crate::time::{SolDuration, SolInstant};

/// Upcast to `dyn Any`.
///
/// Blanket-implemented for every `'static` type; its single purpose is to
/// let [`dyn Event`](Event) recover the concrete type of an event without
/// relying on trait upcasting. Not meant to be implemented or called
/// directly.
pub trait AsAny: Any {
    /// Returns `self` as a `dyn Any` reference.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A value that can be posted on an [`EventBus`].
///
/// Implementing the trait requires nothing beyond `Send` and `'static`; the
/// provided [`families()`](Event::families) method returns no families, so a
/// plain `impl Event for MyEvent {}` yields an event delivered only to
/// subscribers of its concrete type.
pub trait Event: AsAny + Send {
    /// Declares the family tags this event belongs to.
    ///
    /// A family tag is any `'static` type, typically an empty marker struct.
    /// Subscribers registered for a tag through
    /// [`EventBus::subscribe_family()`] receive every event listing that tag
    /// here. Family membership is not inherited: an event belonging to a
    /// family of families must list each tag itself.
    fn families(&self) -> Vec<TypeId> {
        Vec::new()
    }
}

impl dyn Event {
    /// Returns whether the event's concrete type is `E`.
    pub fn is<E: Event>(&self) -> bool {
        self.as_any().is::<E>()
    }

    /// Returns a typed reference to the event if its concrete type is `E`.
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }
}

/// One subscriber entry in the registry.
#[derive(Clone)]
struct Registration {
    priority: i32,
    sequence: u64,
    active: Arc<AtomicBool>,
    handler: Arc<Mutex<dyn FnMut(&dyn Event) + Send>>,
}

/// The subscriber table, one bucket per registered type or family tag.
///
/// Each bucket is kept sorted by descending priority and ascending sequence
/// at all times, so a single-bucket delivery needs no sort and a multi-bucket
/// delivery only a merge.
struct Registry {
    buckets: HashMap<TypeId, Vec<Registration>>,
    next_sequence: u64,
}

impl Registry {
    fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            next_sequence: 0,
        }
    }
}

/// Synchronous event bus.
///
/// A cheap-clone handle: clones share the subscriber registry, the bound
/// clock and the fault handler, so a handler may capture a clone and post or
/// subscribe from within a delivery. See the [module-level
/// documentation](self) for the matching and ordering rules.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
    clock: Option<SimClock>,
    faults: Arc<Mutex<Box<dyn FaultHandler>>>,
}

impl EventBus {
    /// Creates a bus without a bound clock.
    ///
    /// Immediate posting works as usual; [`post_at()`](Self::post_at) and
    /// [`post_in()`](Self::post_in) fail with [`PostError::Unclocked`].
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::new())),
            clock: None,
            faults: Arc::new(Mutex::new(Box::new(StderrFaultHandler::new()))),
        }
    }

    /// Creates a bus bound to a clock, enabling deferred posting.
    pub fn with_clock(clock: SimClock) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::new())),
            clock: Some(clock),
            faults: Arc::new(Mutex::new(Box::new(StderrFaultHandler::new()))),
        }
    }

    /// Replaces the sink that receives faults raised by event handlers.
    ///
    /// Defaults to [`StderrFaultHandler`]. Note that a deferred posting runs
    /// as a clock task, so a panic inside it is reported to the *clock's*
    /// fault handler.
    pub fn with_fault_handler(self, faults: impl FaultHandler + 'static) -> Self {
        Self {
            faults: Arc::new(Mutex::new(Box::new(faults))),
            ..self
        }
    }

    /// Subscribes a handler to events of the concrete type `E`.
    ///
    /// Higher priority means earlier delivery; among equal priorities,
    /// earlier registration means earlier delivery. The handler stays
    /// registered until the returned [`Subscription`] is closed; dropping
    /// the subscription without closing it leaks the registration for the
    /// bus's lifetime.
    pub fn subscribe<E, F>(&self, priority: i32, mut handler: F) -> Subscription
    where
        E: Event,
        F: FnMut(&E) + Send + 'static,
    {
        // The bucket for a concrete type can also receive events that merely
        // list the type as a family; the downcast guard skips those.
        self.subscribe_dyn(TypeId::of::<E>(), priority, move |event: &dyn Event| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        })
    }

    /// Subscribes a handler to every event listing the family tag `F`.
    ///
    /// The handler receives the event as `&dyn Event` and may inspect the
    /// concrete type with [`is`](dyn Event::is) and
    /// [`downcast_ref`](dyn Event::downcast_ref). Priority and ordering
    /// behave as for [`subscribe()`](Self::subscribe).
    pub fn subscribe_family<F, H>(&self, priority: i32, handler: H) -> Subscription
    where
        F: 'static,
        H: FnMut(&dyn Event) + Send + 'static,
    {
        self.subscribe_dyn(TypeId::of::<F>(), priority, handler)
    }

    fn subscribe_dyn(
        &self,
        type_id: TypeId,
        priority: i32,
        handler: impl FnMut(&dyn Event) + Send + 'static,
    ) -> Subscription {
        let mut registry = self.registry.lock().unwrap();

        let sequence = registry.next_sequence;
        registry.next_sequence += 1;
        let active = Arc::new(AtomicBool::new(true));

        let bucket = registry.buckets.entry(type_id).or_default();
        let at = bucket.partition_point(|r| r.priority >= priority);
        bucket.insert(
            at,
            Registration {
                priority,
                sequence,
                active: active.clone(),
                handler: Arc::new(Mutex::new(handler)),
            },
        );

        Subscription {
            registry: Arc::downgrade(&self.registry),
            type_id,
            sequence,
            active,
        }
    }

    /// Delivers an event to every matching subscriber, synchronously.
    ///
    /// A subscriber matches if it is registered for the event's concrete
    /// type or for one of its declared families. The matching handlers run
    /// before `post` returns, by descending priority then registration
    /// order.
    ///
    /// The registry lock is released before the first handler runs: handlers
    /// may post, subscribe and unsubscribe freely. The invocation list is the
    /// snapshot taken at that moment, except that a handler unsubscribed
    /// mid-delivery is skipped if it has not run yet. A panicking handler is
    /// reported to the fault handler and later handlers still run; a handler
    /// that re-enters itself is skipped and reported rather than deadlocked.
    pub fn post(&self, event: &dyn Event) {
        let event_type = event.as_any().type_id();
        let families = event.families();

        // The family relation is declared per event, so the matching buckets
        // cannot be looked up directly; scan all of them. The scan is
        // O(#registered types) but runs under the lock without touching any
        // handler.
        let mut matches: Vec<Registration> = Vec::new();
        {
            let registry = self.registry.lock().unwrap();
            for (type_id, bucket) in &registry.buckets {
                if *type_id == event_type || families.contains(type_id) {
                    matches.extend(bucket.iter().cloned());
                }
            }
        }
        matches.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.sequence.cmp(&b.sequence)));

        for registration in matches {
            if !registration.active.load(Ordering::Relaxed) {
                continue;
            }

            let mut handler = match registration.handler.try_lock() {
                Ok(handler) => handler,
                Err(_) => {
                    self.report(Fault::new(
                        FaultOrigin::ReentrantHandler {
                            priority: registration.priority,
                            sequence: registration.sequence,
                        },
                        "the handler was already running when the event reached it",
                    ));
                    continue;
                }
            };

            // The guard is taken before the catch, so a panicking handler
            // never poisons its own mutex.
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| (*handler)(event))) {
                self.report(Fault::from_panic(
                    FaultOrigin::EventHandler {
                        priority: registration.priority,
                        sequence: registration.sequence,
                    },
                    payload,
                ));
            }
        }
    }

    /// Schedules the event to be posted when the bound clock reaches the
    /// target tick.
    ///
    /// The fan-out then happens inside the clock's drain, with the matching
    /// and ordering rules of an immediate [`post()`](Self::post) evaluated at
    /// delivery time. The returned key cancels the pending posting.
    pub fn post_at<E: Event>(&self, target: SolInstant, event: E) -> Result<TaskKey, PostError> {
        let clock = self.clock.as_ref().ok_or(PostError::Unclocked)?;
        let bus = self.clone();

        clock
            .schedule_at(target, move || bus.post(&event))
            .map_err(PostError::Scheduling)
    }

    /// Schedules the event to be posted `delay` ticks from now on the bound
    /// clock.
    pub fn post_in<E: Event>(&self, delay: SolDuration, event: E) -> Result<TaskKey, PostError> {
        let clock = self.clock.as_ref().ok_or(PostError::Unclocked)?;
        let bus = self.clone();

        clock
            .schedule_in(delay, move || bus.post(&event))
            .map_err(PostError::Scheduling)
    }

    fn report(&self, fault: Fault) {
        self.faults.lock().unwrap().report(&fault);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("clocked", &self.clock.is_some())
            .finish_non_exhaustive()
    }
}

/// Error returned by the deferred posting methods.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PostError {
    /// The bus is not bound to a clock.
    Unclocked,
    /// The bound clock rejected the scheduling request.
    Scheduling(SchedulingError),
}

impl fmt::Display for PostError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclocked => write!(fmt, "the bus is not bound to a clock"),
            Self::Scheduling(_) => write!(fmt, "the posting could not be scheduled"),
        }
    }
}

impl Error for PostError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unclocked => None,
            Self::Scheduling(err) => Some(err),
        }
    }
}

/// Handle to one registered event handler.
///
/// The bus holds the handler until the subscription is closed; there is no
/// implicit cleanup on drop, mirroring the explicit lifetime of a scheduled
/// task.
#[derive(Debug)]
#[must_use = "an unclosed subscription keeps its handler registered for the bus's lifetime"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    type_id: TypeId,
    sequence: u64,
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Removes the registration.
    ///
    /// Effective immediately, even from within a delivery: a handler closed
    /// while a post is fanning out is skipped if it has not run yet. Later
    /// registrations keep their relative order.
    pub fn close(self) {
        // The flag covers deliveries already snapshotted; the retain covers
        // everything after.
        self.active.store(false, Ordering::Relaxed);

        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap();
            if let Some(bucket) = registry.buckets.get_mut(&self.type_id) {
                bucket.retain(|r| r.sequence != self.sequence);
            }
        }
    }
}
