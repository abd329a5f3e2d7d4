//! A deterministic, discrete-tick simulation core.
//!
//! Solclock provides the timing and event-delivery kernel of a discrete-tick
//! simulation: a clock that advances simulated time in integral steps, a
//! priority queue of deferred callbacks drained at every step, and a
//! synchronous, type-matched event bus. Domain logic, whatever the
//! simulation is actually about, lives entirely outside this crate and
//! interacts with it only by scheduling callbacks and publishing or
//! subscribing to events.
//!
//! The design goal is reproducibility: given the same seed and the same
//! sequence of scheduling and posting calls, a simulation built on this core
//! replays identically, down to the order of every callback invocation and
//! every value drawn from the random source.
//!
//! # The tick model
//!
//! Time is counted in *ticks*, opaque unsigned integers represented by
//! [`SolInstant`](time::SolInstant) and [`SolDuration`](time::SolDuration).
//! Each call to [`SimClock::tick_once()`](clock::SimClock::tick_once)
//! advances the current tick by exactly one and then *drains* the task
//! queue: every scheduled callback whose target tick has been reached runs
//! to completion, synchronously, before `tick_once` returns. A tick boundary
//! is therefore a fully settled checkpoint.
//!
//! Two ordering rules make the drain deterministic:
//!
//! * tasks scheduled for an earlier tick always run before tasks scheduled
//!   for a later tick,
//! * tasks scheduled for the same tick run in the order they were
//!   registered, using a monotonic sequence number assigned at scheduling
//!   time as the tie-break.
//!
//! Callbacks may themselves schedule further work, including work for the
//! tick currently being drained; the drain re-examines the queue head after
//! every execution, so such work still runs within the same tick.
//!
//! # Eventing
//!
//! The [`EventBus`](bus::EventBus) delivers typed events to subscribers
//! synchronously, ordered by descending priority and then by registration
//! order. Subscribers can register for a concrete event type or for a
//! declared event *family*, so a single subscription can observe a whole
//! category of events. When bound to a clock, the bus can also defer a
//! posting to a future tick.
//!
//! # Fault isolation
//!
//! A panicking callback or event handler never aborts a drain or a fan-out:
//! the failure is caught at the dispatch boundary, reported through an
//! injectable [`FaultHandler`](fault::FaultHandler) together with enough
//! context to identify the culprit, and execution continues with the next
//! due task or matching handler.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use solclock::bus::{Event, EventBus};
//! use solclock::clock::SimClock;
//! use solclock::time::{SolDuration, SolInstant};
//!
//! #[derive(Debug)]
//! struct ConstructionQueued {
//!     site: &'static str,
//! }
//! impl Event for ConstructionQueued {}
//!
//! let clock = SimClock::builder()
//!     .seed(42)
//!     .nominal_tick(Duration::from_millis(50))
//!     .build()
//!     .unwrap();
//! let bus = EventBus::with_clock(clock.clone());
//!
//! // Delivered before any priority-0 subscriber.
//! let sub = bus.subscribe(10, |event: &ConstructionQueued| {
//!     println!("construction queued at {}", event.site);
//! });
//!
//! // Fan the event out when tick 3 is reached.
//! let posting = bus.post_at(
//!     SolInstant::EPOCH + SolDuration::from_ticks(3),
//!     ConstructionQueued { site: "hab-1" },
//! )
//! .unwrap();
//!
//! // A survey pass at ticks 1, 3 and 5, then never again.
//! let observer = clock.clone();
//! let survey = clock
//!     .schedule_periodic(
//!         SolInstant::EPOCH + SolDuration::from_ticks(1),
//!         SolDuration::from_ticks(2),
//!         3,
//!         move || println!("survey pass at {}", observer.now()),
//!     )
//!     .unwrap();
//!
//! clock.run_for(6).unwrap();
//! # let _ = (posting, survey);
//! # let _ = sub;
//! ```
//!
//! # Concurrency
//!
//! The core is designed for logically single-threaded, cooperative use: all
//! ticking, scheduling and posting are expected to happen from one
//! simulation thread. Every piece of shared state nevertheless sits behind a
//! coarse lock, so handles may be cloned into callbacks freely and an
//! embedding application that funnels calls from several threads does not
//! invite data races, though it then gives up the call-order determinism
//! that is the whole point of the design. Pacing ticks against wall-clock
//! time is not a core concern; see [`time::Pacer`] for the thin adapter
//! driving loops can use.

#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub mod bus;
pub mod clock;
pub mod fault;
pub mod time;
pub(crate) mod util;
