//! Simulation time and wall-clock pacing.
//!
//! This module provides most notably:
//!
//! * [`SolInstant`]: a monotonic, tick-based simulation timestamp,
//! * [`SolDuration`]: a span of simulation time in ticks,
//! * [`Pacer`]: a trait for types that can pace a driving loop against
//!   wall-clock time, implemented for instance by [`SystemPacer`] and
//!   [`AutoSystemPacer`].
//!
//! Simulation time has no inherent relationship to wall-clock time: one tick
//! is whatever the simulation says it is. The pacing types map ticks to real
//! milliseconds for playback, but they live entirely outside the clock; the
//! clock itself never blocks.
//!
//! # Examples
//!
//! A driving loop running one tick every 50ms of wall-clock time:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use solclock::clock::SimClock;
//! use solclock::time::{AutoSystemPacer, Pacer};
//!
//! let clock = SimClock::builder()
//!     .nominal_tick(Duration::from_millis(50))
//!     .build()
//!     .unwrap();
//! let mut pacer = AutoSystemPacer::new(clock.nominal_tick()).unwrap();
//!
//! for _ in 0..100 {
//!     let now = clock.tick_once().unwrap();
//!     pacer.pace(now);
//! }
//! ```

mod pace;
mod sol_time;

pub use pace::{AutoSystemPacer, InvalidTickError, NoPacing, Pacer, SyncStatus, SystemPacer};
pub use sol_time::{SolDuration, SolInstant};
