//! Example: day-to-day life of a small Mars colony.
//!
//! This example demonstrates in particular:
//!
//! * one-shot and periodic task scheduling,
//! * cancellation of a pending task,
//! * typed and family event subscriptions,
//! * deferred event posting,
//! * real-time pacing of the driving loop.

use std::any::TypeId;
use std::time::Duration;

use solclock::bus::{Event, EventBus};
use solclock::clock::SimClock;
use solclock::time::{AutoSystemPacer, Pacer, SolDuration, SolInstant};

/// Family tag for everything the colony log should record.
struct ColonyLog;

/// A new structure entered the construction queue.
struct ConstructionQueued {
    site: &'static str,
}

impl Event for ConstructionQueued {
    fn families(&self) -> Vec<TypeId> {
        vec![TypeId::of::<ColonyLog>()]
    }
}

/// A dust storm front reached the settlement.
struct DustStorm {
    severity: u64,
}

impl Event for DustStorm {
    fn families(&self) -> Vec<TypeId> {
        vec![TypeId::of::<ColonyLog>()]
    }
}

fn main() {
    let clock = SimClock::builder()
        .seed(42)
        .nominal_tick(Duration::from_millis(50))
        .build()
        .unwrap();
    let bus = EventBus::with_clock(clock.clone());

    // The colony log sees every tagged event, before any other subscriber.
    let journal = bus.subscribe_family::<ColonyLog, _>(10, |event: &dyn Event| {
        if let Some(event) = event.downcast_ref::<ConstructionQueued>() {
            println!("log: construction queued at {}", event.site);
        } else if let Some(event) = event.downcast_ref::<DustStorm>() {
            println!("log: dust storm, severity {}", event.severity);
        }
    });

    // The construction office only cares about its own queue.
    let office = bus.subscribe(0, |event: &ConstructionQueued| {
        println!("office: dispatching crew to {}", event.site);
    });

    // A survey drone reports every other tick, three times in total.
    let observer = clock.clone();
    let survey = clock
        .schedule_periodic(
            SolInstant::EPOCH + SolDuration::from_ticks(1),
            SolDuration::from_ticks(2),
            3,
            move || println!("drone: survey pass at {}", observer.now()),
        )
        .unwrap();

    // Queue a build for tick 3 and let the weather interfere with a second
    // one: the posting scheduled for tick 5 may be cancelled before it is due.
    let _hab = bus
        .post_at(
            SolInstant::EPOCH + SolDuration::from_ticks(3),
            ConstructionQueued { site: "hab-1" },
        )
        .unwrap();

    let doomed = bus
        .post_at(
            SolInstant::EPOCH + SolDuration::from_ticks(5),
            ConstructionQueued { site: "greenhouse-2" },
        )
        .unwrap();

    // Storm severity is drawn from the deterministic random source, so every
    // run of this example prints the same report.
    let rng = clock.rng();
    let poster = bus.clone();
    let _storm = clock
        .schedule_at(SolInstant::EPOCH + SolDuration::from_ticks(4), move || {
            let severity = 1 + rng.next_bounded(5);
            poster.post(&DustStorm { severity });

            if severity > 2 {
                println!("command: storm too severe, scrubbing the greenhouse build");
                doomed.cancel();
            }
        })
        .unwrap();

    // Drive six ticks at 50ms each.
    let mut pacer = AutoSystemPacer::new(clock.nominal_tick()).unwrap();
    for _ in 0..6 {
        let now = clock.tick_once().unwrap();
        pacer.pace(now);
    }

    survey.cancel();
    journal.close();
    office.close();
}
