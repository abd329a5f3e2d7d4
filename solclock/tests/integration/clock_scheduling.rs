//! Tick advancement and task scheduling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use solclock::clock::{SchedulingError, SimClock, TaskKey};
use solclock::time::{SolDuration, SolInstant};

fn clock() -> SimClock {
    SimClock::builder().build().unwrap()
}

fn tick(n: u64) -> SolInstant {
    SolInstant::from_ticks(n)
}

fn span(n: u64) -> SolDuration {
    SolDuration::from_ticks(n)
}

#[test]
fn ticks_advance_monotonically() {
    let clock = clock();
    assert_eq!(clock.now(), SolInstant::EPOCH);

    assert_eq!(clock.tick_once().unwrap(), tick(1));
    assert_eq!(clock.run_for(4).unwrap(), tick(5));

    // Already at the target: a no-op.
    assert_eq!(clock.run_until(tick(5)), tick(5));
    assert_eq!(clock.run_until(tick(3)), tick(5));

    assert_eq!(clock.run_until(tick(8)), tick(8));
    assert_eq!(clock.run_for(0).unwrap(), tick(8));
}

#[test]
fn tasks_run_in_tick_then_registration_order() {
    let clock = clock();
    let log = Arc::new(Mutex::new(Vec::new()));

    for (label, at) in [("second", 2), ("first", 1), ("third", 2)] {
        let log = log.clone();
        let observer = clock.clone();
        let _key = clock
            .schedule_at(tick(at), move || {
                log.lock().unwrap().push((label, observer.now().as_ticks()));
            })
            .unwrap();
    }
    clock.run_for(3).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        [("first", 1), ("second", 2), ("third", 2)]
    );
}

#[test]
fn nested_same_tick_scheduling_runs_in_same_drain() {
    let clock = clock();
    let log = Arc::new(Mutex::new(Vec::new()));

    let inner_log = log.clone();
    let scheduler = clock.clone();
    let _key = clock
        .schedule_at(tick(1), move || {
            inner_log.lock().unwrap().push("outer");

            let log = inner_log.clone();
            let _nested = scheduler
                .schedule_at(scheduler.now(), move || {
                    log.lock().unwrap().push("nested");
                })
                .unwrap();
        })
        .unwrap();

    // A single tick drains both the outer task and the work it spawned.
    clock.run_for(1).unwrap();
    assert_eq!(*log.lock().unwrap(), ["outer", "nested"]);
}

#[test]
fn cancelled_task_never_runs() {
    let clock = clock();
    let hits = Arc::new(AtomicU64::new(0));

    let h = hits.clone();
    let key = clock
        .schedule_at(tick(2), move || {
            h.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
    key.cancel();

    clock.run_for(3).unwrap();
    assert_eq!(hits.load(Ordering::Relaxed), 0);
}

#[test]
fn cancelling_a_completed_task_is_a_noop() {
    let clock = clock();
    let hits = Arc::new(AtomicU64::new(0));

    let h = hits.clone();
    let key = clock
        .schedule_at(tick(1), move || {
            h.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

    clock.run_for(1).unwrap();
    key.cancel();
    clock.run_for(2).unwrap();

    assert_eq!(hits.load(Ordering::Relaxed), 1);
}

#[test]
fn cancellation_from_an_earlier_task_at_the_same_tick_is_effective() {
    let clock = clock();
    let hits = Arc::new(AtomicU64::new(0));
    let slot: Arc<Mutex<Option<TaskKey>>> = Arc::new(Mutex::new(None));

    // Registered first, so it runs first within the tick and cancels the
    // victim before the drain pops it.
    let victim_key = slot.clone();
    let _canceller = clock
        .schedule_at(tick(1), move || {
            if let Some(key) = victim_key.lock().unwrap().take() {
                key.cancel();
            }
        })
        .unwrap();

    let h = hits.clone();
    let key = clock
        .schedule_at(tick(1), move || {
            h.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
    *slot.lock().unwrap() = Some(key);

    clock.run_for(1).unwrap();
    assert_eq!(hits.load(Ordering::Relaxed), 0);
}

#[test]
fn periodic_task_runs_exactly_repeat_times() {
    let clock = clock();
    let log = Arc::new(Mutex::new(Vec::new()));

    let l = log.clone();
    let observer = clock.clone();
    let _key = clock
        .schedule_periodic(tick(1), span(2), 3, move || {
            l.lock().unwrap().push(observer.now().as_ticks());
        })
        .unwrap();

    clock.run_for(10).unwrap();
    assert_eq!(*log.lock().unwrap(), [1, 3, 5]);
}

#[test]
fn cancelled_periodic_task_stops_recurring() {
    let clock = clock();
    let hits = Arc::new(AtomicU64::new(0));

    let h = hits.clone();
    let key = clock
        .schedule_periodic(tick(1), span(1), 5, move || {
            h.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

    clock.run_for(2).unwrap();
    assert_eq!(hits.load(Ordering::Relaxed), 2);

    key.cancel();
    clock.run_for(5).unwrap();
    assert_eq!(hits.load(Ordering::Relaxed), 2);
}

#[test]
fn zero_delay_runs_on_the_next_tick() {
    let clock = clock();
    let hits = Arc::new(AtomicU64::new(0));

    let h = hits.clone();
    let _key = clock
        .schedule_in(SolDuration::ZERO, move || {
            h.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

    clock.run_for(1).unwrap();
    assert_eq!(hits.load(Ordering::Relaxed), 1);
}

#[test]
fn auto_key_cancels_on_drop() {
    let clock = clock();
    let hits = Arc::new(AtomicU64::new(0));

    let h = hits.clone();
    {
        let _auto = clock
            .schedule_at(tick(1), move || {
                h.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap()
            .into_auto();
    }

    clock.run_for(1).unwrap();
    assert_eq!(hits.load(Ordering::Relaxed), 0);
}

#[test]
fn invalid_scheduling_requests_are_rejected() {
    let clock = clock();
    clock.run_for(2).unwrap();

    assert_eq!(
        clock.schedule_at(tick(1), || {}).unwrap_err(),
        SchedulingError::SchedulingInThePast
    );
    assert_eq!(
        clock
            .schedule_periodic(tick(3), SolDuration::ZERO, 1, || {})
            .unwrap_err(),
        SchedulingError::ZeroRepetitionPeriod
    );
    assert_eq!(
        clock
            .schedule_periodic(tick(3), span(1), 0, || {})
            .unwrap_err(),
        SchedulingError::ZeroRepeatCount
    );
    assert_eq!(
        clock
            .schedule_periodic(tick(1), span(1), 3, || {})
            .unwrap_err(),
        SchedulingError::SchedulingInThePast
    );
    assert_eq!(
        clock.schedule_in(SolDuration::MAX, || {}).unwrap_err(),
        SchedulingError::TickOverflow
    );
    // The full periodic span is validated up front.
    assert_eq!(
        clock
            .schedule_periodic(SolInstant::MAX, span(1), 2, || {})
            .unwrap_err(),
        SchedulingError::TickOverflow
    );
}
