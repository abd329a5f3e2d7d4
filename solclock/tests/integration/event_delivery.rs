//! Event matching, ordering and deferred posting.

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use solclock::bus::{Event, EventBus, PostError, Subscription};
use solclock::clock::{SchedulingError, SimClock};
use solclock::time::{SolDuration, SolInstant};

struct ConstructionQueued {
    site: &'static str,
}
impl Event for ConstructionQueued {}

struct PowerFailure;
impl Event for PowerFailure {}

/// Family tag grouping everything the colony dashboard cares about.
struct ColonyAlert;
impl Event for ColonyAlert {}

struct DustStorm;
impl Event for DustStorm {
    fn families(&self) -> Vec<TypeId> {
        vec![TypeId::of::<ColonyAlert>()]
    }
}

fn tick(n: u64) -> SolInstant {
    SolInstant::from_ticks(n)
}

#[test]
fn handlers_run_by_priority_then_registration_order() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let subs: Vec<Subscription> = [("low first", 0), ("high", 10), ("low second", 0)]
        .into_iter()
        .map(|(label, priority)| {
            let log = log.clone();
            bus.subscribe(priority, move |_: &ConstructionQueued| {
                log.lock().unwrap().push(label);
            })
        })
        .collect();

    bus.post(&ConstructionQueued { site: "hab-1" });
    assert_eq!(*log.lock().unwrap(), ["high", "low first", "low second"]);

    for sub in subs {
        sub.close();
    }
}

#[test]
fn events_only_reach_matching_subscribers() {
    let bus = EventBus::new();
    let hits = Arc::new(AtomicU64::new(0));

    let h = hits.clone();
    let sub = bus.subscribe(0, move |_: &ConstructionQueued| {
        h.fetch_add(1, Ordering::Relaxed);
    });

    bus.post(&PowerFailure);
    assert_eq!(hits.load(Ordering::Relaxed), 0);

    bus.post(&ConstructionQueued { site: "hab-2" });
    assert_eq!(hits.load(Ordering::Relaxed), 1);

    sub.close();
}

#[test]
fn family_subscribers_receive_member_events() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let l = log.clone();
    let broad = bus.subscribe_family::<ColonyAlert, _>(0, move |event: &dyn Event| {
        let label = if event.is::<DustStorm>() {
            "storm via family"
        } else {
            "other alert"
        };
        l.lock().unwrap().push(label);
    });

    let l = log.clone();
    let narrow = bus.subscribe(10, move |_: &DustStorm| {
        l.lock().unwrap().push("storm direct");
    });

    bus.post(&DustStorm);
    // An event with no declared families does not reach the family bucket.
    bus.post(&PowerFailure);

    assert_eq!(*log.lock().unwrap(), ["storm direct", "storm via family"]);

    broad.close();
    narrow.close();
}

#[test]
fn typed_subscriber_ignores_family_routed_foreign_events() {
    // `ColonyAlert` is both a family tag and an event type of its own; a
    // subscriber to the concrete type must not see a mere family member.
    let bus = EventBus::new();
    let hits = Arc::new(AtomicU64::new(0));

    let h = hits.clone();
    let sub = bus.subscribe(0, move |_: &ColonyAlert| {
        h.fetch_add(1, Ordering::Relaxed);
    });

    bus.post(&DustStorm);
    assert_eq!(hits.load(Ordering::Relaxed), 0);

    bus.post(&ColonyAlert);
    assert_eq!(hits.load(Ordering::Relaxed), 1);

    sub.close();
}

#[test]
fn closed_subscription_stops_delivery() {
    let bus = EventBus::new();
    let hits = Arc::new(AtomicU64::new(0));

    let h = hits.clone();
    let sub = bus.subscribe(0, move |_: &PowerFailure| {
        h.fetch_add(1, Ordering::Relaxed);
    });

    bus.post(&PowerFailure);
    sub.close();
    bus.post(&PowerFailure);

    assert_eq!(hits.load(Ordering::Relaxed), 1);
}

#[test]
fn unsubscribing_mid_delivery_skips_the_pending_handler() {
    let bus = EventBus::new();
    let hits = Arc::new(AtomicU64::new(0));
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

    let h = hits.clone();
    let victim = bus.subscribe(0, move |_: &PowerFailure| {
        h.fetch_add(1, Ordering::Relaxed);
    });
    *slot.lock().unwrap() = Some(victim);

    // Runs first (higher priority) and closes the victim before its turn.
    let closer = bus.subscribe(10, move |_: &PowerFailure| {
        if let Some(victim) = slot.lock().unwrap().take() {
            victim.close();
        }
    });

    bus.post(&PowerFailure);
    bus.post(&PowerFailure);

    assert_eq!(hits.load(Ordering::Relaxed), 0);
    closer.close();
}

#[test]
fn deferred_posting_delivers_on_the_target_tick() {
    let clock = SimClock::builder()
        .seed(42)
        .nominal_tick(std::time::Duration::from_millis(50))
        .build()
        .unwrap();
    let bus = EventBus::with_clock(clock.clone());
    let log = Arc::new(Mutex::new(Vec::new()));

    let l = log.clone();
    let observer = clock.clone();
    let urgent = bus.subscribe(10, move |event: &ConstructionQueued| {
        l.lock().unwrap().push((format!("urgent {}", event.site), observer.now().as_ticks()));
    });

    let l = log.clone();
    let observer = clock.clone();
    let routine = bus.subscribe(0, move |_: &ConstructionQueued| {
        l.lock().unwrap().push(("routine".to_string(), observer.now().as_ticks()));
    });

    let _posting = bus
        .post_at(tick(3), ConstructionQueued { site: "hab-1" })
        .unwrap();

    let l = log.clone();
    let observer = clock.clone();
    let _survey = clock
        .schedule_periodic(tick(1), SolDuration::from_ticks(2), 3, move || {
            l.lock().unwrap().push(("survey".to_string(), observer.now().as_ticks()));
        })
        .unwrap();

    clock.run_for(6).unwrap();

    let log = log.lock().unwrap();
    let rendered: Vec<(&str, u64)> = log.iter().map(|(s, t)| (s.as_str(), *t)).collect();
    assert_eq!(
        rendered,
        [
            ("survey", 1),
            ("urgent hab-1", 3),
            ("routine", 3),
            ("survey", 3),
            ("survey", 5),
        ]
    );

    urgent.close();
    routine.close();
}

#[test]
fn deferred_posting_by_delay() {
    let clock = SimClock::builder().build().unwrap();
    let bus = EventBus::with_clock(clock.clone());
    let delivered_at = Arc::new(AtomicU64::new(u64::MAX));

    clock.run_for(1).unwrap();

    let d = delivered_at.clone();
    let observer = clock.clone();
    let sub = bus.subscribe(0, move |_: &PowerFailure| {
        d.store(observer.now().as_ticks(), Ordering::Relaxed);
    });

    let _posting = bus.post_in(SolDuration::from_ticks(2), PowerFailure).unwrap();
    clock.run_for(5).unwrap();

    assert_eq!(delivered_at.load(Ordering::Relaxed), 3);
    sub.close();
}

#[test]
fn cancelled_posting_is_never_delivered() {
    let clock = SimClock::builder().build().unwrap();
    let bus = EventBus::with_clock(clock.clone());
    let hits = Arc::new(AtomicU64::new(0));

    let h = hits.clone();
    let sub = bus.subscribe(0, move |_: &PowerFailure| {
        h.fetch_add(1, Ordering::Relaxed);
    });

    let posting = bus.post_at(tick(2), PowerFailure).unwrap();
    posting.cancel();
    clock.run_for(3).unwrap();

    assert_eq!(hits.load(Ordering::Relaxed), 0);
    sub.close();
}

#[test]
fn deferred_posting_errors() {
    let unclocked = EventBus::new();
    assert_eq!(
        unclocked.post_at(tick(1), PowerFailure).unwrap_err(),
        PostError::Unclocked
    );
    assert_eq!(
        unclocked
            .post_in(SolDuration::from_ticks(1), PowerFailure)
            .unwrap_err(),
        PostError::Unclocked
    );

    let clock = SimClock::builder().build().unwrap();
    clock.run_for(2).unwrap();
    let bus = EventBus::with_clock(clock);
    assert_eq!(
        bus.post_at(tick(1), PowerFailure).unwrap_err(),
        PostError::Scheduling(SchedulingError::SchedulingInThePast)
    );
}
