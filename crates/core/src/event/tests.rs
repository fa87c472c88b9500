use super::*;
use crate::WeakMulticast;
use once_cell::sync::Lazy;
use weakcast_core_macros::EventSource;

#[derive(Default, EventSource)]
struct Sensor {
    reading: Event<fn(u32)>,
    #[event(rename = "threshold")]
    threshold_crossed: Event<fn(u32) -> u32>,
    #[event(skip)]
    internal: Event<fn()>,
    label: String,
}

#[derive(Default)]
struct Display {
    seen: Mutex<Vec<u32>>,
}

impl Display {
    fn show(&self, value: u32) {
        self.seen.lock().push(value);
    }

    fn double(&self, value: u32) -> u32 {
        value * 2
    }

    fn seen(&self) -> Vec<u32> {
        self.seen.lock().clone()
    }
}

type OnReading = fn(u32);
type OnThreshold = fn(u32) -> u32;

fn show(display: &Arc<Display>) -> Delegate<OnReading> {
    Delegate::<OnReading>::method(display, Display::show)
}

fn sensor() -> Arc<Sensor> {
    Arc::new(Sensor::default())
}

#[test]
fn test_derived_event_lookup() {
    assert_eq!(Sensor::event_names(), &["reading", "threshold"]);

    let sensor = Sensor {
        label: "porch".to_string(),
        ..Sensor::default()
    };
    assert!(sensor.event("reading").is_some());
    assert!(sensor.event("threshold").is_some());
    assert!(sensor.event("threshold_crossed").is_none());
    assert!(sensor.event("internal").is_none());
    assert_eq!(sensor.internal.raise(()), None);
    assert_eq!(sensor.label, "porch");
}

#[test]
fn test_strong_event_keeps_order_and_receivers() {
    let event = Event::<OnThreshold>::new();
    let display = Arc::new(Display::default());

    event.subscribe(Delegate::<OnThreshold>::function(|v: u32| v + 1));
    event.subscribe(Delegate::<OnThreshold>::method(&display, Display::double));
    assert_eq!(event.handler_count(), 2);
    assert_eq!(Arc::strong_count(&display), 2);
    assert_eq!(event.raise((4,)), Some(8));

    assert_eq!(event.unsubscribe(Delegate::<OnThreshold>::method(&display, Display::double)), 1);
    assert_eq!(Arc::strong_count(&display), 1);
    assert_eq!(event.raise((4,)), Some(5));
}

#[test]
fn test_weak_subscription_does_not_keep_receiver_alive() {
    let sensor = sensor();
    let display = Arc::new(Display::default());

    subscribe_weak(&sensor, "reading", show(&display)).unwrap();
    assert_eq!(Arc::strong_count(&display), 1);

    sensor.reading.raise((7,));
    assert_eq!(display.seen(), vec![7]);
}

#[test]
fn test_weak_subscribers_share_one_trampoline() {
    let sensor = sensor();
    let first = Arc::new(Display::default());
    let second = Arc::new(Display::default());

    subscribe_weak(&sensor, "reading", show(&first)).unwrap();
    subscribe_weak(&sensor, "reading", show(&second)).unwrap();
    assert_eq!(sensor.reading.handler_count(), 1);

    let registry: WeakMulticast<OnReading> = registry_for(&sensor, "reading").unwrap();
    assert_eq!(registry.alive_count(), 2);

    sensor.reading.raise((3,));
    assert_eq!(first.seen(), vec![3]);
    assert_eq!(second.seen(), vec![3]);
}

#[test]
fn test_trampoline_detaches_after_subscribers_die() {
    let sensor = sensor();
    let display = Arc::new(Display::default());
    subscribe_weak(&sensor, "reading", show(&display)).unwrap();
    assert_eq!(sensor.reading.handler_count(), 1);

    drop(display);
    sensor.reading.raise((1,));
    sensor.reading.raise((2,));

    assert_eq!(sensor.reading.handler_count(), 0);
    assert!(registry_for::<Sensor, OnReading>(&sensor, "reading").is_none());
}

#[test]
fn test_unsubscribe_weak_then_detach() {
    let sensor = sensor();
    let display = Arc::new(Display::default());
    subscribe_weak(&sensor, "reading", show(&display)).unwrap();

    unsubscribe_weak(&sensor, "reading", show(&display)).unwrap();
    sensor.reading.raise((1,));
    assert!(display.seen().is_empty());
    assert_eq!(sensor.reading.handler_count(), 0);

    // unsubscribing again is a no-op
    unsubscribe_weak(&sensor, "reading", show(&display)).unwrap();
}

#[test]
fn test_resubscribe_after_detach_creates_new_binding() {
    let sensor = sensor();
    let gone = Arc::new(Display::default());
    subscribe_weak(&sensor, "reading", show(&gone)).unwrap();
    let old: WeakMulticast<OnReading> = registry_for(&sensor, "reading").unwrap();

    unsubscribe_weak(&sensor, "reading", show(&gone)).unwrap();
    sensor.reading.raise((0,));
    assert_eq!(sensor.reading.handler_count(), 0);

    let display = Arc::new(Display::default());
    subscribe_weak(&sensor, "reading", show(&display)).unwrap();
    let new: WeakMulticast<OnReading> = registry_for(&sensor, "reading").unwrap();
    assert!(!new.ptr_eq(&old));

    sensor.reading.raise((5,));
    assert_eq!(display.seen(), vec![5]);
    assert!(gone.seen().is_empty());
}

#[test]
fn test_subscribe_to_retired_registry_replaces_it() {
    let sensor = sensor();
    let display = Arc::new(Display::default());
    subscribe_weak(&sensor, "reading", show(&display)).unwrap();
    let old: WeakMulticast<OnReading> = registry_for(&sensor, "reading").unwrap();

    unsubscribe_weak(&sensor, "reading", show(&display)).unwrap();
    assert!(old.retire_if_empty());

    subscribe_weak(&sensor, "reading", show(&display)).unwrap();
    let new: WeakMulticast<OnReading> = registry_for(&sensor, "reading").unwrap();
    assert!(!new.ptr_eq(&old));
    assert_eq!(new.alive_count(), 1);

    // the stale trampoline removes itself on the next raise
    assert_eq!(sensor.reading.handler_count(), 2);
    sensor.reading.raise((1,));
    assert_eq!(sensor.reading.handler_count(), 1);
    assert_eq!(display.seen(), vec![1]);
}

#[test]
fn test_static_handler_attaches_directly() {
    fn log_reading(_: u32) {}

    let sensor = sensor();
    subscribe_weak(&sensor, "reading", Delegate::<OnReading>::function(log_reading)).unwrap();
    assert_eq!(sensor.reading.handler_count(), 1);
    assert!(registry_for::<Sensor, OnReading>(&sensor, "reading").is_none());

    unsubscribe_weak(&sensor, "reading", Delegate::<OnReading>::function(log_reading)).unwrap();
    assert_eq!(sensor.reading.handler_count(), 0);
}

#[test]
fn test_weak_subscribers_return_values_through_trampoline() {
    let sensor = sensor();
    let display = Arc::new(Display::default());
    subscribe_weak(
        &sensor,
        "threshold",
        Delegate::<OnThreshold>::method(&display, Display::double),
    )
    .unwrap();

    assert_eq!(sensor.threshold_crossed.raise((21,)), Some(42));

    drop(display);
    assert_eq!(sensor.threshold_crossed.raise((21,)), Some(0));
}

#[test]
fn test_unknown_event_is_rejected() {
    let sensor = sensor();
    let display = Arc::new(Display::default());

    let err = subscribe_weak(&sensor, "missing", show(&display)).unwrap_err();
    match err {
        WeakError::NoSuchEvent { source_type, event } => {
            assert!(source_type.ends_with("Sensor"));
            assert_eq!(event, "missing");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(unsubscribe_weak(&sensor, "internal", show(&display)).is_err());
}

#[test]
fn test_mismatched_shape_is_rejected() {
    let sensor = sensor();
    let display = Arc::new(Display::default());

    let err = subscribe_weak(&sensor, "threshold", show(&display)).unwrap_err();
    match err {
        WeakError::SignatureMismatch { expected, found, .. } => {
            assert_eq!(expected, "fn(u32) -> u32");
            assert_eq!(found, "fn(u32)");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(sensor.threshold_crossed.handler_count(), 0);
}

#[test]
fn test_dropping_the_source_removes_its_binding() {
    let display = Arc::new(Display::default());
    let sources: Vec<_> = (0..20).map(|_| sensor()).collect();
    let keys: Vec<_> = sources
        .iter()
        .map(|source| directory::EventKey::instance(source, "reading"))
        .collect();
    // keeps the addresses from being reused while the keys are checked
    let pinned: Vec<_> = sources.iter().map(Arc::downgrade).collect();

    for source in &sources {
        subscribe_weak(source, "reading", show(&display)).unwrap();
    }
    assert!(keys.iter().all(directory::contains));

    drop(sources);
    assert!(pinned.iter().all(|source| source.strong_count() == 0));
    assert!(!keys.iter().any(directory::contains));
    assert_eq!(Arc::strong_count(&display), 1);
}

/// Source whose event is shared and can outlive it
struct Relay {
    forwarded: Arc<Event<OnReading>>,
}

impl EventSource for Relay {
    fn event_names() -> &'static [&'static str] {
        &["forwarded"]
    }

    fn event(&self, name: &str) -> Option<&dyn AnyEvent> {
        match name {
            "forwarded" => Some(self.forwarded.as_ref()),
            _ => None,
        }
    }
}

#[test]
fn test_purge_dead_sources() {
    let display = Arc::new(Display::default());
    let shared = Arc::new(Event::<OnReading>::new());
    let relay = Arc::new(Relay {
        forwarded: shared.clone(),
    });
    let key = directory::EventKey::instance(&relay, "forwarded");
    let pinned = Arc::downgrade(&relay);

    subscribe_weak(&relay, "forwarded", show(&display)).unwrap();
    drop(relay);
    assert!(directory::contains(&key));

    assert!(purge_dead_sources() >= 1);
    assert!(!directory::contains(&key));

    // the orphaned trampoline still forwards until its subscribers go
    shared.raise((5,));
    assert_eq!(display.seen(), vec![5]);
    drop(pinned);
}

struct Clock;

static TICKED: Lazy<Event<fn(u64)>> = Lazy::new(Event::new);

impl StaticEventSource for Clock {
    fn static_event_names() -> &'static [&'static str] {
        &["ticked"]
    }

    fn static_event(name: &str) -> Option<&'static dyn AnyEvent> {
        match name {
            "ticked" => Some(&*TICKED),
            _ => None,
        }
    }
}

struct Ticks(Mutex<Vec<u64>>);

impl Ticks {
    fn on_tick(&self, tick: u64) {
        self.0.lock().push(tick);
    }
}

#[test]
fn test_type_level_events() {
    let ticks = Arc::new(Ticks(Mutex::new(Vec::new())));
    let on_tick = || Delegate::<fn(u64)>::method(&ticks, Ticks::on_tick);

    subscribe_weak_static::<Clock, _>("ticked", on_tick()).unwrap();
    assert_eq!(TICKED.handler_count(), 1);
    assert!(registry_for_static::<Clock, fn(u64)>("ticked").is_some());

    TICKED.raise((1,));
    unsubscribe_weak_static::<Clock, _>("ticked", on_tick()).unwrap();
    TICKED.raise((2,));

    assert_eq!(*ticks.0.lock(), vec![1]);
    assert_eq!(TICKED.handler_count(), 0);
    assert!(registry_for_static::<Clock, fn(u64)>("ticked").is_none());

    let err = subscribe_weak_static::<Clock, _>("tocked", on_tick()).unwrap_err();
    assert!(matches!(err, WeakError::NoSuchEvent { .. }));
    assert_eq!(Clock::static_event_names(), &["ticked"]);
}
