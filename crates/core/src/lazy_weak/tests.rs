use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

fn counting_factory(builds: &Arc<AtomicUsize>) -> LazyWeak<String> {
    let builds = builds.clone();
    LazyWeak::new(move || {
        let n = builds.fetch_add(1, Ordering::SeqCst);
        Arc::new(format!("value-{n}"))
    })
}

#[test]
fn test_reuses_value_while_alive() {
    let builds = Arc::new(AtomicUsize::new(0));
    let lazy = counting_factory(&builds);
    assert!(lazy.peek().is_none());

    let first = lazy.get();
    let second = lazy.get();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(lazy.is_alive());
}

#[test]
fn test_rebuilds_after_drop() {
    let builds = Arc::new(AtomicUsize::new(0));
    let lazy = counting_factory(&builds);

    let first = lazy.get();
    assert_eq!(*first, "value-0");
    drop(first);
    assert!(!lazy.is_alive());

    assert_eq!(*lazy.get(), "value-1");
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_concurrent_get_builds_once() {
    let builds = Arc::new(AtomicUsize::new(0));
    let lazy = counting_factory(&builds);
    let holder = lazy.get();

    let values: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| lazy.get())).collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert!(values.iter().all(|value| Arc::ptr_eq(value, &holder)));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}
