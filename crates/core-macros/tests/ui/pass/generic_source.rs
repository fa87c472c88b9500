use weakcast::{Event, EventSource};

#[derive(EventSource)]
struct Channel<T: Clone + Send + Sync + 'static> {
    received: Event<fn(T)>,
    closed: Event<fn()>,
}

fn main() {
    let channel = Channel::<String> {
        received: Event::new(),
        closed: Event::new(),
    };
    assert_eq!(Channel::<String>::event_names(), &["received", "closed"]);
    assert_eq!(channel.event("received").map(|event| event.handler_count()), Some(0));
    assert!(channel.event("closed").is_some());
}
