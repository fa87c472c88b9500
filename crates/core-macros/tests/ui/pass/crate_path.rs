use weakcast as wc;

use wc::{Event, EventSource};

#[derive(EventSource)]
#[event_source(crate = "wc")]
struct Door {
    opened: wc::Event<fn(bool)>,
}

fn main() {
    let door = Door {
        opened: Event::new(),
    };
    assert_eq!(Door::event_names(), &["opened"]);
    assert!(door.event("opened").is_some());
}
