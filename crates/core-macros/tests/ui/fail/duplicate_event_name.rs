use weakcast::prelude::*;

#[allow(dead_code)]
#[derive(EventSource)]
struct Door {
    opened: Event<fn()>,
    #[event(rename = "opened")]
    unlocked: Event<fn()>,
}

fn main() {}
