use weakcast::prelude::*;

#[allow(dead_code)]
#[derive(EventSource)]
struct Door {
    #[event(rename = "")]
    opened: Event<fn()>,
}

fn main() {}
