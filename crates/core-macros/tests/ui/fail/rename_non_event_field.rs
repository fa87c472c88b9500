use weakcast::prelude::*;

#[allow(dead_code)]
#[derive(EventSource)]
struct Door {
    opened: Event<fn()>,
    #[event(rename = "label")]
    label: String,
}

fn main() {}
