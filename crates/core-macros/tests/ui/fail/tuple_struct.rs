use weakcast::prelude::*;

#[allow(dead_code)]
#[derive(EventSource)]
struct Door(Event<fn()>, Event<fn()>);

fn main() {}
