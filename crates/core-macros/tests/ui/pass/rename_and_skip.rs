use std::sync::Arc;

use weakcast::prelude::*;

#[derive(Default, EventSource)]
struct Player {
    started: Event<fn()>,
    #[event(rename = "seeked")]
    position_changed: Event<fn(u64)>,
    #[event(skip)]
    buffered: Event<fn(u8)>,
    title: String,
}

struct Scrubber;

impl Scrubber {
    fn on_seek(&self, _position: u64) {}
}

fn main() {
    assert_eq!(Player::event_names(), &["started", "seeked"]);

    let player = Arc::new(Player {
        title: "intro".to_string(),
        ..Player::default()
    });
    assert!(player.event("buffered").is_none());
    assert!(player.event("position_changed").is_none());

    let scrubber = Arc::new(Scrubber);
    subscribe_weak(
        &player,
        "seeked",
        Delegate::<fn(u64)>::method(&scrubber, Scrubber::on_seek),
    )
    .unwrap();
    player.position_changed.raise((30,));
    player.started.raise(());
    player.buffered.raise((1,));
    assert_eq!(player.title, "intro");
}
