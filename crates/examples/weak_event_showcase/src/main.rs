use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::info;
use weakcast::prelude::*;

/// A thermostat publishing temperature changes
#[derive(Default, EventSource)]
struct Thermostat {
    #[event(rename = "temperature")]
    temperature_changed: Event<fn(f32)>,
    #[event(rename = "alarm")]
    over_limit: Event<fn(f32) -> bool>,
}

impl Thermostat {
    fn set(&self, celsius: f32) {
        self.temperature_changed.raise((celsius,));
        if celsius > 30.0 {
            let acknowledged = self.over_limit.raise((celsius,)).unwrap_or(false);
            info!(celsius, acknowledged, "alarm raised");
        }
    }
}

/// A display that only lives as long as its window is open
struct Display {
    name: &'static str,
    updates: AtomicU32,
}

impl Display {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            updates: AtomicU32::new(0),
        })
    }

    fn show(&self, celsius: f32) {
        self.updates.fetch_add(1, Ordering::Relaxed);
        info!(display = self.name, celsius, "temperature shown");
    }

    fn acknowledge(&self, celsius: f32) -> bool {
        info!(display = self.name, celsius, "alarm acknowledged");
        true
    }
}

fn log_to_console(celsius: f32) {
    println!("[console] {celsius:.1} °C");
}

fn main() -> WeakResult<()> {
    better_panic::install();
    diagnostics::init_tracing();

    let thermostat = Arc::new(Thermostat::default());

    let kitchen = Display::new("kitchen");
    let hallway = Display::new("hallway");
    subscribe_weak(&thermostat, "temperature", Delegate::<fn(f32)>::method(&kitchen, Display::show))?;
    subscribe_weak(&thermostat, "temperature", Delegate::<fn(f32)>::method(&hallway, Display::show))?;
    subscribe_weak(
        &thermostat,
        "alarm",
        Delegate::<fn(f32) -> bool>::method(&kitchen, Display::acknowledge),
    )?;

    // free functions never expire and go straight onto the event
    subscribe_weak(&thermostat, "temperature", Delegate::<fn(f32)>::function(log_to_console))?;

    println!(
        "handlers on `temperature`: {} (one forwarder for both displays plus the console)",
        thermostat.temperature_changed.handler_count()
    );

    thermostat.set(21.5);
    thermostat.set(31.0);

    println!("closing the hallway window");
    drop(hallway);
    thermostat.set(22.0);

    println!("closing the kitchen window");
    let kitchen_updates = kitchen.updates.load(Ordering::Relaxed);
    drop(kitchen);
    thermostat.set(23.0);
    thermostat.set(24.0);

    println!(
        "kitchen saw {kitchen_updates} updates; handlers on `temperature` now: {}",
        thermostat.temperature_changed.handler_count()
    );

    match subscribe_weak(&thermostat, "humidity", Delegate::<fn(f32)>::function(log_to_console)) {
        Err(err) => println!("expected failure: {err}"),
        Ok(()) => println!("unexpectedly subscribed to a missing event"),
    }

    Ok(())
}
