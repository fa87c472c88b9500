use std::sync::Arc;

use parking_lot::Mutex;
use weakcast::prelude::*;

weakcast::shape! {
    /// Price quote for a symbol, returning the quoted price in cents
    Quote(symbol: String, cents: u64) -> u64
}

/// A trader's order book
struct Ledger {
    owner: &'static str,
    quotes: Mutex<Vec<(String, u64)>>,
}

impl Ledger {
    fn new(owner: &'static str) -> Self {
        Self {
            owner,
            quotes: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, symbol: String, cents: u64) -> u64 {
        self.quotes.lock().push((symbol, cents));
        cents
    }

    fn len(&self) -> usize {
        self.quotes.lock().len()
    }
}

fn main() -> WeakResult<()> {
    better_panic::install();
    diagnostics::init_tracing();

    let config = RegistryConfig::from_json(r#"{ "dispatch": "continue_on_panic" }"#)?;
    let quotes = WeakMulticast::<Quote>::with_config(config, Delegate::empty())?;
    println!("registry shape: {}", quotes.descriptor());

    let alice = Arc::new(Ledger::new("alice"));
    let bob = Arc::new(Ledger::new("bob"));

    // handlers written against a plain fn shape are adapted to `Quote`
    quotes.try_add::<fn(String, u64) -> u64>(Delegate::<fn(String, u64) -> u64>::method(&alice, Ledger::record))?;
    quotes.try_add::<fn(String, u64) -> u64>(Delegate::<fn(String, u64) -> u64>::method(&bob, Ledger::record))?;

    let last = quotes.invoke(("ACME".to_string(), 1_250));
    println!("last quote returned {last:?}, alive subscribers {}", quotes.alive_count());

    // a handler of the wrong shape is rejected up front
    if let Err(err) = quotes.try_add::<fn(String)>(Delegate::<fn(String)>::function(|_: String| {})) {
        println!("rejected: {err}");
    }

    println!("{} leaves the desk", bob.owner);
    drop(bob);
    quotes.invoke(("ACME".to_string(), 1_260));
    println!(
        "alive after dispatch {}, records before cleanup {}, pruned {}",
        quotes.alive_count(),
        quotes.len(),
        quotes.cleanup()
    );

    // the proxy turns the whole registry into one callback
    let forward = quotes.proxy().into_fn();
    forward(("INIT".to_string(), 990));
    println!("{} recorded {} quotes", alice.owner, alice.len());

    let snapshot = quotes.live_delegate();
    println!("live delegate holds {} binding(s)", snapshot.len());

    quotes.clear();
    println!("after clear: {:?}", quotes.invoke(("ACME".to_string(), 1)));

    Ok(())
}
