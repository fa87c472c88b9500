fn main() {
    println!("weakcast examples");
    println!("=================");
    println!();
    println!("Run examples with: cargo run --bin <example_name>");
    println!("Available examples:");
    println!("  - weak_event_showcase: Weak subscriptions to an object's events");
    println!("  - registry_showcase: Using a WeakMulticast registry directly");
    println!("  - async_dispatch_showcase: Awaiting async subscribers one by one");
}
