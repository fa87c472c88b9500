use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use weakcast::prelude::*;

type Upload = fn(String) -> HandlerFuture<usize>;

/// A storage backend that takes a while to accept data
struct Backend {
    name: &'static str,
    latency: Duration,
}

impl Backend {
    fn store(&self, payload: String) -> HandlerFuture<usize> {
        let name = self.name;
        let latency = self.latency;
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            info!(backend = name, bytes = payload.len(), "stored");
            payload.len()
        })
    }
}

#[tokio::main]
async fn main() -> WeakResult<()> {
    better_panic::install();
    diagnostics::init_tracing();

    let uploads = WeakMulticast::<Upload>::new(Delegate::empty())?;

    let slow = Arc::new(Backend {
        name: "archive",
        latency: Duration::from_millis(40),
    });
    let fast = Arc::new(Backend {
        name: "cache",
        latency: Duration::from_millis(5),
    });
    uploads.add(Delegate::<Upload>::method(&slow, Backend::store));
    uploads.add(Delegate::<Upload>::method(&fast, Backend::store));

    // each backend finishes before the next one starts, in subscription order
    let stored = uploads.invoke_async(("report.csv".to_string(),)).await;
    println!("last backend stored {stored:?} bytes");

    drop(slow);
    let stored = uploads.invoke_async(("summary.txt".to_string(),)).await;
    println!(
        "after dropping the archive: {stored:?} bytes, {} backend(s) alive",
        uploads.alive_count()
    );

    drop(fast);
    let stored = uploads.invoke_async(("nobody.txt".to_string(),)).await;
    println!("with every backend gone: {stored:?}");

    Ok(())
}
