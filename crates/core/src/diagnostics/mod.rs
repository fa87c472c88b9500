//! Logging setup and panic capture
//!
//! The library only emits `tracing` events. Binaries and tests that want to
//! see them call [`init_tracing`] once at startup.


use std::any::Any;
use std::io;
use std::panic::{self, UnwindSafe};
use std::sync::Once;

use tracing::error;
use tracing_subscriber::Registry;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    prelude::*,
};

static INIT: Once = Once::new();

/// Install a stderr subscriber filtered by `RUST_LOG`, defaulting to `info`
///
/// Only the first call has any effect. If another global subscriber is
/// already installed it is left in place.
pub fn init_tracing() {
    INIT.call_once(|| {
        let env_filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy();
        let console_layer = fmt::Layer::new().with_writer(io::stderr).with_target(true);

        let subscriber = Registry::default().with(env_filter).with(console_layer);
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::debug!("global tracing subscriber already installed");
        }
    });
}

/// Panic payload as returned by `catch_unwind`
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Run `f`, turning a panic into an `Err` carrying its payload
///
/// The panic is logged at `error` level with its message when the payload is
/// a string.
///
/// # Example
/// ```
/// use weakcast_core::diagnostics::catch_panic;
///
/// assert_eq!(catch_panic(|| 42).ok(), Some(42));
/// assert!(catch_panic(|| panic!("fail!")).is_err());
/// ```
pub fn catch_panic<T, F>(f: F) -> Result<T, PanicPayload>
where
    F: FnOnce() -> T + UnwindSafe,
{
    panic::catch_unwind(f).inspect_err(|payload| {
        error!(
            target: "weakcast::dispatch",
            payload = panic_message(payload.as_ref()),
            "subscriber panicked"
        );
    })
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<unknown>"
    }
}
