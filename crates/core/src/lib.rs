// Lets `#[derive(EventSource)]` output resolve inside this crate's own tests.
extern crate self as weakcast;

pub mod config;
pub mod delegate;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod invoker;
pub mod lazy_weak;
pub mod multicast;
pub mod shape;

#[cfg(test)]
mod test_utils;

// Re-export commonly used items
pub use config::{DispatchPolicy, RegistryConfig, default_config, set_default_config};
pub use delegate::{Binding, Delegate};
pub use error::{ShapeError, WeakError, WeakResult};
pub use event::{
    AnyEvent, Event, EventSource, StaticEventSource, purge_dead_sources, registry_for, registry_for_static,
    subscribe_weak, subscribe_weak_static, unsubscribe_weak, unsubscribe_weak_static,
};
pub use invoker::{Function, Invoker, Method, MethodKey, Receiver};
pub use lazy_weak::LazyWeak;
pub use multicast::{HandlerFuture, Proxy, WeakMulticast};
pub use shape::{ArgList, ParamType, Shape, SignatureDescriptor, descriptor};
