//! Weak multicast callbacks
//!
//! Registries and events that call back into objects without keeping them
//! alive. See [`WeakMulticast`] for the registry and [`subscribe_weak`] for
//! weak subscriptions to ordinary [`Event`]s.

pub use weakcast_core::{
    AnyEvent, ArgList, Binding, Delegate, DispatchPolicy, Event, EventSource, Function, HandlerFuture,
    Invoker, LazyWeak, Method, MethodKey, ParamType, Proxy, Receiver, RegistryConfig, Shape, ShapeError,
    SignatureDescriptor, StaticEventSource, WeakError, WeakMulticast, WeakResult, config, default_config,
    delegate, descriptor, diagnostics, error, event, invoker, lazy_weak, multicast, purge_dead_sources,
    registry_for, registry_for_static, set_default_config, shape, subscribe_weak, subscribe_weak_static,
    unsubscribe_weak, unsubscribe_weak_static,
};

pub use weakcast_core_macros::EventSource;

pub mod prelude {
    pub use super::*;
}
