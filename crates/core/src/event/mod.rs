//! Strong events and weak subscriptions to them
//!
//! An [`Event`] is the ordinary multicast event a source object exposes: it
//! owns its handlers and keeps their receivers alive. [`subscribe_weak`]
//! attaches a handler to such an event *without* letting the event keep the
//! receiver alive. All weak subscribers of one event share a single
//! [`WeakMulticast`](crate::WeakMulticast) registry, reached through one forwarding handler (the
//! trampoline) on the real event. Once every weak subscriber is gone the
//! trampoline detaches itself on the next firing.
//!
//! Sources describe their events by name through [`EventSource`], usually
//! with `#[derive(EventSource)]`. Written by hand it looks like this:
//!
//! ```rust
//! use std::sync::Arc;
//! use weakcast_core::{AnyEvent, Delegate, Event, EventSource, subscribe_weak};
//!
//! #[derive(Default)]
//! struct Button {
//!     clicked: Event<fn(u32)>,
//! }
//!
//! impl EventSource for Button {
//!     fn event_names() -> &'static [&'static str] {
//!         &["clicked"]
//!     }
//!
//!     fn event(&self, name: &str) -> Option<&dyn AnyEvent> {
//!         match name {
//!             "clicked" => Some(&self.clicked),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! struct Counter;
//!
//! impl Counter {
//!     fn on_click(&self, _clicks: u32) {}
//! }
//!
//! let button = Arc::new(Button::default());
//! let counter = Arc::new(Counter);
//! subscribe_weak(&button, "clicked", Delegate::<fn(u32)>::method(&counter, Counter::on_click)).unwrap();
//!
//! button.clicked.raise((1,));
//! assert_eq!(Arc::strong_count(&counter), 1);
//! ```

pub mod directory;
#[cfg(test)]
mod tests;

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::warn;

use crate::delegate::{Binding, Delegate};
use crate::error::{ShapeError, WeakError, WeakResult};
use crate::invoker::MethodKey;
use crate::shape::{Shape, SignatureDescriptor, descriptor};

pub use directory::{purge_dead_sources, registry_for, registry_for_static};

use directory::EventKey;

/// Multicast event holding its handlers strongly
pub struct Event<S: Shape> {
    handlers: ArcSwap<Vec<Binding<S>>>,
    writer: Mutex<()>,
}

impl<S: Shape> Default for Event<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Shape> fmt::Debug for Event<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("shape", &type_name::<S>())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl<S: Shape> Event<S> {
    pub fn new() -> Self {
        Self {
            handlers: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    /// Append every binding of `handler`
    pub fn subscribe(&self, handler: impl Into<Delegate<S>>) {
        let handler = handler.into();
        if handler.is_empty() {
            return;
        }
        let _guard = self.writer.lock();
        let mut next = Vec::clone(&self.handlers.load());
        next.extend(handler);
        self.handlers.store(Arc::new(next));
    }

    /// Remove one matching binding per binding of `handler`, latest first
    ///
    /// Returns how many bindings were removed.
    pub fn unsubscribe(&self, handler: impl Into<Delegate<S>>) -> usize {
        let handler = handler.into();
        let _guard = self.writer.lock();
        let mut current: Delegate<S> = self.handlers.load().iter().cloned().collect();
        let removed = current.remove(&handler);
        if removed > 0 {
            self.handlers.store(Arc::new(current.into_iter().collect()));
        }
        removed
    }

    /// Remove the binding with `key`
    pub(crate) fn unsubscribe_key(&self, key: MethodKey) -> bool {
        let _guard = self.writer.lock();
        let current = self.handlers.load();
        let Some(index) = current.iter().rposition(|binding| binding.key() == key) else {
            return false;
        };
        let mut next = Vec::clone(&current);
        next.remove(index);
        self.handlers.store(Arc::new(next));
        true
    }

    /// Call every handler in order, returning the last value
    ///
    /// Handlers may subscribe or unsubscribe while the event is being raised;
    /// the change applies from the next raise.
    pub fn raise(&self, args: S::Args) -> Option<S::Output> {
        let handlers = self.handlers.load_full();
        let mut last = None;
        for handler in handlers.iter() {
            if let Some(value) = handler.call(args.clone()) {
                last = Some(value);
            }
        }
        last
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.load().len()
    }
}

/// Type-erased view of an [`Event`]
pub trait AnyEvent: Send + Sync {
    /// Descriptor of the event's shape
    fn descriptor(&self) -> Result<Arc<SignatureDescriptor>, ShapeError>;

    fn handler_count(&self) -> usize;

    fn as_any(&self) -> &dyn Any;
}

impl<S: Shape> AnyEvent for Event<S> {
    fn descriptor(&self) -> Result<Arc<SignatureDescriptor>, ShapeError> {
        descriptor::<S>()
    }

    fn handler_count(&self) -> usize {
        Event::<S>::handler_count(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An object exposing events by name
///
/// Usually implemented with `#[derive(EventSource)]`.
pub trait EventSource: Send + Sync + 'static {
    /// Names accepted by [`event`](EventSource::event)
    fn event_names() -> &'static [&'static str];

    fn event(&self, name: &str) -> Option<&dyn AnyEvent>;
}

/// A type exposing process-wide events by name
pub trait StaticEventSource: 'static {
    fn static_event_names() -> &'static [&'static str];

    fn static_event(name: &str) -> Option<&'static dyn AnyEvent>;
}

/// Look up `name` and check that it is an event of shape `S`
fn resolve<'a, S: Shape>(
    event: Option<&'a dyn AnyEvent>,
    source_type: &'static str,
    name: &str,
    handler: &Delegate<S>,
) -> WeakResult<&'a Event<S>> {
    let Some(event) = event else {
        warn!(source = source_type, event = name, "no such event");
        return Err(WeakError::NoSuchEvent {
            source_type,
            event: name.to_owned(),
        });
    };

    if let Some(event) = event.as_any().downcast_ref::<Event<S>>() {
        return Ok(event);
    }

    let expected = event.descriptor()?;
    let found = descriptor::<S>()?;
    let method = handler
        .bindings()
        .first()
        .map_or(source_type, |binding| binding.key().name());
    warn!(
        source = source_type,
        event = name,
        expected = %expected,
        found = %found,
        "handler does not fit event"
    );
    Err(WeakError::SignatureMismatch {
        method,
        expected: expected.to_string(),
        found: found.to_string(),
    })
}

fn event_of<S: Shape>(event: Option<&dyn AnyEvent>) -> Option<&Event<S>> {
    event?.as_any().downcast_ref::<Event<S>>()
}

/// Subscribe `handler` to the event `event_name` of `source` without keeping
/// its receivers alive
///
/// Fails with [`WeakError::NoSuchEvent`] for an unknown name and with
/// [`WeakError::SignatureMismatch`] when the event has another shape. A
/// handler made only of free functions is attached to the event directly.
pub fn subscribe_weak<Src, S>(
    source: &Arc<Src>,
    event_name: &str,
    handler: Delegate<S>,
) -> WeakResult<()>
where
    Src: EventSource,
    S: Shape,
    S::Output: Default,
{
    let event = resolve(source.event(event_name), type_name::<Src>(), event_name, &handler)?;
    if handler.is_empty() {
        return Ok(());
    }
    if handler.is_static() {
        event.subscribe(handler);
        return Ok(());
    }

    let weak_source = Arc::downgrade(source);
    let name = event_name.to_owned();
    directory::subscribe(
        EventKey::instance(source, event_name),
        Some(directory::source_handle(source)),
        event,
        handler,
        move |trampoline| {
            if let Some(source) = weak_source.upgrade()
                && let Some(event) = event_of::<S>(source.event(&name))
            {
                event.unsubscribe_key(trampoline);
            }
        },
    )
}

/// Undo one [`subscribe_weak`]
///
/// Removing a handler that is not subscribed does nothing.
pub fn unsubscribe_weak<Src, S>(
    source: &Arc<Src>,
    event_name: &str,
    handler: Delegate<S>,
) -> WeakResult<()>
where
    Src: EventSource,
    S: Shape,
{
    let event = resolve(source.event(event_name), type_name::<Src>(), event_name, &handler)?;
    if handler.is_static() {
        event.unsubscribe(handler);
        return Ok(());
    }
    if let Some(registry) = directory::lookup::<S>(&EventKey::instance(source, event_name)) {
        registry.remove(handler);
    }
    Ok(())
}

/// [`subscribe_weak`] for an event of the type `Src` itself
pub fn subscribe_weak_static<Src, S>(event_name: &str, handler: Delegate<S>) -> WeakResult<()>
where
    Src: StaticEventSource,
    S: Shape,
    S::Output: Default,
{
    let event = resolve(Src::static_event(event_name), type_name::<Src>(), event_name, &handler)?;
    if handler.is_empty() {
        return Ok(());
    }
    if handler.is_static() {
        event.subscribe(handler);
        return Ok(());
    }

    let name = event_name.to_owned();
    directory::subscribe(
        EventKey::of_type::<Src>(event_name),
        None,
        event,
        handler,
        move |trampoline| {
            if let Some(event) = event_of::<S>(Src::static_event(&name)) {
                event.unsubscribe_key(trampoline);
            }
        },
    )
}

/// [`unsubscribe_weak`] for an event of the type `Src` itself
pub fn unsubscribe_weak_static<Src, S>(event_name: &str, handler: Delegate<S>) -> WeakResult<()>
where
    Src: StaticEventSource,
    S: Shape,
{
    let event = resolve(Src::static_event(event_name), type_name::<Src>(), event_name, &handler)?;
    if handler.is_static() {
        event.unsubscribe(handler);
        return Ok(());
    }
    if let Some(registry) = directory::lookup::<S>(&EventKey::of_type::<Src>(event_name)) {
        registry.remove(handler);
    }
    Ok(())
}
