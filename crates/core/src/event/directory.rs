//! Process-wide directory of weak event bindings
//!
//! Maps a source (an object, or a type for type-level events) plus an event
//! name to the registry holding that event's weak subscribers. Entries for
//! object sources keep a `Weak` to the source, which also pins its address so
//! a later object can never inherit a dead source's entry.
//!
//! An entry lives as long as its trampoline: dropping the event (usually by
//! dropping the source) removes it.

use std::any::{Any, TypeId};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use once_cell::sync::Lazy;
use tracing::debug;

use super::{Event, EventSource, StaticEventSource};
use crate::delegate::{Binding, Delegate};
use crate::error::WeakResult;
use crate::invoker::{MethodKey, Receiver};
use crate::multicast::WeakMulticast;
use crate::shape::Shape;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SourceId {
    Instance(usize),
    Type(TypeId),
}

/// Source plus event name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct EventKey {
    source: SourceId,
    event: String,
}

impl EventKey {
    pub(crate) fn instance<Src: EventSource>(source: &Arc<Src>, event: &str) -> Self {
        Self {
            source: SourceId::Instance(Arc::as_ptr(source) as *const () as usize),
            event: event.to_owned(),
        }
    }

    pub(crate) fn of_type<Src: StaticEventSource>(event: &str) -> Self {
        Self {
            source: SourceId::Type(TypeId::of::<Src>()),
            event: event.to_owned(),
        }
    }
}

/// Liveness handle stored with an object source's binding
pub(crate) fn source_handle<Src: EventSource>(source: &Arc<Src>) -> Weak<Receiver> {
    let erased: Arc<Receiver> = source.clone();
    Arc::downgrade(&erased)
}

struct Binder {
    registry: Arc<dyn Any + Send + Sync>,
    source: Option<Weak<Receiver>>,
}

impl Binder {
    fn source_is_dead(&self) -> bool {
        self.source
            .as_ref()
            .is_some_and(|source| source.strong_count() == 0)
    }

    fn registry<S: Shape>(&self) -> Option<WeakMulticast<S>> {
        self.registry.downcast_ref::<WeakMulticast<S>>().cloned()
    }

    fn holds<S: Shape>(&self, registry: &WeakMulticast<S>) -> bool {
        self.registry
            .downcast_ref::<WeakMulticast<S>>()
            .is_some_and(|held| held.ptr_eq(registry))
    }
}

static DIRECTORY: Lazy<DashMap<EventKey, Binder>> = Lazy::new(DashMap::new);

/// Marker naming trampoline bindings in diagnostics
enum Trampoline {}

/// Directory entry owned by a trampoline, removed when the trampoline drops
struct Unbind<S: Shape> {
    key: EventKey,
    registry: WeakMulticast<S>,
}

impl<S: Shape> Unbind<S> {
    fn remove(&self) -> bool {
        DIRECTORY
            .remove_if(&self.key, |_, binder| binder.holds(&self.registry))
            .is_some()
    }
}

impl<S: Shape> Drop for Unbind<S> {
    fn drop(&mut self) {
        if self.remove() {
            debug!(event = %self.key.event, "event dropped, removed weak event binding");
        }
    }
}

/// Add `handler` to the registry bound to `key`, creating the binding and its
/// trampoline on `event` when there is none
pub(crate) fn subscribe<S, D>(
    key: EventKey,
    source: Option<Weak<Receiver>>,
    event: &Event<S>,
    handler: Delegate<S>,
    detach: D,
) -> WeakResult<()>
where
    S: Shape,
    S::Output: Default,
    D: Fn(MethodKey) + Send + Sync + 'static,
{
    loop {
        match DIRECTORY.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                if occupied.get().source_is_dead() {
                    occupied.remove();
                    continue;
                }
                let Some(registry) = occupied.get().registry::<S>() else {
                    occupied.remove();
                    continue;
                };
                drop(occupied);

                if registry.add_unless_retired(&handler) {
                    return Ok(());
                }
                // the trampoline retired it; replace the stale binding
                DIRECTORY.remove_if(&key, |_, binder| binder.holds(&registry));
            }
            Entry::Vacant(vacant) => {
                let registry = WeakMulticast::<S>::new(handler)?;
                vacant.insert(Binder {
                    registry: Arc::new(registry.clone()),
                    source,
                });

                let trampoline = MethodKey::fresh::<Trampoline>();
                debug!(
                    event = %key.event,
                    shape = %registry.descriptor(),
                    "installing weak event trampoline"
                );
                event.subscribe(Binding::<S>::keyed_fn(
                    trampoline,
                    forward(Unbind { key, registry }, trampoline, detach),
                ));
                return Ok(());
            }
        }
    }
}

/// Body of a trampoline: forward to the registry, or tear the binding down
/// once nobody is left
fn forward<S, D>(
    binding: Unbind<S>,
    trampoline: MethodKey,
    detach: D,
) -> impl Fn(S::Args) -> S::Output + Send + Sync + 'static
where
    S: Shape,
    S::Output: Default,
    D: Fn(MethodKey) + Send + Sync + 'static,
{
    move |args| {
        let registry = &binding.registry;
        if registry.alive_count() == 0 {
            registry.retire_if_empty();
        }
        if !registry.is_retired() {
            return registry.invoke_or_default(args);
        }
        if binding.remove() {
            debug!(event = %binding.key.event, "removed weak event binding");
        }
        detach(trampoline);
        S::Output::default()
    }
}

/// Registry at `key`, unless its source is gone
pub(crate) fn lookup<S: Shape>(key: &EventKey) -> Option<WeakMulticast<S>> {
    let binder = DIRECTORY.get(key)?;
    if binder.source_is_dead() {
        return None;
    }
    binder.registry::<S>()
}

/// Registry behind the weak subscriptions to `event_name` of `source`
pub fn registry_for<Src, S>(source: &Arc<Src>, event_name: &str) -> Option<WeakMulticast<S>>
where
    Src: EventSource,
    S: Shape,
{
    lookup(&EventKey::instance(source, event_name))
}

/// Registry behind the weak subscriptions to the type-level event `event_name`
pub fn registry_for_static<Src, S>(event_name: &str) -> Option<WeakMulticast<S>>
where
    Src: StaticEventSource,
    S: Shape,
{
    lookup(&EventKey::of_type::<Src>(event_name))
}

/// Drop bindings whose source object has been dropped
///
/// Bindings normally go away with their event. This catches the ones whose
/// event outlived its source, such as an `Arc`-shared event.
///
/// Returns how many were dropped.
pub fn purge_dead_sources() -> usize {
    let mut purged = 0;
    DIRECTORY.retain(|key, binder| {
        let dead = binder.source_is_dead();
        if dead {
            debug!(event = %key.event, "purging binding of dropped source");
            purged += 1;
        }
        !dead
    });
    purged
}

#[cfg(test)]
pub(crate) fn contains(key: &EventKey) -> bool {
    DIRECTORY.contains_key(key)
}

/// Number of live and not yet purged bindings
pub fn len() -> usize {
    DIRECTORY.len()
}

pub fn is_empty() -> bool {
    DIRECTORY.is_empty()
}
