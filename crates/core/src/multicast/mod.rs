//! Weak multicast registry
//!
//! [`WeakMulticast`] keeps an ordered list of subscribers without keeping
//! their receivers alive. The list is an immutable snapshot behind an
//! [`ArcSwap`]: writers build a new list under a short registry-local lock and
//! publish it, invocation loads the current snapshot once and walks it
//! without locking.
//!
//! Subscribers whose receiver has been dropped are skipped during
//! invocation and pruned by the next add, remove or [`cleanup`].
//!
//! [`cleanup`]: WeakMulticast::cleanup

mod subscriber;

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::{DispatchPolicy, RegistryConfig, default_config};
use crate::delegate::{Binding, Delegate};
use crate::diagnostics::{PanicPayload, catch_panic};
use crate::error::WeakResult;
use crate::shape::{Shape, SignatureDescriptor, descriptor};

pub(crate) use subscriber::Subscriber;

/// Boxed future for shapes dispatched with [`WeakMulticast::invoke_async`]
pub type HandlerFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

struct Inner<S: Shape> {
    snapshot: ArcSwap<Vec<Subscriber<S>>>,
    alive: AtomicUsize,
    writer: Mutex<()>,
    retired: AtomicBool,
    descriptor: Arc<SignatureDescriptor>,
    config: RegistryConfig,
}

/// Registry of weakly held callbacks of shape `S`
///
/// Cloning yields another handle to the same registry.
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use weakcast_core::{Delegate, WeakMulticast};
///
/// struct Tally(AtomicU32);
///
/// impl Tally {
///     fn add(&self, amount: u32) {
///         self.0.fetch_add(amount, Ordering::SeqCst);
///     }
/// }
///
/// let registry = WeakMulticast::<fn(u32)>::new(Delegate::empty()).unwrap();
/// let tally = Arc::new(Tally(AtomicU32::new(0)));
/// registry.add(Delegate::<fn(u32)>::method(&tally, Tally::add));
///
/// registry.invoke((5,));
/// assert_eq!(tally.0.load(Ordering::SeqCst), 5);
///
/// drop(tally);
/// assert_eq!(registry.invoke((5,)), None);
/// assert_eq!(registry.alive_count(), 0);
/// ```
pub struct WeakMulticast<S: Shape> {
    inner: Arc<Inner<S>>,
}

impl<S: Shape> Clone for WeakMulticast<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Shape> fmt::Debug for WeakMulticast<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakMulticast")
            .field("shape", &self.inner.descriptor.to_string())
            .field("len", &self.len())
            .field("alive", &self.alive_count())
            .field("dispatch", &self.inner.config.dispatch)
            .finish()
    }
}

impl<S: Shape> WeakMulticast<S> {
    /// Create a registry holding `initial`, using the process-wide default
    /// configuration
    ///
    /// Fails when the shape `S` cannot be described.
    pub fn new(initial: impl Into<Delegate<S>>) -> WeakResult<Self> {
        Self::with_config(default_config(), initial)
    }

    /// Create a registry with an explicit configuration
    pub fn with_config(config: RegistryConfig, initial: impl Into<Delegate<S>>) -> WeakResult<Self> {
        let descriptor = descriptor::<S>()?;
        let records: Vec<_> = initial
            .into()
            .bindings()
            .iter()
            .map(Subscriber::from_binding)
            .collect();

        debug!(
            shape = %descriptor,
            subscribers = records.len(),
            dispatch = ?config.dispatch,
            "created weak multicast registry"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                alive: AtomicUsize::new(records.len()),
                snapshot: ArcSwap::from_pointee(records),
                writer: Mutex::new(()),
                retired: AtomicBool::new(false),
                descriptor,
                config,
            }),
        })
    }

    /// Subscribe every binding of `handler`
    ///
    /// Receivers are held weakly. Adding the same binding twice subscribes it
    /// twice.
    pub fn add(&self, handler: impl Into<Delegate<S>>) {
        let handler = handler.into();
        if handler.is_empty() {
            return;
        }
        let records = handler.bindings().iter().map(Subscriber::from_binding).collect();
        let _guard = self.inner.writer.lock();
        self.append(records);
    }

    /// Subscribe a handler declared for another, compatible shape
    ///
    /// Fails with [`SignatureMismatch`](crate::WeakError::SignatureMismatch)
    /// before anything is subscribed if any binding does not fit.
    pub fn try_add<M: Shape>(&self, handler: impl Into<Delegate<M>>) -> WeakResult<()> {
        let adapted = adapt_all::<M, S>(&handler.into())?;
        self.add(adapted);
        Ok(())
    }

    /// Add unless the registry has been retired by its event binding
    pub(crate) fn add_unless_retired(&self, handler: &Delegate<S>) -> bool {
        let records = handler.bindings().iter().map(Subscriber::from_binding).collect();
        let _guard = self.inner.writer.lock();
        if self.inner.retired.load(Ordering::Acquire) {
            return false;
        }
        self.append(records);
        true
    }

    /// Retire the registry if no subscriber is alive
    ///
    /// Returns `true` only for the call that performed the retirement. A
    /// retired registry refuses [`add_unless_retired`](Self::add_unless_retired),
    /// so a concurrent weak subscription creates a fresh binding instead of
    /// joining one that is being torn down.
    pub(crate) fn retire_if_empty(&self) -> bool {
        let _guard = self.inner.writer.lock();
        if self.inner.retired.load(Ordering::Acquire) {
            return false;
        }
        if self.inner.snapshot.load().iter().any(Subscriber::is_alive) {
            return false;
        }
        self.publish(Vec::new());
        self.inner.retired.store(true, Ordering::Release);
        true
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.inner.retired.load(Ordering::Acquire)
    }

    // caller holds the writer lock
    fn append(&self, records: Vec<Subscriber<S>>) {
        let current = self.inner.snapshot.load();
        let mut next: Vec<_> = current.iter().filter(|record| record.is_alive()).cloned().collect();
        next.extend(records);
        self.publish(next);
    }

    // caller holds the writer lock
    fn publish(&self, next: Vec<Subscriber<S>>) {
        self.inner.alive.store(next.len(), Ordering::Release);
        self.inner.snapshot.store(Arc::new(next));
    }

    /// Unsubscribe every binding of `handler`
    ///
    /// Each binding removes at most one matching subscriber, the earliest
    /// one, so one remove undoes exactly one add.
    pub fn remove(&self, handler: impl Into<Delegate<S>>) {
        let handler = handler.into();
        if handler.is_empty() {
            return;
        }
        let mut pending: Vec<&Binding<S>> = handler.bindings().iter().collect();

        let _guard = self.inner.writer.lock();
        let current = self.inner.snapshot.load();
        let mut next = Vec::with_capacity(current.len());
        for record in current.iter() {
            if !record.is_alive() {
                continue;
            }
            if let Some(index) = pending.iter().position(|binding| record.matches(binding)) {
                pending.remove(index);
                continue;
            }
            next.push(record.clone());
        }
        self.publish(next);
    }

    /// Unsubscribe a handler declared for another, compatible shape
    pub fn try_remove<M: Shape>(&self, handler: impl Into<Delegate<M>>) -> WeakResult<()> {
        let adapted = adapt_all::<M, S>(&handler.into())?;
        self.remove(adapted);
        Ok(())
    }

    /// Drop subscribers whose receiver is gone, returning how many were dropped
    pub fn cleanup(&self) -> usize {
        let _guard = self.inner.writer.lock();
        let current = self.inner.snapshot.load();
        let next: Vec<_> = current.iter().filter(|record| record.is_alive()).cloned().collect();
        let dropped = current.len() - next.len();
        self.publish(next);
        if dropped > 0 {
            trace!(dropped, "pruned dead subscribers");
        }
        dropped
    }

    /// Drop every subscriber
    pub fn clear(&self) {
        let _guard = self.inner.writer.lock();
        self.publish(Vec::new());
    }

    /// Strong delegate of the subscribers alive right now
    ///
    /// Dead subscribers are pruned on the way.
    pub fn live_delegate(&self) -> Delegate<S> {
        let _guard = self.inner.writer.lock();
        let current = self.inner.snapshot.load();
        let mut kept = Vec::with_capacity(current.len());
        let mut bindings = Vec::with_capacity(current.len());
        for record in current.iter() {
            if let Some(binding) = record.to_binding() {
                kept.push(record.clone());
                bindings.push(binding);
            }
        }
        self.publish(kept);
        bindings.into_iter().collect()
    }

    /// Call every alive subscriber in subscription order
    ///
    /// Returns the value of the last subscriber that ran, or `None` when none
    /// was alive. Takes no lock: subscribers added while this runs may or may
    /// not be called.
    pub fn invoke(&self, args: S::Args) -> Option<S::Output> {
        let snapshot = self.inner.snapshot.load_full();
        let mut alive = 0;
        let mut last = None;

        match self.inner.config.dispatch {
            DispatchPolicy::Propagate => {
                for record in snapshot.iter() {
                    if let Some(value) = record.call(args.clone()) {
                        alive += 1;
                        last = Some(value);
                    }
                }
            }
            DispatchPolicy::ContinueOnPanic => {
                let mut first_panic: Option<PanicPayload> = None;
                for record in snapshot.iter() {
                    let args = args.clone();
                    match catch_panic(AssertUnwindSafe(|| record.call(args))) {
                        Ok(Some(value)) => {
                            alive += 1;
                            last = Some(value);
                        }
                        Ok(None) => {}
                        Err(payload) => {
                            alive += 1;
                            first_panic.get_or_insert(payload);
                        }
                    }
                }
                if let Some(payload) = first_panic {
                    self.inner.alive.store(alive, Ordering::Release);
                    panic::resume_unwind(payload);
                }
            }
        }

        self.inner.alive.store(alive, Ordering::Release);
        trace!(alive, total = snapshot.len(), "dispatched");
        last
    }

    /// [`invoke`](Self::invoke), mapping "nobody alive" to the default value
    pub fn invoke_or_default(&self, args: S::Args) -> S::Output
    where
        S::Output: Default,
    {
        self.invoke(args).unwrap_or_default()
    }

    /// Call every alive subscriber, awaiting each one before the next
    ///
    /// For shapes returning a future, such as [`HandlerFuture`]. Returns the
    /// last resolved value. Panics always propagate.
    pub async fn invoke_async<T>(&self, args: S::Args) -> Option<T>
    where
        S::Output: Future<Output = T>,
    {
        let snapshot = self.inner.snapshot.load_full();
        let mut alive = 0;
        let mut last = None;
        for record in snapshot.iter() {
            if let Some(pending) = record.call(args.clone()) {
                alive += 1;
                last = Some(pending.await);
            }
        }
        self.inner.alive.store(alive, Ordering::Release);
        last
    }

    /// Number of subscribers alive as of the last add, remove, cleanup or
    /// invocation
    ///
    /// Advisory: receivers may be dropped at any time.
    pub fn alive_count(&self) -> usize {
        self.inner.alive.load(Ordering::Acquire)
    }

    /// Number of records in the current snapshot, dead ones included
    pub fn len(&self) -> usize {
        self.inner.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn descriptor(&self) -> &Arc<SignatureDescriptor> {
        &self.inner.descriptor
    }

    pub fn config(&self) -> RegistryConfig {
        self.inner.config
    }

    /// Whether both handles refer to the same registry
    pub fn ptr_eq(&self, other: &WeakMulticast<S>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Callable stand-in for the whole registry
    pub fn proxy(&self) -> Proxy<S> {
        Proxy {
            registry: self.clone(),
        }
    }
}

fn adapt_all<M: Shape, S: Shape>(handler: &Delegate<M>) -> WeakResult<Delegate<S>> {
    handler
        .bindings()
        .iter()
        .map(|binding| binding.adapt::<S>())
        .collect()
}

/// A registry packaged as a single callback of its shape
///
/// Holds the registry strongly.
pub struct Proxy<S: Shape> {
    registry: WeakMulticast<S>,
}

impl<S: Shape> Clone for Proxy<S> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<S: Shape> fmt::Debug for Proxy<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Proxy").field(&self.registry).finish()
    }
}

impl<S: Shape> Proxy<S> {
    pub fn call(&self, args: S::Args) -> Option<S::Output> {
        self.registry.invoke(args)
    }

    pub fn registry(&self) -> &WeakMulticast<S> {
        &self.registry
    }

    /// Plain closure forwarding to the registry
    pub fn into_fn(self) -> impl Fn(S::Args) -> Option<S::Output> + Send + Sync + 'static {
        move |args| self.registry.invoke(args)
    }

    /// Static delegate forwarding to the registry, for use as an ordinary
    /// handler of shape `S`
    pub fn into_delegate(self) -> Delegate<S>
    where
        S::Output: Default,
    {
        Delegate::from_fn(move |args| self.registry.invoke_or_default(args))
    }
}
