//! Method identity and the process-wide invoker cache
//!
//! An [`Invoker`] is the type-erased form of one callable: it takes an
//! optional receiver plus the shape's argument tuple and performs the call.
//! Instance methods downcast the receiver back to their concrete type; free
//! functions ignore it.
//!
//! Invokers for zero-sized callables (fn items and non-capturing closures) are
//! built once per `(method, shape)` pair and shared by every binding that
//! names the same method, no matter how many registries it is added to.


use std::any::{Any, TypeId, type_name};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::error::{WeakError, WeakResult};
use crate::shape::{Shape, descriptor};

/// Type-erased receiver object
pub type Receiver = dyn Any + Send + Sync;

/// Pre-resolved call of one method for shape `S`
///
/// Returns `None` only when an instance method is handed no receiver, or a
/// receiver of the wrong type.
pub type Invoker<S> = Arc<
    dyn Fn(Option<&Receiver>, <S as Shape>::Args) -> Option<<S as Shape>::Output> + Send + Sync,
>;

/// Stable identity of a callable, used to match handlers on removal
///
/// Zero-sized callables are identified by their type alone, so naming the
/// same fn item twice yields equal keys. Function pointers are identified by
/// the address they point to. Capturing closures get a fresh instance number
/// every time a key is made for them: clones of one binding share a key,
/// independently created closures never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodKey {
    callable: TypeId,
    address: usize,
    instance: u64,
    name: &'static str,
}

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

impl MethodKey {
    pub(crate) fn for_callable<F: 'static>() -> Self {
        if std::mem::size_of::<F>() == 0 {
            Self {
                callable: TypeId::of::<F>(),
                address: 0,
                instance: 0,
                name: type_name::<F>(),
            }
        } else {
            Self::fresh::<F>()
        }
    }

    /// Key for `callable`, by address when it is the function pointer type `P`
    ///
    /// `address` converts the pointer; it has to be written where `P` is a
    /// concrete fn pointer type so the cast is allowed.
    pub(crate) fn of<F: 'static, P: Copy + 'static>(callable: &F, address: fn(P) -> usize) -> Self {
        let erased: &dyn Any = callable;
        match erased.downcast_ref::<P>() {
            Some(pointer) => Self {
                callable: TypeId::of::<F>(),
                address: address(*pointer),
                instance: 0,
                name: type_name::<F>(),
            },
            None => Self::for_callable::<F>(),
        }
    }

    /// A key no other callable will ever share
    pub(crate) fn fresh<F: ?Sized + 'static>() -> Self {
        Self {
            callable: TypeId::of::<F>(),
            address: 0,
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            name: type_name::<F>(),
        }
    }

    /// Type name of the callable, for diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether every binding of this callable shares one invoker
    pub fn is_shared(&self) -> bool {
        self.instance == 0
    }
}

/// A method called on a receiver of type `T` with the arguments of shape `S`
///
/// Implemented for every `Fn(&T, A1, .., An) -> R` with `S = fn(A1, .., An) -> R`.
pub trait Method<T, S: Shape>: Send + Sync + 'static {
    fn call_method(&self, receiver: &T, args: S::Args) -> S::Output;

    /// Identity used to match this method on removal
    fn method_key(&self) -> MethodKey
    where
        Self: Sized,
    {
        MethodKey::for_callable::<Self>()
    }
}

/// A free function with the arguments of shape `S`
///
/// Implemented for every `Fn(A1, .., An) -> R` with `S = fn(A1, .., An) -> R`.
pub trait Function<S: Shape>: Send + Sync + 'static {
    fn call_function(&self, args: S::Args) -> S::Output;

    /// Identity used to match this function on removal
    fn function_key(&self) -> MethodKey
    where
        Self: Sized,
    {
        MethodKey::for_callable::<Self>()
    }
}

macro_rules! impl_callables {
    ($($arg:ident $value:ident),*) => {
        impl<T, R, F, $($arg),*> Method<T, fn($($arg),*) -> R> for F
        where
            T: 'static,
            R: 'static,
            $($arg: Clone + 'static,)*
            F: Fn(&T, $($arg),*) -> R + Send + Sync + 'static,
        {
            fn call_method(&self, receiver: &T, ($($value,)*): ($($arg,)*)) -> R {
                self(receiver, $($value),*)
            }

            fn method_key(&self) -> MethodKey {
                MethodKey::of::<F, fn(&T, $($arg),*) -> R>(self, |pointer| pointer as usize)
            }
        }

        impl<R, F, $($arg),*> Function<fn($($arg),*) -> R> for F
        where
            R: 'static,
            $($arg: Clone + 'static,)*
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
        {
            fn call_function(&self, ($($value,)*): ($($arg,)*)) -> R {
                self($($value),*)
            }

            fn function_key(&self) -> MethodKey {
                MethodKey::of::<F, fn($($arg),*) -> R>(self, |pointer| pointer as usize)
            }
        }
    };
}

impl_callables!();
impl_callables!(A1 a1);
impl_callables!(A1 a1, A2 a2);
impl_callables!(A1 a1, A2 a2, A3 a3);
impl_callables!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_callables!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_callables!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_callables!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);
impl_callables!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8);

fn erase<S, F>(call: F) -> Invoker<S>
where
    S: Shape,
    F: Fn(Option<&Receiver>, S::Args) -> Option<S::Output> + Send + Sync + 'static,
{
    Arc::new(call)
}

/// Invoker calling `method` on a receiver of type `T`
pub(crate) fn method_invoker<T, S, F>(method: F) -> Invoker<S>
where
    T: Send + Sync + 'static,
    S: Shape,
    F: Fn(&T, S::Args) -> S::Output + Send + Sync + 'static,
{
    erase::<S, _>(move |receiver, args| {
        let receiver = receiver?.downcast_ref::<T>()?;
        Some(method(receiver, args))
    })
}

/// Invoker calling a free function, ignoring any receiver
pub(crate) fn function_invoker<S, F>(function: F) -> Invoker<S>
where
    S: Shape,
    F: Fn(S::Args) -> S::Output + Send + Sync + 'static,
{
    erase::<S, _>(move |_receiver, args| Some(function(args)))
}

static INVOKERS: Lazy<DashMap<(MethodKey, TypeId), Arc<dyn Any + Send + Sync>>> =
    Lazy::new(DashMap::new);

/// Get the shared invoker for `key` under shape `S`, building it on a miss
///
/// Keys of capturing closures are never cached: each one belongs to a single
/// binding and its clones.
pub(crate) fn cached<S: Shape>(key: MethodKey, build: impl FnOnce() -> Invoker<S>) -> Invoker<S> {
    if !key.is_shared() {
        return build();
    }

    let cache_key = (key, TypeId::of::<S>());
    if let Some(entry) = INVOKERS.get(&cache_key)
        && let Some(invoker) = entry.downcast_ref::<Invoker<S>>()
    {
        return invoker.clone();
    }

    let invoker = build();
    match INVOKERS.entry(cache_key) {
        Entry::Occupied(existing) => existing
            .get()
            .downcast_ref::<Invoker<S>>()
            .cloned()
            .unwrap_or(invoker),
        Entry::Vacant(slot) => {
            slot.insert(Arc::new(invoker.clone()));
            invoker
        }
    }
}

/// Reuse an invoker built for shape `M` under shape `S`
///
/// Succeeds when both shapes take and return the same types; the erased
/// invoker types are then identical and no per-call conversion is needed.
/// Anything else is rejected here, at subscription time.
pub(crate) fn adapt<M: Shape, S: Shape>(key: MethodKey, invoker: &Invoker<M>) -> WeakResult<Invoker<S>> {
    let expected = descriptor::<S>()?;
    let found = descriptor::<M>()?;

    let erased: &dyn Any = invoker;
    match erased.downcast_ref::<Invoker<S>>() {
        Some(invoker) if expected.matches(&found) => Ok(invoker.clone()),
        _ => {
            warn!(
                method = key.name(),
                expected = %expected,
                found = %found,
                "handler signature does not match"
            );
            Err(WeakError::SignatureMismatch {
                method: key.name(),
                expected: expected.to_string(),
                found: found.to_string(),
            })
        }
    }
}

/// Number of shared invokers built so far
pub fn cached_invoker_count() -> usize {
    INVOKERS.len()
}
