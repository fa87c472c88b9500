//! Bindings and composite delegates
//!
//! A [`Binding`] pairs one callable with an optional receiver: a method bound
//! to an `Arc`-owned object, or a free function. A [`Delegate`] is an ordered
//! list of bindings, the value handed to registries and events. Registries
//! decompose delegates back into bindings, so a single `add` can subscribe
//! several targets at once.
//!
//! Bindings hold their receiver strongly. Only a registry turns that into a
//! weak reference.

#[cfg(test)]
mod tests;

use std::fmt;
use std::ops::{Add, AddAssign};
use std::sync::Arc;

use crate::error::WeakResult;
use crate::invoker::{self, Function, Invoker, Method, MethodKey, Receiver};
use crate::shape::Shape;

/// One callable and its optional receiver
pub struct Binding<S: Shape> {
    key: MethodKey,
    invoker: Invoker<S>,
    receiver: Option<Arc<Receiver>>,
}

impl<S: Shape> Clone for Binding<S> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            invoker: self.invoker.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

impl<S: Shape> fmt::Debug for Binding<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("method", &self.key.name())
            .field("receiver", &self.receiver_addr())
            .finish()
    }
}

impl<S: Shape> Binding<S> {
    /// Bind `method` to `receiver`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use weakcast_core::Binding;
    ///
    /// struct Greeter;
    ///
    /// impl Greeter {
    ///     fn greet(&self, name: String) -> String {
    ///         format!("hello {name}")
    ///     }
    /// }
    ///
    /// let greeter = Arc::new(Greeter);
    /// let binding = Binding::<fn(String) -> String>::method(&greeter, Greeter::greet);
    /// assert_eq!(binding.call(("ada".to_string(),)), Some("hello ada".to_string()));
    /// ```
    pub fn method<T, F>(receiver: &Arc<T>, method: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Method<T, S>,
    {
        let key = method.method_key();
        let invoker = invoker::cached::<S>(key, move || {
            invoker::method_invoker::<T, S, _>(move |receiver, args| {
                method.call_method(receiver, args)
            })
        });
        Self::bound(key, invoker, receiver)
    }

    /// Bind a free function
    pub fn function<F>(function: F) -> Self
    where
        F: Function<S>,
    {
        let key = function.function_key();
        let invoker = invoker::cached::<S>(key, move || {
            invoker::function_invoker::<S, _>(move |args| function.call_function(args))
        });
        Self {
            key,
            invoker,
            receiver: None,
        }
    }

    /// Bind a method taking the shape's argument tuple
    ///
    /// Works for every shape, including ones declared with [`shape!`](crate::shape!).
    pub fn from_method_fn<T, F>(receiver: &Arc<T>, method: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, S::Args) -> S::Output + Send + Sync + 'static,
    {
        let key = MethodKey::of::<F, fn(&T, S::Args) -> S::Output>(&method, |pointer| pointer as usize);
        let invoker = invoker::cached::<S>(key, move || invoker::method_invoker::<T, S, _>(method));
        Self::bound(key, invoker, receiver)
    }

    /// Bind a free function taking the shape's argument tuple
    pub fn from_fn<F>(function: F) -> Self
    where
        F: Fn(S::Args) -> S::Output + Send + Sync + 'static,
    {
        let key = MethodKey::of::<F, fn(S::Args) -> S::Output>(&function, |pointer| pointer as usize);
        Self::keyed_fn(key, function)
    }

    pub(crate) fn keyed_fn<F>(key: MethodKey, function: F) -> Self
    where
        F: Fn(S::Args) -> S::Output + Send + Sync + 'static,
    {
        let invoker = invoker::cached::<S>(key, move || invoker::function_invoker::<S, _>(function));
        Self {
            key,
            invoker,
            receiver: None,
        }
    }

    fn bound<T>(key: MethodKey, invoker: Invoker<S>, receiver: &Arc<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        let receiver: Arc<Receiver> = receiver.clone();
        Self {
            key,
            invoker,
            receiver: Some(receiver),
        }
    }

    pub(crate) fn from_parts(key: MethodKey, invoker: Invoker<S>, receiver: Option<Arc<Receiver>>) -> Self {
        Self {
            key,
            invoker,
            receiver,
        }
    }

    /// Identity of the bound callable
    pub fn key(&self) -> MethodKey {
        self.key
    }

    pub fn receiver(&self) -> Option<&Arc<Receiver>> {
        self.receiver.as_ref()
    }

    /// Whether the binding has no receiver and therefore never expires
    pub fn is_static(&self) -> bool {
        self.receiver.is_none()
    }

    /// Address of the receiver, used for identity comparisons
    pub(crate) fn receiver_addr(&self) -> Option<*const ()> {
        self.receiver
            .as_ref()
            .map(|receiver| Arc::as_ptr(receiver) as *const ())
    }

    pub(crate) fn invoker(&self) -> &Invoker<S> {
        &self.invoker
    }

    /// Whether both bindings name the same callable on the same receiver
    pub fn same_target(&self, other: &Binding<S>) -> bool {
        self.key == other.key && self.receiver_addr() == other.receiver_addr()
    }

    /// Call the binding directly
    pub fn call(&self, args: S::Args) -> Option<S::Output> {
        (self.invoker)(self.receiver.as_deref(), args)
    }

    /// Reuse this binding under another, compatible shape
    pub(crate) fn adapt<T: Shape>(&self) -> WeakResult<Binding<T>> {
        Ok(Binding {
            key: self.key,
            invoker: invoker::adapt::<S, T>(self.key, &self.invoker)?,
            receiver: self.receiver.clone(),
        })
    }
}

/// Ordered list of bindings, invoked one after another
///
/// ```rust
/// use weakcast_core::Delegate;
///
/// let both = Delegate::<fn(i32) -> i32>::function(|x: i32| x + 1)
///     + Delegate::<fn(i32) -> i32>::function(|x: i32| x * 10);
///
/// assert_eq!(both.len(), 2);
/// assert_eq!(both.invoke((4,)), Some(40));
/// ```
pub struct Delegate<S: Shape> {
    bindings: Vec<Binding<S>>,
}

impl<S: Shape> Clone for Delegate<S> {
    fn clone(&self) -> Self {
        Self {
            bindings: self.bindings.clone(),
        }
    }
}

impl<S: Shape> fmt::Debug for Delegate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.bindings).finish()
    }
}

impl<S: Shape> Default for Delegate<S> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: Shape> Delegate<S> {
    /// A delegate with no bindings
    pub fn empty() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Single method binding, see [`Binding::method`]
    pub fn method<T, F>(receiver: &Arc<T>, method: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Method<T, S>,
    {
        Binding::<S>::method(receiver, method).into()
    }

    /// Single free function binding, see [`Binding::function`]
    pub fn function<F>(function: F) -> Self
    where
        F: Function<S>,
    {
        Binding::<S>::function(function).into()
    }

    /// See [`Binding::from_method_fn`]
    pub fn from_method_fn<T, F>(receiver: &Arc<T>, method: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, S::Args) -> S::Output + Send + Sync + 'static,
    {
        Binding::<S>::from_method_fn(receiver, method).into()
    }

    /// See [`Binding::from_fn`]
    pub fn from_fn<F>(function: F) -> Self
    where
        F: Fn(S::Args) -> S::Output + Send + Sync + 'static,
    {
        Binding::<S>::from_fn(function).into()
    }

    /// Append the bindings of `other`
    pub fn combine(mut self, other: impl Into<Delegate<S>>) -> Self {
        self.bindings.extend(other.into().bindings);
        self
    }

    /// Drop one binding per binding of `other`, searching from the end
    ///
    /// Returns how many bindings were removed.
    pub fn remove(&mut self, other: &Delegate<S>) -> usize {
        let mut removed = 0;
        for target in &other.bindings {
            if let Some(index) = self
                .bindings
                .iter()
                .rposition(|binding| binding.same_target(target))
            {
                self.bindings.remove(index);
                removed += 1;
            }
        }
        removed
    }

    pub fn bindings(&self) -> &[Binding<S>] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Whether no binding has a receiver
    pub fn is_static(&self) -> bool {
        self.bindings.iter().all(Binding::is_static)
    }

    /// Call every binding in order, returning the last value
    pub fn invoke(&self, args: S::Args) -> Option<S::Output> {
        let mut last = None;
        for binding in &self.bindings {
            if let Some(value) = binding.call(args.clone()) {
                last = Some(value);
            }
        }
        last
    }
}

impl<S: Shape> From<Binding<S>> for Delegate<S> {
    fn from(binding: Binding<S>) -> Self {
        Self {
            bindings: vec![binding],
        }
    }
}

impl<S: Shape> FromIterator<Binding<S>> for Delegate<S> {
    fn from_iter<I: IntoIterator<Item = Binding<S>>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

impl<S: Shape> IntoIterator for Delegate<S> {
    type Item = Binding<S>;
    type IntoIter = std::vec::IntoIter<Binding<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.into_iter()
    }
}

impl<S: Shape> Add for Delegate<S> {
    type Output = Delegate<S>;

    fn add(self, other: Delegate<S>) -> Self::Output {
        self.combine(other)
    }
}

impl<S: Shape> Add<Binding<S>> for Delegate<S> {
    type Output = Delegate<S>;

    fn add(mut self, other: Binding<S>) -> Self::Output {
        self.bindings.push(other);
        self
    }
}

impl<S: Shape> AddAssign for Delegate<S> {
    fn add_assign(&mut self, other: Delegate<S>) {
        self.bindings.extend(other.bindings);
    }
}

impl<S: Shape> AddAssign<Binding<S>> for Delegate<S> {
    fn add_assign(&mut self, other: Binding<S>) {
        self.bindings.push(other);
    }
}
