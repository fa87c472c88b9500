use std::sync::{Arc, Weak};

use crate::delegate::Binding;
use crate::invoker::{Invoker, MethodKey, Receiver};
use crate::shape::Shape;

/// Who a record calls its method on
pub(crate) enum Target {
    /// Free function, never expires
    Static,
    /// Instance method on a receiver the registry does not own
    Weak(Weak<Receiver>),
}

/// One entry of a registry snapshot
pub(crate) struct Subscriber<S: Shape> {
    invoker: Invoker<S>,
    key: MethodKey,
    target: Target,
}

impl<S: Shape> Clone for Subscriber<S> {
    fn clone(&self) -> Self {
        let target = match &self.target {
            Target::Static => Target::Static,
            Target::Weak(receiver) => Target::Weak(receiver.clone()),
        };
        Self {
            invoker: self.invoker.clone(),
            key: self.key,
            target,
        }
    }
}

impl<S: Shape> Subscriber<S> {
    pub(crate) fn from_binding(binding: &Binding<S>) -> Self {
        let target = match binding.receiver() {
            Some(receiver) => Target::Weak(Arc::downgrade(receiver)),
            None => Target::Static,
        };
        Self {
            invoker: binding.invoker().clone(),
            key: binding.key(),
            target,
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        match &self.target {
            Target::Static => true,
            Target::Weak(receiver) => receiver.strong_count() > 0,
        }
    }

    fn receiver_addr(&self) -> Option<*const ()> {
        match &self.target {
            Target::Static => None,
            Target::Weak(receiver) => Some(receiver.as_ptr() as *const ()),
        }
    }

    /// Same method on the same receiver
    ///
    /// The record holds a `Weak`, so its receiver allocation cannot be reused
    /// by another object while this comparison is possible.
    pub(crate) fn matches(&self, binding: &Binding<S>) -> bool {
        self.key == binding.key() && self.receiver_addr() == binding.receiver_addr()
    }

    /// Call the record, `None` when its receiver is gone
    pub(crate) fn call(&self, args: S::Args) -> Option<S::Output> {
        match &self.target {
            Target::Static => (self.invoker)(None, args),
            Target::Weak(receiver) => {
                let receiver = receiver.upgrade()?;
                (self.invoker)(Some(&*receiver), args)
            }
        }
    }

    /// Strong binding for this record, `None` when its receiver is gone
    pub(crate) fn to_binding(&self) -> Option<Binding<S>> {
        let receiver = match &self.target {
            Target::Static => None,
            Target::Weak(receiver) => Some(receiver.upgrade()?),
        };
        Some(Binding::from_parts(self.key, self.invoker.clone(), receiver))
    }
}
