//! Weak reference that rebuilds its value on demand

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::trace;

/// A `Weak<T>` paired with a factory
///
/// [`get`](LazyWeak::get) returns the current value while someone else keeps
/// it alive and builds a new one through the factory once it has been
/// dropped. Concurrent callers racing on a lapsed value get the same new
/// instance.
pub struct LazyWeak<T> {
    current: RwLock<Weak<T>>,
    factory: Box<dyn Fn() -> Arc<T> + Send + Sync>,
}

impl<T> LazyWeak<T> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        Self {
            current: RwLock::new(Weak::new()),
            factory: Box::new(factory),
        }
    }

    /// Current value, built afresh if the previous one was dropped
    pub fn get(&self) -> Arc<T> {
        // Fast path: read lock
        if let Some(value) = self.current.read().upgrade() {
            return value;
        }

        let mut current = self.current.write();
        // Double-check under the write lock
        if let Some(value) = current.upgrade() {
            return value;
        }

        trace!(value = std::any::type_name::<T>(), "rebuilding lapsed weak value");
        let value = (self.factory)();
        *current = Arc::downgrade(&value);
        value
    }

    /// Current value without building one
    pub fn peek(&self) -> Option<Arc<T>> {
        self.current.read().upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.current.read().strong_count() > 0
    }
}

impl<T> fmt::Debug for LazyWeak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyWeak")
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}
