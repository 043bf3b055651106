use std::sync::{Arc, Mutex, MutexGuard};

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`Store::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct Inner<T> {
    value: T,
    subscribers: Vec<(u64, Subscriber<T>)>,
    next_id: u64,
}

/// Observable value container.
///
/// Clones share the same value. Subscribers are notified with the new value
/// after every `set`/`update`, outside the internal lock, so they may read or
/// write any store (including this one) from the callback.
pub struct Store<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value,
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    pub fn set(&self, value: T) {
        let (snapshot, subscribers) = {
            let mut inner = self.lock();
            inner.value = value;
            (inner.value.clone(), Self::subscribers_of(&inner))
        };
        for subscriber in subscribers {
            subscriber(&snapshot);
        }
    }

    /// Modify the value in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let (snapshot, subscribers) = {
            let mut inner = self.lock();
            f(&mut inner.value);
            (inner.value.clone(), Self::subscribers_of(&inner))
        };
        for subscriber in subscribers {
            subscriber(&snapshot);
        }
    }

    /// Register a callback; it is invoked immediately with the current value.
    pub fn subscribe(&self, f: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let subscriber: Subscriber<T> = Arc::new(f);
        let (id, snapshot) = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, Arc::clone(&subscriber)));
            (id, inner.value.clone())
        };
        subscriber(&snapshot);
        Subscription(id)
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.lock()
            .subscribers
            .retain(|(id, _)| *id != subscription.0);
    }

    fn subscribers_of(inner: &Inner<T>) -> Vec<Subscriber<T>> {
        inner.subscribers.iter().map(|(_, s)| Arc::clone(s)).collect()
    }

    // A subscriber that panicked leaves the value itself intact.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone + Default> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("value", &self.get()).finish()
    }
}
