//! A minimal observable value.
//!
//! A [`Signal`] holds a current value and a set of listeners. Every call to
//! [`Signal::emit`] stores the value and notifies all listeners synchronously,
//! even when the value did not change. New listeners receive the current value
//! as soon as they subscribe.

use std::collections::BTreeMap;
use std::fmt;

/// Handle returned by [`Signal::subscribe`].
pub type SubscriptionId = u64;

type Listener<T> = Box<dyn FnMut(&T) + Send + Sync>;

/// Current value plus synchronously notified listeners.
pub struct Signal<T> {
    value: T,
    next_listener_id: SubscriptionId,
    listeners: BTreeMap<SubscriptionId, Listener<T>>,
}

impl<T> Signal<T> {
    /// Create a signal holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            value,
            next_listener_id: 1,
            listeners: BTreeMap::new(),
        }
    }

    /// The current value.
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Store `value` and notify every listener in subscription order.
    pub fn emit(&mut self, value: T) {
        self.value = value;
        for listener in self.listeners.values_mut() {
            listener(&self.value);
        }
    }

    /// Register a listener. It is called once with the current value before
    /// this returns.
    pub fn subscribe<F>(&mut self, mut listener: F) -> SubscriptionId
    where
        F: FnMut(&T) + Send + Sync + 'static,
    {
        listener(&self.value);
        let id = self.next_listener_id;
        self.next_listener_id = self.next_listener_id.saturating_add(1);
        self.listeners.insert(id, Box::new(listener));
        id
    }

    /// Remove a listener. Returns false if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<T: Default> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &self.value)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
