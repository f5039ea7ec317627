//! Handler lists for controller notifications

/// Returned by every `on_*` call; pass to `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

type Handler<T> = Box<dyn FnMut(&T)>;

/// Handlers for one kind of notification, called in subscription order
pub struct Subscribers<T> {
    handlers: Vec<(SubscriptionId, Handler<T>)>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<T> std::fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.handlers.len())
            .finish()
    }
}

impl<T> Subscribers<T> {
    pub fn add(&mut self, id: SubscriptionId, handler: impl FnMut(&T) + 'static) {
        self.handlers.push((id, Box::new(handler)));
    }

    /// Returns whether `id` was subscribed here
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    pub fn emit(&mut self, value: &T) {
        for (_, handler) in &mut self.handlers {
            handler(value);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
