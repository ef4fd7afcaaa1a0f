//! Recovery listeners.

use super::records::Message;

/// Receives messages streamed out of a subscriber's cursor.
///
/// Listeners run while the topic store is locked and must not call back
/// into the same store.
pub trait RecoveryListener {
    /// Accepts one message. Returning `false` stops the recovery.
    fn accept(&mut self, message: Message) -> bool;

    /// Returns whether the listener can take another message.
    fn has_capacity(&self) -> bool;
}

/// A listener that keeps every message it accepts, up to an optional capacity.
#[derive(Debug, Clone, Default)]
pub struct CollectingListener {
    messages: Vec<Message>,
    capacity: Option<usize>,
}

impl CollectingListener {
    /// Creates a listener with unlimited capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a listener that reports no capacity after `capacity` messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Vec::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    /// Messages accepted so far.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Ids of the messages accepted so far, in delivery order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.id.to_string()).collect()
    }

    /// Consumes the listener, returning its messages.
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl RecoveryListener for CollectingListener {
    fn accept(&mut self, message: Message) -> bool {
        self.messages.push(message);
        self.has_capacity()
    }

    fn has_capacity(&self) -> bool {
        self.capacity.map_or(true, |cap| self.messages.len() < cap)
    }
}

impl<F> RecoveryListener for F
where
    F: FnMut(Message) -> bool,
{
    fn accept(&mut self, message: Message) -> bool {
        self(message)
    }

    fn has_capacity(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_reported_after_accept() {
        let mut listener = CollectingListener::with_capacity(2);
        assert!(listener.accept(Message::new("a", "x")));
        assert!(!listener.accept(Message::new("b", "y")));
        assert!(!listener.has_capacity());
        assert_eq!(listener.ids(), vec!["a", "b"]);
    }

    #[test]
    fn closures_are_listeners() {
        let mut seen = 0;
        let mut listener = |_message: Message| {
            seen += 1;
            seen < 2
        };
        assert!(listener.accept(Message::new("a", "x")));
        assert!(!listener.accept(Message::new("b", "x")));
    }
}
