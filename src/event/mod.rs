//! Event system for pushing state to WebSocket clients.
//!
//! The telemetry loop dispatches a snapshot after every change; each
//! connected client holds a [`Subscription`].

use std::sync::Arc;

use tokio::sync::broadcast;

/// Event types that can be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Serialized dashboard snapshot.
    Snapshot(Arc<str>),
    /// The station is shutting down.
    Shutdown,
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// A subscriber that falls behind skips to the oldest retained event.
    /// Returns `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Dispatches events to subscribers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: broadcast::Sender<Event>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    /// Dispatches a serialized snapshot.
    pub fn snapshot(&self, json: String) {
        self.dispatch(Event::Snapshot(Arc::from(json)));
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
