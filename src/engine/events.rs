// Event system for subscription delivery

//! # Event System
//!
//! This module provides the event bus that connects the write path (mutation
//! resolvers) to the notify path (subscription resolvers) via named topics.
//! It handles:
//! - Publishing an event to every listener registered on a topic
//! - Registering listeners as cancellable payload streams
//! - Deregistering listeners when their stream is dropped
//!
//! ## Delivery Contract
//!
//! `publish` delivers the payload to exactly the listeners registered on the
//! topic at the moment of the call, each exactly once, in publish order
//! relative to other events on that topic. It returns immediately: there is
//! no acknowledgment, no persistence, and no delivery confirmation. With zero
//! listeners the payload is silently dropped. A disconnected client never has
//! events replayed to it — this at-most-once behavior is an accepted property
//! of the design, not a defect to patch around.
//!
//! ## Thread Safety
//!
//! The listener registry is mutated by the subscribe path, the drop path, and
//! read by the publish path. Because tokio schedules resolvers across worker
//! threads, the registry sits behind a `Mutex`. The lock is only held for
//! registry bookkeeping; delivery goes through per-listener unbounded
//! channels, so `publish` never blocks on a slow consumer.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, trace};
use uuid::Uuid;

/// Topic published when a post is created
pub const POST_ADDED: &str = "POST_ADDED";

/// Topic published when a post is deleted
pub const POST_DELETED: &str = "POST_DELETED";

/// An ephemeral event carried from a publish call to each listener
///
/// Events are never stored, replayed, or acknowledged; their lifetime is the
/// duration of a single fan-out. The envelope id and timestamp exist for
/// logging and debugging only.
#[derive(Debug, Clone)]
pub struct Event<T> {
    pub id: Uuid,
    pub payload: T,
    pub published_at: DateTime<Utc>,
}

impl<T> Event<T> {
    fn new(payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            published_at: Utc::now(),
        }
    }
}

/// A registered listener: the sending half of its delivery channel
struct ListenerEntry<T> {
    id: Uuid,
    sender: mpsc::UnboundedSender<Event<T>>,
}

/// Listener registry shared between the bus and its streams
type Registry<T> = Mutex<HashMap<String, Vec<ListenerEntry<T>>>>;

/// Event bus for publishing and subscribing to topic-keyed events
///
/// One instance is constructed per server and injected into both the
/// mutation and subscription resolver contexts — there is no ambient global
/// singleton, so tests can build isolated buses. Cloning is cheap and all
/// clones share the same registry.
pub struct EventBus<T> {
    registry: Arc<Registry<T>>,
}

impl<T: Clone + Send + 'static> EventBus<T> {
    /// Create a new event bus with an empty listener registry
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Publish a payload to every listener currently registered on `topic`
    ///
    /// Returns the number of listeners the event was handed to. Zero is not
    /// an error; an unknown topic simply has zero listeners. Listeners whose
    /// receiving half has already been dropped are pruned as a side effect,
    /// so a disconnect that raced this publish neither errors nor leaks an
    /// entry.
    pub fn publish(&self, topic: &str, payload: T) -> usize {
        let event = Event::new(payload);
        let mut registry = self.registry.lock().unwrap();

        let Some(listeners) = registry.get_mut(topic) else {
            trace!(topic, event_id = %event.id, "no listeners registered, event dropped");
            return 0;
        };

        let mut delivered = 0;
        listeners.retain(|listener| match listener.sender.send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            // Receiver dropped between deregistration and this publish
            Err(_) => false,
        });

        if listeners.is_empty() {
            registry.remove(topic);
        }

        debug!(topic, event_id = %event.id, delivered, "event published");
        delivered
    }

    /// Register a listener on `topic` and return its payload stream
    ///
    /// The stream is lazy, infinite, and non-restartable: each subsequent
    /// publish on the topic yields exactly one element, in publish order.
    /// Dropping the stream deregisters the listener; after that no further
    /// payloads are delivered to it. Payloads already sitting in the
    /// listener's channel at the moment of cancellation are discarded with
    /// the receiver.
    pub fn subscribe(&self, topic: &str) -> EventStream<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let mut registry = self.registry.lock().unwrap();
        registry
            .entry(topic.to_string())
            .or_default()
            .push(ListenerEntry { id, sender });

        debug!(topic, listener_id = %id, "listener registered");

        EventStream {
            inner: UnboundedReceiverStream::new(receiver),
            _guard: ListenerGuard {
                registry: self.registry.clone(),
                topic: topic.to_string(),
                id,
            },
        }
    }

    /// Number of listeners currently registered on `topic`
    pub fn listener_count(&self, topic: &str) -> usize {
        let registry = self.registry.lock().unwrap();
        registry.get(topic).map_or(0, Vec::len)
    }
}

impl<T: Clone + Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

/// Deregisters its listener from the shared registry on drop
struct ListenerGuard<T> {
    registry: Arc<Registry<T>>,
    topic: String,
    id: Uuid,
}

impl<T> Drop for ListenerGuard<T> {
    fn drop(&mut self) {
        let mut registry = self.registry.lock().unwrap();
        if let Some(listeners) = registry.get_mut(&self.topic) {
            listeners.retain(|listener| listener.id != self.id);
            if listeners.is_empty() {
                registry.remove(&self.topic);
            }
        }
        debug!(topic = %self.topic, listener_id = %self.id, "listener deregistered");
    }
}

/// Stream of events for one registered listener
///
/// Produced by [`EventBus::subscribe`]. Cancellation is the drop of this
/// value: the guard removes the registry entry synchronously, so the publish
/// path stops seeing the listener as soon as the stream is gone.
pub struct EventStream<T> {
    inner: UnboundedReceiverStream<Event<T>>,
    _guard: ListenerGuard<T>,
}

impl<T> Stream for EventStream<T> {
    type Item = Event<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<T> Unpin for EventStream<T> {}
