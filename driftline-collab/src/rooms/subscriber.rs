use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use driftline_core::Id;
use log::warn;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

/// An event serialized once and shared between every recipient
pub type Payload = Arc<str>;

pub type SubscriberId = Id<Subscription>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("Subscriber has disconnected")]
    Closed,
    #[error("Subscriber is not keeping up")]
    Full,
}

/// One open push channel. The hub only needs to hand it bytes.
/// Implementations must not block.
pub trait Subscriber: Send + Sync {
    fn send(&self, payload: Payload) -> Result<(), SendError>;
}

/// Identifies a subscriber within the room it subscribed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: SubscriberId,
    pub room_name: String,
}

/// A list of push channels, kept in subscription order
#[derive(Default)]
pub struct Subscribers {
    entries: Vec<(SubscriberId, Arc<dyn Subscriber>)>,
}

impl Subscribers {
    pub fn add(&mut self, id: SubscriberId, subscriber: Arc<dyn Subscriber>) {
        self.entries.push((id, subscriber))
    }

    pub fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(i, _)| *i != id);

        before != self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the payload to every subscriber, dropping the ones that fail.
    /// Returns how many received it.
    pub fn fan_out(&mut self, payload: &Payload) -> usize {
        self.entries.retain(|(id, subscriber)| match subscriber.send(payload.clone()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping subscriber {}: {}", id, e);
                false
            }
        });

        self.entries.len()
    }
}

/// Serializes a value for fan-out
pub fn to_payload<T: Serialize>(value: &T) -> Option<Payload> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json.into()),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}

/// A subscriber that keeps every payload in memory.
/// Useful for clients that poll, and for tests.
#[derive(Default)]
pub struct MemorySubscriber {
    messages: Mutex<Vec<Payload>>,
    closed: AtomicBool,
}

impl MemorySubscriber {
    pub fn new() -> Arc<Self> {
        Default::default()
    }

    /// Every payload received so far
    pub fn messages(&self) -> Vec<Payload> {
        self.messages.lock().clone()
    }

    /// Every payload received so far, parsed back into JSON
    pub fn events(&self) -> Vec<serde_json::Value> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| serde_json::from_str(m).ok())
            .collect()
    }

    /// The `type` of every payload received so far
    pub fn event_types(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e["type"].as_str().map(|t| t.to_string()))
            .collect()
    }

    /// Makes every following send fail, like a dropped connection
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst)
    }
}

impl Subscriber for MemorySubscriber {
    fn send(&self, payload: Payload) -> Result<(), SendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }

        self.messages.lock().push(payload);
        Ok(())
    }
}
