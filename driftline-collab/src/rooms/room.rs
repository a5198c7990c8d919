use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use log::{debug, info};
use parking_lot::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::{
    events::{PendingRequest, RoomEvent, RoomSnapshot},
    expiry::{Expiry, ExpiryId},
    moderation::ModerationState,
};

use super::{to_payload, SubscriberId, Subscriber, Subscribers};

/// The hub-side state of one live session: who is in it, who wants in, and who is watching.
pub struct Room {
    name: String,
    state: Mutex<RoomState>,
}

/// Everything about a room that must change together.
/// Holding the lock is what orders the events of a room.
pub struct RoomState {
    pub host_uid: String,
    /// Accepted guests and the host
    pub participants: BTreeSet<String>,
    /// Pending join requests in arrival order
    pub requests: Vec<PendingRequest>,
    pub viewer_count: u64,
    pub chat_enabled: bool,
    pub moderation: ModerationState,
    /// Set when the session behind the room has ended
    pub closed: bool,

    name: String,
    subscribers: Subscribers,
    request_expiries: HashMap<String, Expiry>,
    idle_since: Option<Instant>,
}

impl Room {
    pub fn new(name: &str, host_uid: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(RoomState {
                host_uid: host_uid.to_string(),
                participants: BTreeSet::from([host_uid.to_string()]),
                requests: Default::default(),
                viewer_count: 0,
                chat_enabled: true,
                moderation: Default::default(),
                closed: false,
                name: name.to_string(),
                subscribers: Default::default(),
                request_expiries: Default::default(),
                idle_since: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Locks the room for a validate-then-commit transition
    pub fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        self.lock().snapshot()
    }

    /// Publishes a single event to all current subscribers
    pub fn publish(&self, event: RoomEvent) {
        self.lock().publish(&event)
    }

    /// Registers a subscriber and sends it the snapshot before anything else
    pub fn subscribe(&self, id: SubscriberId, subscriber: Arc<dyn Subscriber>) {
        let mut state = self.lock();
        let hello = RoomEvent::Hello(state.snapshot());

        if let Some(payload) = to_payload(&hello) {
            // A subscriber that can't take the hello is already gone
            if subscriber.send(payload).is_err() {
                return;
            }
        }

        state.subscribers.add(id, subscriber);
        state.refresh_idle();

        debug!(
            "Subscriber {} joined room {} ({} total)",
            id,
            self.name,
            state.subscribers.len()
        );
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut state = self.lock();

        if state.subscribers.remove(id) {
            debug!("Subscriber {} left room {}", id, self.name);
        }

        state.refresh_idle();
    }

    /// Returns how long the room has had no subscribers and no participants.
    /// A room whose session is still live is never idle, however empty it is.
    pub fn idle_for(&self, now: Instant) -> Option<std::time::Duration> {
        let state = self.lock();

        if !state.closed {
            return None;
        }

        state
            .idle_since
            .map(|since| now.saturating_duration_since(since))
    }
}

impl RoomState {
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_name: self.name.clone(),
            host_uid: self.host_uid.clone(),
            participants: self.participants.iter().cloned().collect(),
            requests: self.requests.clone(),
            viewer_count: self.viewer_count,
            pinned_user_id: self.moderation.pinned.clone(),
            chat_enabled: self.chat_enabled,
        }
    }

    /// Serializes the event once and writes it to every subscriber.
    /// Subscribers that fail are dropped without affecting the others.
    pub fn publish(&mut self, event: &RoomEvent) {
        let Some(payload) = to_payload(event) else {
            return;
        };

        let delivered = self.subscribers.fan_out(&payload);
        info!("{} in {} -> {} subscriber(s)", event.name(), self.name, delivered);

        self.refresh_idle();
    }

    /// Turns the chat on or off, broadcasting the change
    pub fn set_chat(&mut self, enabled: bool) {
        self.chat_enabled = enabled;

        let event = if enabled {
            RoomEvent::ChatEnabled
        } else {
            RoomEvent::ChatDisabled
        };

        self.publish(&event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.contains(user_id)
    }

    pub fn is_pending(&self, user_id: &str) -> bool {
        self.requests.iter().any(|r| r.user_id == user_id)
    }

    /// Adds a pending request with its scheduled decline
    pub fn push_request(&mut self, request: PendingRequest, expiry: Expiry) {
        self.request_expiries
            .insert(request.user_id.clone(), expiry);
        self.requests.push(request);
    }

    /// Removes a pending request and disarms its decline
    pub fn take_request(&mut self, user_id: &str) -> Option<PendingRequest> {
        self.request_expiries.remove(user_id);

        let index = self.requests.iter().position(|r| r.user_id == user_id)?;
        Some(self.requests.remove(index))
    }

    /// Removes a pending request only if `id` is still its scheduled decline
    pub fn expire_request(&mut self, user_id: &str, id: ExpiryId) -> bool {
        let is_current = self
            .request_expiries
            .get(user_id)
            .map(|e| e.id() == id)
            .unwrap_or(false);

        is_current && self.take_request(user_id).is_some()
    }

    /// Tracks when the room became empty, for garbage collection
    pub fn refresh_idle(&mut self) {
        let is_empty = self.subscribers.is_empty() && self.participants.is_empty();

        match (is_empty, self.idle_since) {
            (true, None) => self.idle_since = Some(Instant::now()),
            (false, Some(_)) => self.idle_since = None,
            _ => {}
        }
    }
}
