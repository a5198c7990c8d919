mod room;
mod subscriber;

use std::{sync::Arc, time::Duration};

use log::info;
use tokio::{task::JoinHandle, time::Instant};

use crate::{
    events::{LiveFeedEvent, RoomEvent, RoomSnapshot},
    CollabContext, CollabError, CollabResult,
};

pub use room::*;
pub use subscriber::*;

/// Fans room events out to every subscriber of a room.
/// Rooms are keyed by their name, which is also the RTC channel.
pub struct RoomHub {
    context: CollabContext,
}

impl RoomHub {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Registers a new room with the host as its first participant.
    /// A room left over from an ended session is replaced.
    pub fn open_room(&self, room_name: &str, host_uid: &str) -> CollabResult<Arc<Room>> {
        use dashmap::mapref::entry::Entry;

        let room = Arc::new(Room::new(room_name, host_uid));

        match self.context.rooms.entry(room_name.to_string()) {
            Entry::Occupied(mut existing) => {
                if !existing.get().lock().closed {
                    return Err(CollabError::Conflict(format!(
                        "Room {room_name} is already live"
                    )));
                }

                existing.insert(room.clone());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(room.clone());
            }
        }

        info!("Room {} opened by {}", room_name, host_uid);
        Ok(room)
    }

    pub fn room(&self, room_name: &str) -> CollabResult<Arc<Room>> {
        self.context.room(room_name)
    }

    /// Subscribes to a room. The first message the subscriber gets is a `hello` snapshot.
    pub fn subscribe(
        &self,
        room_name: &str,
        subscriber: Arc<dyn Subscriber>,
    ) -> CollabResult<Subscription> {
        let room = self.room(room_name)?;
        let id = SubscriberId::new();

        room.subscribe(id, subscriber);

        Ok(Subscription {
            id,
            room_name: room_name.to_string(),
        })
    }

    /// Removes a subscriber. Unknown rooms or subscribers are ignored.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        if let Some(room) = self.context.rooms.get(&subscription.room_name) {
            room.unsubscribe(subscription.id)
        }
    }

    pub fn publish(&self, room_name: &str, event: RoomEvent) -> CollabResult<()> {
        self.room(room_name)?.publish(event);
        Ok(())
    }

    pub fn snapshot(&self, room_name: &str) -> CollabResult<RoomSnapshot> {
        Ok(self.room(room_name)?.snapshot())
    }

    /// Marks a room as belonging to an ended session, publishing the terminal event
    pub fn close_room(&self, room_name: &str, event: RoomEvent) {
        if let Some(room) = self.context.rooms.get(room_name).map(|r| r.clone()) {
            let mut state = room.lock();
            state.closed = true;
            state.publish(&event);
        }
    }

    /// Removes the room after `grace`, unless it was replaced in the meantime
    pub fn schedule_teardown(&self, room_name: &str, grace: Duration) {
        let Some(room) = self.context.rooms.get(room_name).map(|r| r.clone()) else {
            return;
        };

        let context = self.context.clone();

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            let removed = context
                .rooms
                .remove_if(room.name(), |_, current| Arc::ptr_eq(current, &room));

            if removed.is_some() {
                info!("Room {} torn down", room.name());
            }
        });
    }

    /// Removes closed rooms that have been empty for longer than the idle grace.
    /// Returns the names of the removed rooms.
    pub fn collect_garbage(&self, now: Instant) -> Vec<String> {
        let grace = self.context.config.room_idle_grace;

        let expired: Vec<_> = self
            .context
            .rooms
            .iter()
            .filter(|r| r.idle_for(now).map(|d| d >= grace).unwrap_or(false))
            .map(|r| r.key().clone())
            .collect();

        expired
            .into_iter()
            .filter(|name| {
                self.context
                    .rooms
                    .remove_if(name, |_, room| {
                        room.idle_for(now).map(|d| d >= grace).unwrap_or(false)
                    })
                    .is_some()
            })
            .inspect(|name| info!("Room {} collected after being idle", name))
            .collect()
    }

    /// Periodically collects idle rooms
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let hub = RoomHub::new(&self.context);
        let period = self.context.config.room_idle_grace;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;
                hub.collect_garbage(Instant::now());
            }
        })
    }

    /// Subscribes to the feed of live sessions, starting with the given snapshot
    pub fn subscribe_live_feed(
        &self,
        subscriber: Arc<dyn Subscriber>,
        hello: LiveFeedEvent,
    ) -> Subscription {
        let id = SubscriberId::new();
        let mut feed = self.context.live_feed.lock();

        let accepted = to_payload(&hello)
            .map(|p| subscriber.send(p).is_ok())
            .unwrap_or(true);

        if accepted {
            feed.add(id, subscriber);
        }

        Subscription {
            id,
            room_name: String::new(),
        }
    }

    pub fn unsubscribe_live_feed(&self, subscription: &Subscription) {
        self.context.live_feed.lock().remove(subscription.id);
    }

    pub fn publish_live_feed(&self, event: LiveFeedEvent) {
        if let Some(payload) = to_payload(&event) {
            self.context.live_feed.lock().fan_out(&payload);
        }
    }
}

#[cfg(test)]
mod test {
    use driftline_core::Config;

    use super::*;

    fn hub() -> RoomHub {
        RoomHub::new(&CollabContext::for_tests(Config::default()))
    }

    #[test]
    fn test_open_room_twice_conflicts() {
        let hub = hub();

        hub.open_room("beach-cam", "host").unwrap();

        assert!(matches!(
            hub.open_room("beach-cam", "other"),
            Err(CollabError::Conflict(_))
        ));
    }

    #[test]
    fn test_closed_room_can_be_replaced() {
        let hub = hub();

        hub.open_room("beach-cam", "host").unwrap();
        hub.close_room(
            "beach-cam",
            RoomEvent::SessionEnded {
                session_id: "1".to_string(),
                ended_at: 0,
            },
        );

        let room = hub.open_room("beach-cam", "other").unwrap();
        assert_eq!(room.snapshot().host_uid, "other");
    }

    #[test]
    fn test_subscribe_unknown_room() {
        let hub = hub();

        assert!(matches!(
            hub.subscribe("nowhere", MemorySubscriber::new()),
            Err(CollabError::NotFound { .. })
        ));
    }

    #[test]
    fn test_events_arrive_in_order_for_every_subscriber() {
        let hub = hub();
        hub.open_room("beach-cam", "host").unwrap();

        let first = MemorySubscriber::new();
        let second = MemorySubscriber::new();
        hub.subscribe("beach-cam", first.clone()).unwrap();
        hub.subscribe("beach-cam", second.clone()).unwrap();

        for count in 1..=5 {
            hub.publish("beach-cam", RoomEvent::ViewerCount { count })
                .unwrap();
        }

        fn counts(subscriber: &MemorySubscriber) -> Vec<u64> {
            subscriber
                .events()
                .iter()
                .filter_map(|e| e["count"].as_u64())
                .collect()
        }

        assert_eq!(counts(&first), vec![1, 2, 3, 4, 5]);
        assert_eq!(counts(&first), counts(&second));
    }

    #[test]
    fn test_failed_subscriber_is_removed() {
        let hub = hub();
        hub.open_room("beach-cam", "host").unwrap();

        let healthy = MemorySubscriber::new();
        let broken = MemorySubscriber::new();
        hub.subscribe("beach-cam", healthy.clone()).unwrap();
        hub.subscribe("beach-cam", broken.clone()).unwrap();

        broken.close();
        hub.publish("beach-cam", RoomEvent::ChatEnabled).unwrap();
        hub.publish("beach-cam", RoomEvent::ChatDisabled).unwrap();

        assert_eq!(
            healthy.event_types(),
            vec!["hello", "chat_enabled", "chat_disabled"]
        );
        assert_eq!(hub.room("beach-cam").unwrap().lock().subscriber_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_rooms_are_collected() {
        let hub = hub();
        let room = hub.open_room("beach-cam", "host").unwrap();
        hub.open_room("busy", "host").unwrap();

        let subscription = hub.subscribe("beach-cam", MemorySubscriber::new()).unwrap();
        room.lock().participants.clear();
        hub.unsubscribe(&subscription);
        hub.close_room(
            "beach-cam",
            RoomEvent::SessionEnded {
                session_id: "1".to_string(),
                ended_at: 0,
            },
        );

        assert!(hub.collect_garbage(Instant::now()).is_empty());

        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(hub.collect_garbage(Instant::now()), vec!["beach-cam"]);
        assert!(hub.room("busy").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_live_room_is_kept() {
        let hub = hub();
        let room = hub.open_room("beach-cam", "host").unwrap();
        room.lock().participants.clear();
        room.lock().refresh_idle();

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(hub.collect_garbage(Instant::now()).is_empty());
        assert!(matches!(
            hub.open_room("beach-cam", "other"),
            Err(CollabError::Conflict(_))
        ));
    }
}
