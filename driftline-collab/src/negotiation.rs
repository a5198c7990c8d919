use std::sync::{Arc, Weak};

use chrono::Utc;
use driftline_core::{CapabilityToken, Role};
use log::info;

use crate::{
    error::required,
    events::{PendingRequest, RoomEvent, RoomSnapshot},
    expiry::Expiry,
    CollabContext, CollabError, CollabResult, Room, RoomState,
};

/// The request/accept protocol that lets a viewer become a guest.
///
/// Per user and room: none, then requested, then accepted, withdrawn or expired.
pub struct JoinNegotiation {
    context: CollabContext,
}

impl JoinNegotiation {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Asks the host to let `from_uid` in. Requesting again while pending changes nothing.
    ///
    /// The block check is against `host_uid` if given, otherwise the room's host.
    pub fn request(
        &self,
        room_name: &str,
        from_uid: &str,
        from_name: &str,
        host_uid: Option<&str>,
    ) -> CollabResult<()> {
        let from_uid = required(from_uid, "fromUid")?;
        let room = self.context.room(room_name)?;
        let mut state = room.lock();

        self.check_allowed(&state, from_uid, host_uid)?;

        if state.is_participant(from_uid) || state.is_pending(from_uid) {
            return Ok(());
        }

        let request = PendingRequest {
            user_id: from_uid.to_string(),
            name: from_name.trim().to_string(),
        };

        let expiry = schedule_decline(&room, from_uid, &self.context);
        state.push_request(request.clone(), expiry);

        info!("{} requested to join {}", from_uid, room_name);
        state.publish(&RoomEvent::Request {
            user_id: request.user_id,
            name: request.name,
        });

        Ok(())
    }

    /// Lets a requester in, returning a subscriber token for `channel` or the room.
    /// Accepting someone who is no longer pending changes nothing but still returns a token.
    pub fn accept(
        &self,
        room_name: &str,
        requester_uid: &str,
        channel: Option<&str>,
        host_uid: Option<&str>,
    ) -> CollabResult<CapabilityToken> {
        let requester_uid = required(requester_uid, "requesterUid")?;
        let room = self.context.room(room_name)?;
        let mut state = room.lock();

        self.check_allowed(&state, requester_uid, host_uid)?;

        let channel = channel
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(room.name());

        let token = self.context.issuer.issue(
            channel,
            requester_uid,
            Role::Subscriber,
            self.context.config.guest_token_ttl_secs,
        )?;

        if state.take_request(requester_uid).is_some() {
            state.participants.insert(requester_uid.to_string());

            info!("{} accepted into {}", requester_uid, room_name);
            state.publish(&RoomEvent::Accepted {
                user_id: requester_uid.to_string(),
            });
        }

        Ok(token)
    }

    /// Takes back a pending request. Returns false if there was none.
    pub fn withdraw(&self, room_name: &str, uid: &str) -> CollabResult<bool> {
        let uid = required(uid, "uid")?;
        let room = self.context.room(room_name)?;
        let mut state = room.lock();

        if state.take_request(uid).is_none() {
            return Ok(false);
        }

        info!("{} withdrew their request to join {}", uid, room_name);
        state.publish(&RoomEvent::RequestWithdrawn {
            user_id: uid.to_string(),
        });

        Ok(true)
    }

    /// Participants and pending requests, for clients without a push connection
    pub fn snapshot(&self, room_name: &str) -> CollabResult<RoomSnapshot> {
        Ok(self.context.room(room_name)?.snapshot())
    }

    fn check_allowed(
        &self,
        state: &RoomState,
        uid: &str,
        host_uid: Option<&str>,
    ) -> CollabResult<()> {
        let host_uid = host_uid
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(state.host_uid.as_str());

        if self.context.blocks.is_blocked_between(uid, host_uid) {
            return Err(CollabError::Forbidden(format!(
                "{uid} and {host_uid} have blocked each other"
            )));
        }

        if state.moderation.is_timed_out(uid, Utc::now()) {
            return Err(CollabError::Forbidden(format!("{uid} is timed out")));
        }

        Ok(())
    }
}

/// Declines the request of `uid` once it has been pending for the request TTL
fn schedule_decline(room: &Arc<Room>, uid: &str, context: &CollabContext) -> Expiry {
    let room: Weak<Room> = Arc::downgrade(room);
    let uid = uid.to_string();

    Expiry::schedule(context.config.request_ttl, move |id| {
        let Some(room) = room.upgrade() else {
            return;
        };

        let mut state = room.lock();

        if state.expire_request(&uid, id) {
            info!("Request of {} to join {} expired", uid, room.name());
            state.publish(&RoomEvent::RequestExpired { user_id: uid });
        }
    })
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use driftline_core::Config;

    use crate::{MemorySubscriber, RoomHub};

    use super::*;

    fn setup() -> (JoinNegotiation, RoomHub, Arc<MemorySubscriber>) {
        let context = CollabContext::for_tests(Config::default());
        let hub = RoomHub::new(&context);
        let subscriber = MemorySubscriber::new();

        hub.open_room("beach-cam", "host").unwrap();
        hub.subscribe("beach-cam", subscriber.clone()).unwrap();

        (JoinNegotiation::new(&context), hub, subscriber)
    }

    #[tokio::test]
    async fn test_request_then_accept() {
        let (negotiation, _, subscriber) = setup();

        negotiation
            .request("beach-cam", "v1", "Viewer", None)
            .unwrap();

        let snapshot = negotiation.snapshot("beach-cam").unwrap();
        assert_eq!(snapshot.requests.len(), 1);

        let token = negotiation
            .accept("beach-cam", "v1", None, None)
            .unwrap();

        let snapshot = negotiation.snapshot("beach-cam").unwrap();
        assert!(snapshot.requests.is_empty());
        assert_eq!(snapshot.participants, vec!["host", "v1"]);

        assert_eq!(token.grant.role, Role::Subscriber);
        assert_eq!(token.grant.room_name, "beach-cam");
        assert_eq!(subscriber.event_types(), vec!["hello", "request", "accepted"]);
    }

    #[tokio::test]
    async fn test_duplicate_request_collapses() {
        let (negotiation, _, subscriber) = setup();

        negotiation.request("beach-cam", "v1", "Viewer", None).unwrap();
        negotiation.request("beach-cam", "v1", "Viewer", None).unwrap();

        assert_eq!(negotiation.snapshot("beach-cam").unwrap().requests.len(), 1);
        assert_eq!(subscriber.event_types(), vec!["hello", "request"]);
    }

    #[tokio::test]
    async fn test_accept_after_withdraw_still_returns_token() {
        let (negotiation, _, subscriber) = setup();

        negotiation.request("beach-cam", "v1", "Viewer", None).unwrap();
        assert!(negotiation.withdraw("beach-cam", "v1").unwrap());

        let token = negotiation
            .accept("beach-cam", "v1", Some("other-channel"), None)
            .unwrap();

        assert_eq!(token.grant.room_name, "other-channel");
        assert!(!negotiation
            .snapshot("beach-cam")
            .unwrap()
            .participants
            .contains(&"v1".to_string()));
        assert_eq!(
            subscriber.event_types(),
            vec!["hello", "request", "request_withdrawn"]
        );
    }

    #[tokio::test]
    async fn test_blocked_pair_is_forbidden() {
        let (negotiation, _, _) = setup();
        negotiation.context.blocks.block("host", "v1");

        assert!(matches!(
            negotiation.request("beach-cam", "v1", "Viewer", None),
            Err(CollabError::Forbidden(_))
        ));
        assert!(matches!(
            negotiation.accept("beach-cam", "v1", None, None),
            Err(CollabError::Forbidden(_))
        ));
        assert!(negotiation.snapshot("beach-cam").unwrap().requests.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_room() {
        let (negotiation, _, _) = setup();

        assert!(matches!(
            negotiation.request("nowhere", "v1", "Viewer", None),
            Err(CollabError::NotFound { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_request_expires() {
        let (negotiation, _, subscriber) = setup();

        negotiation.request("beach-cam", "v1", "Viewer", None).unwrap();

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert_eq!(negotiation.snapshot("beach-cam").unwrap().requests.len(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(negotiation.snapshot("beach-cam").unwrap().requests.is_empty());
        assert_eq!(
            subscriber.event_types(),
            vec!["hello", "request", "request_expired"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_request_does_not_expire() {
        let (negotiation, _, subscriber) = setup();

        negotiation.request("beach-cam", "v1", "Viewer", None).unwrap();
        negotiation.accept("beach-cam", "v1", None, None).unwrap();

        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(subscriber.event_types(), vec!["hello", "request", "accepted"]);
    }
}
