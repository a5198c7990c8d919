mod blocks;
mod state;

use std::sync::{Arc, Weak};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use driftline_core::{CapabilityToken, Role};
use log::info;

pub use blocks::*;
pub use state::*;

use crate::{
    error::required, events::RoomEvent, expiry::Expiry, spawn_best_effort, CollabContext,
    CollabError, CollabResult, Notification, Room,
};

/// Mutes and timeouts longer than a year are cut to a year
const MAX_RESTRICTION_SECS: u64 = 60 * 60 * 24 * 365;

/// Applies restrictions to users. Every room-scoped action is broadcast to the room.
///
/// Moderator status is recorded here but not enforced, callers authorize actions themselves.
pub struct ModerationEngine {
    context: CollabContext,
}

impl ModerationEngine {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub fn block(&self, uid: &str, target_uid: &str) -> CollabResult<()> {
        let (uid, target_uid) = pair(uid, target_uid)?;

        if self.context.blocks.block(uid, target_uid) {
            info!("{} blocked {}", uid, target_uid);
        }

        Ok(())
    }

    pub fn unblock(&self, uid: &str, target_uid: &str) -> CollabResult<()> {
        let (uid, target_uid) = pair(uid, target_uid)?;

        if self.context.blocks.unblock(uid, target_uid) {
            info!("{} unblocked {}", uid, target_uid);
        }

        Ok(())
    }

    /// The users `uid` has blocked
    pub fn blocked_by(&self, uid: &str) -> Vec<String> {
        self.context.blocks.blocked_by(uid)
    }

    /// Returns true if either user has blocked the other
    pub fn is_blocked(&self, uid: &str, other_uid: &str) -> bool {
        self.context.blocks.is_blocked_between(uid, other_uid)
    }

    /// Mutes a user, replacing any earlier mute. Returns when the mute runs out.
    pub fn mute(
        &self,
        room_name: &str,
        target_uid: &str,
        duration_secs: Option<u64>,
    ) -> CollabResult<DateTime<Utc>> {
        let target_uid = required(target_uid, "targetUid")?;
        let duration_secs =
            positive(duration_secs, self.context.config.default_mute_secs)?.min(MAX_RESTRICTION_SECS);
        let room = self.context.room(room_name)?;

        let until = Utc::now() + seconds(duration_secs);
        let expiry = schedule_lift(&room, target_uid, duration_secs, Lift::Mute);

        let mut state = room.lock();
        state
            .moderation
            .set_mute(target_uid, Restriction::new(until, expiry));

        info!("{} muted in {} for {}s", target_uid, room_name, duration_secs);
        state.publish(&RoomEvent::UserMuted {
            user_id: target_uid.to_string(),
            until: until.timestamp_millis(),
        });

        Ok(until)
    }

    /// Lifts a mute early, cancelling its scheduled lift. Returns false if the user wasn't muted.
    pub fn unmute(&self, room_name: &str, target_uid: &str) -> CollabResult<bool> {
        let target_uid = required(target_uid, "targetUid")?;
        let room = self.context.room(room_name)?;
        let mut state = room.lock();

        if state.moderation.clear_mute(target_uid).is_none() {
            return Ok(false);
        }

        info!("{} unmuted in {}", target_uid, room_name);
        state.publish(&RoomEvent::UserUnmuted {
            user_id: target_uid.to_string(),
        });

        Ok(true)
    }

    /// Times a user out, removing them from the participants and pending requests
    /// until the timeout runs out. Returns when that happens.
    pub fn timeout(
        &self,
        room_name: &str,
        target_uid: &str,
        duration_mins: Option<u64>,
    ) -> CollabResult<DateTime<Utc>> {
        let target_uid = required(target_uid, "targetUid")?;
        let duration_mins = positive(duration_mins, self.context.config.default_timeout_mins)?;
        let room = self.context.room(room_name)?;

        let duration_secs = duration_mins.saturating_mul(60).min(MAX_RESTRICTION_SECS);
        let until = Utc::now() + seconds(duration_secs);
        let expiry = schedule_lift(&room, target_uid, duration_secs, Lift::Timeout);

        let mut state = room.lock();
        state.participants.remove(target_uid);
        state.take_request(target_uid);
        state
            .moderation
            .set_timeout(target_uid, Restriction::new(until, expiry));

        info!(
            "{} timed out in {} for {} minute(s)",
            target_uid, room_name, duration_mins
        );
        state.publish(&RoomEvent::UserTimeout {
            user_id: target_uid.to_string(),
            until: until.timestamp_millis(),
            duration_mins,
        });

        Ok(until)
    }

    /// Pins a user, replacing any earlier pin
    pub fn pin(&self, room_name: &str, target_uid: &str) -> CollabResult<()> {
        let target_uid = required(target_uid, "targetUid")?;
        let room = self.context.room(room_name)?;
        let mut state = room.lock();

        state.moderation.pinned = Some(target_uid.to_string());

        state.publish(&RoomEvent::UserPinned {
            user_id: target_uid.to_string(),
        });

        Ok(())
    }

    /// Clears the pin, returning who was pinned
    pub fn unpin(&self, room_name: &str) -> CollabResult<Option<String>> {
        let room = self.context.room(room_name)?;
        let mut state = room.lock();

        let previous = state.moderation.pinned.take();

        state.publish(&RoomEvent::UserUnpinned {
            user_id: previous.clone(),
        });

        Ok(previous)
    }

    /// Removes a user from the participants and pending requests.
    /// They may request again right away.
    pub fn kick(
        &self,
        room_name: &str,
        target_uid: &str,
        kicker_uid: Option<&str>,
    ) -> CollabResult<()> {
        let target_uid = required(target_uid, "targetUid")?;
        let room = self.context.room(room_name)?;
        let mut state = room.lock();

        state.participants.remove(target_uid);
        state.take_request(target_uid);

        info!("{} kicked from {}", target_uid, room_name);
        state.publish(&RoomEvent::UserKicked {
            user_id: target_uid.to_string(),
            kicker_id: kicker_uid.map(|k| k.to_string()),
        });

        Ok(())
    }

    /// Makes a user co-host, returning the publisher token they need.
    /// The user is also told through a push notification.
    pub fn invite_cohost(&self, room_name: &str, target_uid: &str) -> CollabResult<CapabilityToken> {
        let target_uid = required(target_uid, "targetUid")?;
        let room = self.context.room(room_name)?;

        let token = self.context.issuer.issue(
            room.name(),
            target_uid,
            Role::Publisher,
            self.context.config.cohost_token_ttl_secs,
        )?;

        let host_uid = {
            let mut state = room.lock();
            state.moderation.co_hosts.insert(target_uid.to_string());

            info!("{} invited to co-host {}", target_uid, room_name);
            state.publish(&RoomEvent::CohostInvited {
                user_id: target_uid.to_string(),
            });

            state.host_uid.clone()
        };

        let notifier = self.context.notifier.clone();
        let notification = Notification::CohostInvited {
            room_name: room.name().to_string(),
            user_id: target_uid.to_string(),
            host_uid,
        };

        spawn_best_effort("Co-host notification", async move {
            notifier.notify(notification).await
        });

        Ok(token)
    }

    /// Returns false if the user wasn't a co-host
    pub fn remove_cohost(&self, room_name: &str, target_uid: &str) -> CollabResult<bool> {
        let target_uid = required(target_uid, "targetUid")?;
        let room = self.context.room(room_name)?;
        let mut state = room.lock();

        if !state.moderation.co_hosts.remove(target_uid) {
            return Ok(false);
        }

        info!("{} is no longer co-hosting {}", target_uid, room_name);
        state.publish(&RoomEvent::CohostRemoved {
            user_id: target_uid.to_string(),
        });

        Ok(true)
    }

    /// Hands the room to a new host, returning their publisher token.
    /// The previous host's token stays valid until it expires.
    pub fn transfer_host(
        &self,
        room_name: &str,
        new_host_uid: &str,
        new_host_name: Option<&str>,
    ) -> CollabResult<CapabilityToken> {
        let new_host_uid = required(new_host_uid, "newHostUid")?;
        let room = self.context.room(room_name)?;

        let token = self.context.issuer.issue(
            room.name(),
            new_host_uid,
            Role::Publisher,
            self.context.config.cohost_token_ttl_secs,
        )?;

        let mut state = room.lock();
        state.host_uid = new_host_uid.to_string();
        state.participants.insert(new_host_uid.to_string());
        state.take_request(new_host_uid);

        info!("{} is now hosting {}", new_host_uid, room_name);
        state.publish(&RoomEvent::HostTransferred {
            new_host_id: new_host_uid.to_string(),
            new_host_name: new_host_name.map(|n| n.to_string()),
        });

        Ok(token)
    }

    pub fn make_moderator(&self, room_name: &str, target_uid: &str) -> CollabResult<bool> {
        let target_uid = required(target_uid, "targetUid")?;
        let room = self.context.room(room_name)?;
        let mut state = room.lock();

        if !state.moderation.moderators.insert(target_uid.to_string()) {
            return Ok(false);
        }

        state.publish(&RoomEvent::ModeratorAdded {
            user_id: target_uid.to_string(),
        });

        Ok(true)
    }

    pub fn remove_moderator(&self, room_name: &str, target_uid: &str) -> CollabResult<bool> {
        let target_uid = required(target_uid, "targetUid")?;
        let room = self.context.room(room_name)?;
        let mut state = room.lock();

        if !state.moderation.moderators.remove(target_uid) {
            return Ok(false);
        }

        state.publish(&RoomEvent::ModeratorRemoved {
            user_id: target_uid.to_string(),
        });

        Ok(true)
    }

    /// Turns the chat of a room on or off
    pub fn set_chat(&self, room_name: &str, enabled: bool) -> CollabResult<()> {
        self.context.room(room_name)?.lock().set_chat(enabled);
        Ok(())
    }

    pub fn moderators(&self, room_name: &str) -> CollabResult<Vec<String>> {
        let room = self.context.room(room_name)?;
        let state = room.lock();

        Ok(state.moderation.moderators.iter().cloned().collect())
    }

    pub fn co_hosts(&self, room_name: &str) -> CollabResult<Vec<String>> {
        let room = self.context.room(room_name)?;
        let state = room.lock();

        Ok(state.moderation.co_hosts.iter().cloned().collect())
    }

    /// Mutes, timeouts, pin and roles of a room
    pub fn restrictions(&self, room_name: &str) -> CollabResult<Restrictions> {
        let room = self.context.room(room_name)?;
        let state = room.lock();

        Ok(state.moderation.restrictions())
    }
}

#[derive(Debug, Clone, Copy)]
enum Lift {
    Mute,
    Timeout,
}

/// Lifts a restriction when it runs out, unless it was replaced or cleared before that
fn schedule_lift(room: &Arc<Room>, uid: &str, after_secs: u64, lift: Lift) -> Expiry {
    let room: Weak<Room> = Arc::downgrade(room);
    let uid = uid.to_string();

    Expiry::schedule(std::time::Duration::from_secs(after_secs), move |id| {
        let Some(room) = room.upgrade() else {
            return;
        };

        let mut state = room.lock();

        let event = match lift {
            Lift::Mute if state.moderation.expire_mute(&uid, id) => {
                RoomEvent::UserUnmuted { user_id: uid }
            }
            Lift::Timeout if state.moderation.expire_timeout(&uid, id) => {
                RoomEvent::TimeoutExpired { user_id: uid }
            }
            _ => return,
        };

        info!("{} in {} ran out", event.name(), room.name());
        state.publish(&event);
    })
}

fn pair<'a>(uid: &'a str, target_uid: &'a str) -> CollabResult<(&'a str, &'a str)> {
    let uid = required(uid, "uid")?;
    let target_uid = required(target_uid, "targetUid")?;

    if uid == target_uid {
        return Err(CollabError::invalid("Users cannot block themselves"));
    }

    Ok((uid, target_uid))
}

fn positive(value: Option<u64>, default: u64) -> CollabResult<u64> {
    match value.unwrap_or(default) {
        0 => Err(CollabError::invalid("Duration must be positive")),
        n => Ok(n),
    }
}

fn seconds(secs: u64) -> ChronoDuration {
    ChronoDuration::seconds(secs.min(MAX_RESTRICTION_SECS) as i64)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use driftline_core::Config;

    use crate::{JoinNegotiation, MemorySubscriber, RoomHub};

    use super::*;

    struct Setup {
        moderation: ModerationEngine,
        negotiation: JoinNegotiation,
        subscriber: Arc<MemorySubscriber>,
        room: Arc<Room>,
    }

    fn setup() -> Setup {
        let context = CollabContext::for_tests(Config::default());
        let hub = RoomHub::new(&context);
        let subscriber = MemorySubscriber::new();

        let room = hub.open_room("beach-cam", "host").unwrap();
        hub.subscribe("beach-cam", subscriber.clone()).unwrap();

        Setup {
            moderation: ModerationEngine::new(&context),
            negotiation: JoinNegotiation::new(&context),
            subscriber,
            room,
        }
    }

    fn join(setup: &Setup, uid: &str) {
        setup
            .negotiation
            .request("beach-cam", uid, "Viewer", None)
            .unwrap();
        setup
            .negotiation
            .accept("beach-cam", uid, None, None)
            .unwrap();
    }

    #[test]
    fn test_cannot_block_self() {
        let setup = setup();

        assert!(matches!(
            setup.moderation.block("a", "a"),
            Err(CollabError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_block_is_symmetric_for_negotiation() {
        let setup = setup();

        setup.moderation.block("v1", "host").unwrap();

        assert!(setup.moderation.is_blocked("host", "v1"));
        assert_eq!(setup.moderation.blocked_by("v1"), vec!["host"]);
        assert!(matches!(
            setup.negotiation.request("beach-cam", "v1", "Viewer", None),
            Err(CollabError::Forbidden(_))
        ));

        setup.moderation.unblock("v1", "host").unwrap();
        assert!(setup
            .negotiation
            .request("beach-cam", "v1", "Viewer", None)
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mute_lifts_itself() {
        let setup = setup();

        setup.moderation.mute("beach-cam", "v1", Some(30)).unwrap();
        assert!(setup.room.lock().moderation.muted_until("v1").is_some());

        tokio::time::sleep(Duration::from_secs(31)).await;

        assert!(setup.room.lock().moderation.muted_until("v1").is_none());
        assert_eq!(
            setup.subscriber.event_types(),
            vec!["hello", "user_muted", "user_unmuted"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_remute_cancels_previous_lift() {
        let setup = setup();

        setup.moderation.mute("beach-cam", "v1", Some(30)).unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        setup.moderation.mute("beach-cam", "v1", Some(30)).unwrap();

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(
            setup.room.lock().moderation.muted_until("v1").is_some(),
            "the first mute's lift must not clear the second mute"
        );

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(
            setup.subscriber.event_types(),
            vec!["hello", "user_muted", "user_muted", "user_unmuted"]
        );
    }

    #[tokio::test]
    async fn test_mute_requires_positive_duration() {
        let setup = setup();

        assert!(matches!(
            setup.moderation.mute("beach-cam", "v1", Some(0)),
            Err(CollabError::InvalidArgument(_))
        ));
        assert_eq!(setup.subscriber.event_types(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_mute_keeps_participation() {
        let setup = setup();
        join(&setup, "v1");

        setup.moderation.mute("beach-cam", "v1", None).unwrap();

        assert!(setup.room.lock().is_participant("v1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_and_forbids_until_expiry() {
        let setup = setup();
        join(&setup, "v1");

        setup.moderation.timeout("beach-cam", "v1", Some(1)).unwrap();

        assert!(!setup.room.lock().is_participant("v1"));
        assert!(matches!(
            setup.negotiation.request("beach-cam", "v1", "Viewer", None),
            Err(CollabError::Forbidden(_))
        ));

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(setup.room.lock().moderation.timed_out_until("v1").is_none());
        assert_eq!(
            setup.subscriber.event_types().last().map(|t| t.as_str()),
            Some("timeout_expired")
        );
    }

    #[tokio::test]
    async fn test_timeout_drops_pending_request() {
        let setup = setup();

        setup
            .negotiation
            .request("beach-cam", "v1", "Viewer", None)
            .unwrap();
        setup.moderation.timeout("beach-cam", "v1", None).unwrap();

        assert!(!setup.room.lock().is_pending("v1"));
    }

    #[tokio::test]
    async fn test_pin_is_single_slot() {
        let setup = setup();

        setup.moderation.pin("beach-cam", "a").unwrap();
        setup.moderation.pin("beach-cam", "b").unwrap();

        assert_eq!(setup.room.snapshot().pinned_user_id.as_deref(), Some("b"));
        assert_eq!(setup.moderation.unpin("beach-cam").unwrap().as_deref(), Some("b"));
        assert_eq!(setup.room.snapshot().pinned_user_id, None);
    }

    #[tokio::test]
    async fn test_kick_allows_immediate_rerequest() {
        let setup = setup();
        join(&setup, "v1");

        setup
            .moderation
            .kick("beach-cam", "v1", Some("host"))
            .unwrap();

        assert!(!setup.room.lock().is_participant("v1"));

        let kicked = setup
            .subscriber
            .events()
            .into_iter()
            .find(|e| e["type"] == "user_kicked")
            .unwrap();
        assert_eq!(kicked["kickerId"], "host");

        assert!(setup
            .negotiation
            .request("beach-cam", "v1", "Viewer", None)
            .is_ok());
    }

    #[tokio::test]
    async fn test_invite_cohost_issues_publisher_token() {
        let setup = setup();

        let token = setup.moderation.invite_cohost("beach-cam", "v1").unwrap();

        assert_eq!(token.grant.role, Role::Publisher);
        assert_eq!(setup.moderation.co_hosts("beach-cam").unwrap(), vec!["v1"]);

        assert!(setup.moderation.remove_cohost("beach-cam", "v1").unwrap());
        assert!(!setup.moderation.remove_cohost("beach-cam", "v1").unwrap());
        assert!(setup.moderation.co_hosts("beach-cam").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_host() {
        let setup = setup();

        let token = setup
            .moderation
            .transfer_host("beach-cam", "v2", Some("Viewer Two"))
            .unwrap();

        assert_eq!(token.grant.role, Role::Publisher);
        assert_eq!(token.grant.subject_uid, "v2");

        let snapshot = setup.room.snapshot();
        assert_eq!(snapshot.host_uid, "v2");
        assert!(snapshot.participants.contains(&"v2".to_string()));
        assert!(
            snapshot.participants.contains(&"host".to_string()),
            "the previous host is not demoted"
        );
    }

    #[tokio::test]
    async fn test_moderators_are_recorded() {
        let setup = setup();

        assert!(setup.moderation.make_moderator("beach-cam", "m1").unwrap());
        assert!(!setup.moderation.make_moderator("beach-cam", "m1").unwrap());
        assert_eq!(setup.moderation.moderators("beach-cam").unwrap(), vec!["m1"]);

        assert!(setup.moderation.remove_moderator("beach-cam", "m1").unwrap());
        assert_eq!(
            setup.subscriber.event_types(),
            vec!["hello", "moderator_added", "moderator_removed"]
        );
    }

    #[tokio::test]
    async fn test_restrictions_view() {
        let setup = setup();

        let until = setup.moderation.mute("beach-cam", "v1", Some(30)).unwrap();
        setup.moderation.pin("beach-cam", "v2").unwrap();

        let restrictions = setup.moderation.restrictions("beach-cam").unwrap();

        assert_eq!(
            restrictions.muted_until.get("v1"),
            Some(&until.timestamp_millis())
        );
        assert_eq!(restrictions.pinned_user_id.as_deref(), Some("v2"));
        assert!(restrictions.timed_out_until.is_empty());
    }

    #[tokio::test]
    async fn test_set_chat() {
        let setup = setup();

        setup.moderation.set_chat("beach-cam", false).unwrap();
        setup.moderation.set_chat("beach-cam", true).unwrap();

        assert!(setup.room.snapshot().chat_enabled);
        assert_eq!(
            setup.subscriber.event_types(),
            vec!["hello", "chat_disabled", "chat_enabled"]
        );
    }
}
