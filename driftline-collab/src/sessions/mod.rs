mod data;

pub use data::*;

use chrono::Utc;
use driftline_core::{next_time_id, Role};
use log::{info, warn};

use crate::{
    error::required, spawn_best_effort, CollabContext, CollabError, CollabResult, LiveFeedEvent,
    RoomEvent, RoomHub,
};

/// The authoritative record of every session in this process
pub struct SessionRegistry {
    context: CollabContext,
    hub: RoomHub,
}

impl SessionRegistry {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
            hub: RoomHub::new(context),
        }
    }

    /// Starts a session, opening its room and issuing the host a publisher token
    pub fn start_session(&self, new_session: NewSession) -> CollabResult<StartedSession> {
        let host_id = required(&new_session.host_id, "hostId")?;

        let id = next_time_id();
        let session_id = id.to_string();
        let room_name = new_session
            .room_name_hint
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| h.to_string())
            .unwrap_or_else(|| format!("Drift-{}", id));

        let token = self.context.issuer.issue(
            &room_name,
            host_id,
            Role::Publisher,
            self.context.config.host_token_ttl_secs,
        )?;

        self.hub.open_room(&room_name, host_id)?;

        let now = Utc::now();
        let session = Session {
            session_id: session_id.clone(),
            room_name,
            host_id: host_id.to_string(),
            host_display_name: new_session.host_display_name.trim().to_string(),
            host_photo_ref: new_session.host_photo_ref,
            title: new_session.title.trim().to_string(),
            started_at: now,
            updated_at: now,
            ended_at: None,
            status: SessionStatus::Live,
            viewer_count: 0,
        };

        self.context
            .sessions
            .insert(session_id.clone(), session.clone());

        info!(
            "Session {} started by {} in room {}",
            session_id, session.host_id, session.room_name
        );

        self.mirror(session.clone());
        self.publish_live_feed();

        Ok(StartedSession { session, token })
    }

    /// Ends a session. Ending it again returns the same terminal record.
    ///
    /// Sessions this process doesn't know about are looked up in the mirror.
    pub async fn end_session(&self, session_id: &str) -> CollabResult<Session> {
        let session_id = required(session_id, "sessionId")?;
        let now = Utc::now();

        let ended = match self.context.sessions.get_mut(session_id) {
            Some(mut session) => {
                if !session.end(now) {
                    return Ok(session.clone());
                }

                Some(session.clone())
            }
            None => None,
        };

        let Some(session) = ended else {
            return self.end_mirrored(session_id, now).await;
        };

        info!("Session {} ended", session.session_id);

        self.hub.close_room(
            &session.room_name,
            RoomEvent::SessionEnded {
                session_id: session.session_id.clone(),
                ended_at: now.timestamp_millis(),
            },
        );

        self.hub
            .schedule_teardown(&session.room_name, self.context.config.end_grace);
        self.schedule_purge(&session.session_id);

        self.mirror(session.clone());
        self.publish_live_feed();

        Ok(session)
    }

    async fn end_mirrored(
        &self,
        session_id: &str,
        now: chrono::DateTime<Utc>,
    ) -> CollabResult<Session> {
        let mirrored = match self.context.mirror.session_by_id(session_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Mirror lookup of session {} failed: {}", session_id, e);
                None
            }
        };

        let mut session = mirrored.ok_or_else(|| CollabError::not_found("Session", session_id))?;

        if session.end(now) {
            info!("Mirrored session {} ended", session_id);

            if let Err(e) = self.context.mirror.save_session(&session).await {
                warn!("Mirror write of session {} failed: {}", session_id, e);
            }
        }

        Ok(session)
    }

    /// Removes the ended session after the grace window
    fn schedule_purge(&self, session_id: &str) {
        let session_id = session_id.to_string();
        let grace = self.context.config.end_grace;
        let registry = SessionRegistry::new(&self.context);

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            let purged = registry
                .context
                .sessions
                .remove_if(&session_id, |_, s| !s.is_live());

            if purged.is_some() {
                info!("Session {} purged", session_id);
                registry.publish_live_feed();
            }
        });
    }

    /// Live sessions, newest first, falling back to the mirror when none are in process
    pub async fn list_recent(&self, limit: usize) -> Vec<Session> {
        let mut sessions = self.live();
        sessions.truncate(limit);

        if !sessions.is_empty() || limit == 0 {
            return sessions;
        }

        match self.context.mirror.recent_live(limit).await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("Mirror read of recent sessions failed: {}", e);
                vec![]
            }
        }
    }

    /// Every live session in this process, newest first
    pub fn live(&self) -> Vec<Session> {
        let mut sessions: Vec<_> = self
            .context
            .sessions
            .iter()
            .filter(|s| s.is_live())
            .map(|s| s.clone())
            .collect();

        sessions.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.session_id.cmp(&a.session_id))
        });
        sessions
    }

    /// Looks up a session, live or recently ended, falling back to the mirror
    pub async fn session(&self, session_id: &str) -> CollabResult<Session> {
        if let Some(session) = self.context.sessions.get(session_id) {
            return Ok(session.clone());
        }

        match self.context.mirror.session_by_id(session_id).await {
            Ok(Some(session)) => Ok(session),
            Ok(None) => Err(CollabError::not_found("Session", session_id)),
            Err(e) => {
                warn!("Mirror lookup of session {} failed: {}", session_id, e);
                Err(CollabError::not_found("Session", session_id))
            }
        }
    }

    /// Applies a join or leave to the viewer count, which never drops below zero.
    /// The new count is broadcast to the room.
    pub fn record_viewer_delta(&self, session_id: &str, delta: i64) -> CollabResult<u64> {
        let mut session = self
            .context
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| CollabError::not_found("Session", session_id))?;

        if !session.is_live() {
            return Err(CollabError::Forbidden(format!(
                "Session {session_id} has ended"
            )));
        }

        let count = session.viewer_count.saturating_add_signed(delta);
        session.viewer_count = count;
        session.updated_at = Utc::now();

        // The session entry stays locked until the count is broadcast,
        // so the room sees counts in the order they were recorded
        if let Ok(room) = self.context.room(&session.room_name) {
            let mut state = room.lock();
            state.viewer_count = count;
            state.publish(&RoomEvent::ViewerCount { count });
        }

        Ok(count)
    }

    pub fn viewer_count(&self, session_id: &str) -> CollabResult<u64> {
        self.context
            .sessions
            .get(session_id)
            .map(|s| s.viewer_count)
            .ok_or_else(|| CollabError::not_found("Session", session_id))
    }

    /// Links that invite viewers into a session
    pub async fn share_link(&self, session_id: &str) -> CollabResult<ShareLink> {
        let session = self.session(session_id).await?;

        Ok(ShareLink {
            share_link: format!(
                "drift://join/{}?channel={}",
                session.session_id, session.room_name
            ),
            web_link: format!("https://drift.app/live/{}", session.session_id),
            message: format!(
                "Join {} live on Drift: {}",
                session.host_display_name, session.title
            ),
        })
    }

    fn mirror(&self, session: Session) {
        let mirror = self.context.mirror.clone();

        spawn_best_effort("Mirror write of session", async move {
            mirror.save_session(&session).await
        });
    }

    fn publish_live_feed(&self) {
        self.hub
            .publish_live_feed(LiveFeedEvent::LiveUpdate { items: self.live() });
    }
}
