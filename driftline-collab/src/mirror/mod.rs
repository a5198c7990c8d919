use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

mod rest;
pub use rest::*;

use crate::{CharteredDrift, Session};

pub type MirrorResult<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, Error)]
pub enum MirrorError {
    /// The document store could not be reached or sent something unreadable
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    /// The document store answered with an unexpected status
    #[error("Mirror responded with status {0}")]
    Status(u16),
}

/// A durable copy of sessions and drifts, kept for clients that cannot hold
/// a push connection and for reads that miss the in-process registry.
///
/// Writes are best-effort. Nothing in the collab system waits on them while holding room state.
#[async_trait]
pub trait Mirror: Send + Sync {
    async fn save_session(&self, session: &Session) -> MirrorResult<()>;
    async fn session_by_id(&self, session_id: &str) -> MirrorResult<Option<Session>>;
    /// Live sessions, newest first
    async fn recent_live(&self, limit: usize) -> MirrorResult<Vec<Session>>;
    async fn save_drift(&self, drift: &CharteredDrift) -> MirrorResult<()>;
}

/// A mirror that lives in memory, used when no document store is configured
#[derive(Debug, Default)]
pub struct MemoryMirror {
    sessions: DashMap<String, Session>,
    drifts: DashMap<String, CharteredDrift>,
}

impl MemoryMirror {
    pub fn drift(&self, drift_id: &str) -> Option<CharteredDrift> {
        self.drifts.get(drift_id).map(|d| d.clone())
    }
}

#[async_trait]
impl Mirror for MemoryMirror {
    async fn save_session(&self, session: &Session) -> MirrorResult<()> {
        self.sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn session_by_id(&self, session_id: &str) -> MirrorResult<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn recent_live(&self, limit: usize) -> MirrorResult<Vec<Session>> {
        let mut sessions: Vec<_> = self
            .sessions
            .iter()
            .filter(|s| s.is_live())
            .map(|s| s.clone())
            .collect();

        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions.truncate(limit);

        Ok(sessions)
    }

    async fn save_drift(&self, drift: &CharteredDrift) -> MirrorResult<()> {
        self.drifts.insert(drift.id.clone(), drift.clone());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};

    use crate::SessionStatus;

    use super::*;

    fn session(id: &str, minutes_ago: i64, status: SessionStatus) -> Session {
        let started_at = Utc::now() - Duration::minutes(minutes_ago);

        Session {
            session_id: id.to_string(),
            room_name: format!("Drift-{id}"),
            host_id: "host".to_string(),
            host_display_name: "Host".to_string(),
            host_photo_ref: None,
            title: "Sunset".to_string(),
            started_at,
            updated_at: started_at,
            ended_at: (status == SessionStatus::Ended).then_some(started_at),
            status,
            viewer_count: 0,
        }
    }

    #[tokio::test]
    async fn test_recent_live_is_newest_first() {
        let mirror = MemoryMirror::default();

        for s in [
            session("old", 30, SessionStatus::Live),
            session("new", 1, SessionStatus::Live),
            session("ended", 0, SessionStatus::Ended),
            session("middle", 10, SessionStatus::Live),
        ] {
            mirror.save_session(&s).await.unwrap();
        }

        let recent: Vec<_> = mirror
            .recent_live(2)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.session_id)
            .collect();

        assert_eq!(recent, vec!["new", "middle"]);
    }
}
