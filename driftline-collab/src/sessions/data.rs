use chrono::{DateTime, Utc};
use driftline_core::CapabilityToken;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Live,
    Ended,
}

/// One live broadcast. Timestamps serialize as unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    /// The RTC channel, which is also the name of the room
    pub room_name: String,
    pub host_id: String,
    pub host_display_name: String,
    pub host_photo_ref: Option<String>,
    pub title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    /// Set if and only if the session has ended
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub viewer_count: u64,
}

impl Session {
    pub fn is_live(&self) -> bool {
        self.status == SessionStatus::Live
    }

    /// Moves the session into its terminal state. Returns false if it already was there.
    pub fn end(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_live() {
            return false;
        }

        self.status = SessionStatus::Ended;
        self.ended_at = Some(now);
        self.updated_at = now;

        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub host_id: String,
    pub host_display_name: String,
    pub host_photo_ref: Option<String>,
    pub title: String,
    /// Used as the room name when given, otherwise one is derived from the session id
    pub room_name_hint: Option<String>,
}

/// A freshly started session and the host's publisher token
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session: Session,
    pub token: CapabilityToken,
}

/// Links a host can hand out to invite viewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLink {
    pub share_link: String,
    pub web_link: String,
    pub message: String,
}
