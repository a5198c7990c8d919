use serde::{Deserialize, Serialize};

use crate::Session;

/// A user waiting for the host to let them in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub user_id: String,
    pub name: String,
}

/// The full state of a room, sent to every new subscriber
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_name: String,
    pub host_uid: String,
    pub participants: Vec<String>,
    pub requests: Vec<PendingRequest>,
    pub viewer_count: u64,
    pub pinned_user_id: Option<String>,
    pub chat_enabled: bool,
}

/// Events pushed to every subscriber of a room.
/// Timestamps are unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum RoomEvent {
    /// Always the first message of a subscription
    Hello(RoomSnapshot),
    /// A viewer asked to join the broadcast
    Request { user_id: String, name: String },
    /// A pending request was taken back by the requester
    RequestWithdrawn { user_id: String },
    /// A pending request was not answered in time
    RequestExpired { user_id: String },
    /// The host let a requester in
    Accepted { user_id: String },
    UserMuted { user_id: String, until: i64 },
    UserUnmuted { user_id: String },
    UserTimeout {
        user_id: String,
        until: i64,
        duration_mins: u64,
    },
    TimeoutExpired { user_id: String },
    UserKicked {
        user_id: String,
        kicker_id: Option<String>,
    },
    UserPinned { user_id: String },
    UserUnpinned { user_id: Option<String> },
    CohostInvited { user_id: String },
    CohostRemoved { user_id: String },
    HostTransferred {
        new_host_id: String,
        new_host_name: Option<String>,
    },
    ModeratorAdded { user_id: String },
    ModeratorRemoved { user_id: String },
    ChatDisabled,
    ChatEnabled,
    ViewerCount { count: u64 },
    RecordingStarted { recording_id: String },
    RecordingStopped {
        recording_id: String,
        duration_ms: i64,
    },
    /// The session or drift behind this room is over
    SessionEnded { session_id: String, ended_at: i64 },
}

/// Events pushed to subscribers of the global live feed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveFeedEvent {
    Hello { items: Vec<Session> },
    LiveUpdate { items: Vec<Session> },
}

impl RoomEvent {
    /// The `type` discriminator, used for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hello(_) => "hello",
            Self::Request { .. } => "request",
            Self::RequestWithdrawn { .. } => "request_withdrawn",
            Self::RequestExpired { .. } => "request_expired",
            Self::Accepted { .. } => "accepted",
            Self::UserMuted { .. } => "user_muted",
            Self::UserUnmuted { .. } => "user_unmuted",
            Self::UserTimeout { .. } => "user_timeout",
            Self::TimeoutExpired { .. } => "timeout_expired",
            Self::UserKicked { .. } => "user_kicked",
            Self::UserPinned { .. } => "user_pinned",
            Self::UserUnpinned { .. } => "user_unpinned",
            Self::CohostInvited { .. } => "cohost_invited",
            Self::CohostRemoved { .. } => "cohost_removed",
            Self::HostTransferred { .. } => "host_transferred",
            Self::ModeratorAdded { .. } => "moderator_added",
            Self::ModeratorRemoved { .. } => "moderator_removed",
            Self::ChatDisabled => "chat_disabled",
            Self::ChatEnabled => "chat_enabled",
            Self::ViewerCount { .. } => "viewer_count",
            Self::RecordingStarted { .. } => "recording_started",
            Self::RecordingStopped { .. } => "recording_stopped",
            Self::SessionEnded { .. } => "session_ended",
        }
    }
}
