//! All schemas that are exposed from endpoints are defined here
//! along with the ToSerialized impls. Timestamps are unix milliseconds.

use std::collections::BTreeMap;

use driftline_collab::{
    CharteredDrift, DriftEarnings as CollabDriftEarnings, EndedDrift as CollabEndedDrift,
    Earnings as CollabEarnings, HostEarnings as CollabHostEarnings,
    PendingRequest as CollabPendingRequest, Promo as CollabPromo,
    PurchasedPass as CollabPurchasedPass, Recording as CollabRecording, RecordingStatus,
    Restrictions as CollabRestrictions, RoomSnapshot as CollabRoomSnapshot,
    Session as CollabSession, SessionStatus, ShareLink as CollabShareLink,
    StartedDrift as CollabStartedDrift, StartedSession as CollabStartedSession,
};
use driftline_core::{CapabilityToken, Role};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// One of `invalid_argument`, `not_found`, `forbidden`, `conflict`, `unavailable`
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// The opaque token handed to the RTC provider
    token: String,
    app_id: String,
    channel: String,
    uid: String,
    /// Either `publisher` or `subscriber`
    role: String,
    /// Unix seconds
    issued_at: i64,
    /// Unix seconds
    expires_at: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    session_id: String,
    room_name: String,
    host_id: String,
    host_display_name: String,
    host_photo_ref: Option<String>,
    title: String,
    started_at: i64,
    updated_at: i64,
    ended_at: Option<i64>,
    /// Either `live` or `ended`
    status: String,
    viewer_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    session: Session,
    token: Token,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewerCount {
    pub viewer_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShareLink {
    share_link: String,
    web_link: String,
    message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    user_id: String,
    name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    room_name: String,
    host_uid: String,
    participants: Vec<String>,
    requests: Vec<PendingRequest>,
    viewer_count: u64,
    pinned_user_id: Option<String>,
    chat_enabled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Restrictions {
    moderators: Vec<String>,
    co_hosts: Vec<String>,
    pinned_user_id: Option<String>,
    muted_until: BTreeMap<String, i64>,
    timed_out_until: BTreeMap<String, i64>,
}

/// The result of a state change that may or may not have changed anything
#[derive(Debug, Serialize, ToSchema)]
pub struct Changed {
    pub changed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Blocked {
    pub blocked: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Until {
    /// When the restriction runs out
    pub until: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pinned {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Earnings {
    #[serde(rename = "totalUSD")]
    total_usd: f64,
    tickets_sold: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Drift {
    id: String,
    title: String,
    ticket_number: String,
    #[serde(rename = "priceUSD")]
    price_usd: f64,
    duration_mins: u64,
    host_uid: String,
    host_name: String,
    channel: String,
    status: String,
    started_at: i64,
    ends_at: i64,
    ended_at: Option<i64>,
    chat_enabled: bool,
    pass_holders: Vec<String>,
    earnings: Earnings,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartedDrift {
    drift: Drift,
    channel: String,
    host_token: Token,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedPass {
    drift_id: String,
    channel: String,
    token: Token,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EndedDrift {
    drift: Drift,
    earnings: Earnings,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriftEarnings {
    drift_id: String,
    title: String,
    status: String,
    earnings: Earnings,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostEarnings {
    host_uid: String,
    drifts: Vec<DriftEarnings>,
    #[serde(rename = "totalUSD")]
    total_usd: f64,
    tickets_sold: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Promo {
    share_url: String,
    web_url: String,
    message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    recording_id: String,
    channel: String,
    uid: String,
    started_at: i64,
    stopped_at: Option<i64>,
    duration_ms: Option<i64>,
    /// Either `recording` or `stopped`
    status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Health {
    pub ok: bool,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

fn status(status: SessionStatus) -> String {
    match status {
        SessionStatus::Live => "live",
        SessionStatus::Ended => "ended",
    }
    .to_string()
}

fn dollars(cents: u64) -> f64 {
    cents as f64 / 100.0
}

impl ToSerialized<Token> for CapabilityToken {
    fn to_serialized(&self) -> Token {
        let role = match self.grant.role {
            Role::Publisher => "publisher",
            Role::Subscriber => "subscriber",
        };

        Token {
            token: self.token.clone(),
            app_id: self.grant.app_id.clone(),
            channel: self.grant.room_name.clone(),
            uid: self.grant.subject_uid.clone(),
            role: role.to_string(),
            issued_at: self.grant.issued_at,
            expires_at: self.grant.expires_at,
        }
    }
}

impl ToSerialized<Session> for CollabSession {
    fn to_serialized(&self) -> Session {
        Session {
            session_id: self.session_id.clone(),
            room_name: self.room_name.clone(),
            host_id: self.host_id.clone(),
            host_display_name: self.host_display_name.clone(),
            host_photo_ref: self.host_photo_ref.clone(),
            title: self.title.clone(),
            started_at: self.started_at.timestamp_millis(),
            updated_at: self.updated_at.timestamp_millis(),
            ended_at: self.ended_at.map(|t| t.timestamp_millis()),
            status: status(self.status),
            viewer_count: self.viewer_count,
        }
    }
}

impl ToSerialized<StartedSession> for CollabStartedSession {
    fn to_serialized(&self) -> StartedSession {
        StartedSession {
            session: self.session.to_serialized(),
            token: self.token.to_serialized(),
        }
    }
}

impl ToSerialized<ShareLink> for CollabShareLink {
    fn to_serialized(&self) -> ShareLink {
        ShareLink {
            share_link: self.share_link.clone(),
            web_link: self.web_link.clone(),
            message: self.message.clone(),
        }
    }
}

impl ToSerialized<PendingRequest> for CollabPendingRequest {
    fn to_serialized(&self) -> PendingRequest {
        PendingRequest {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
        }
    }
}

impl ToSerialized<RoomSnapshot> for CollabRoomSnapshot {
    fn to_serialized(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_name: self.room_name.clone(),
            host_uid: self.host_uid.clone(),
            participants: self.participants.clone(),
            requests: self.requests.to_serialized(),
            viewer_count: self.viewer_count,
            pinned_user_id: self.pinned_user_id.clone(),
            chat_enabled: self.chat_enabled,
        }
    }
}

impl ToSerialized<Restrictions> for CollabRestrictions {
    fn to_serialized(&self) -> Restrictions {
        Restrictions {
            moderators: self.moderators.clone(),
            co_hosts: self.co_hosts.clone(),
            pinned_user_id: self.pinned_user_id.clone(),
            muted_until: self.muted_until.clone(),
            timed_out_until: self.timed_out_until.clone(),
        }
    }
}

impl ToSerialized<Earnings> for CollabEarnings {
    fn to_serialized(&self) -> Earnings {
        Earnings {
            total_usd: dollars(self.total_cents),
            tickets_sold: self.tickets_sold,
        }
    }
}

impl ToSerialized<Drift> for CharteredDrift {
    fn to_serialized(&self) -> Drift {
        Drift {
            id: self.id.clone(),
            title: self.title.clone(),
            ticket_number: self.ticket_number.clone(),
            price_usd: dollars(self.price_cents),
            duration_mins: self.duration_mins,
            host_uid: self.host_uid.clone(),
            host_name: self.host_name.clone(),
            channel: self.channel.clone(),
            status: status(self.status),
            started_at: self.started_at.timestamp_millis(),
            ends_at: self.ends_at.timestamp_millis(),
            ended_at: self.ended_at.map(|t| t.timestamp_millis()),
            chat_enabled: self.chat_enabled,
            pass_holders: self.pass_holders.iter().cloned().collect(),
            earnings: self.earnings.to_serialized(),
        }
    }
}

impl ToSerialized<StartedDrift> for CollabStartedDrift {
    fn to_serialized(&self) -> StartedDrift {
        StartedDrift {
            drift: self.drift.to_serialized(),
            channel: self.channel.clone(),
            host_token: self.host_token.to_serialized(),
        }
    }
}

impl ToSerialized<PurchasedPass> for CollabPurchasedPass {
    fn to_serialized(&self) -> PurchasedPass {
        PurchasedPass {
            drift_id: self.drift_id.clone(),
            channel: self.channel.clone(),
            token: self.token.to_serialized(),
        }
    }
}

impl ToSerialized<EndedDrift> for CollabEndedDrift {
    fn to_serialized(&self) -> EndedDrift {
        EndedDrift {
            drift: self.drift.to_serialized(),
            earnings: self.earnings.to_serialized(),
        }
    }
}

impl ToSerialized<DriftEarnings> for CollabDriftEarnings {
    fn to_serialized(&self) -> DriftEarnings {
        DriftEarnings {
            drift_id: self.drift_id.clone(),
            title: self.title.clone(),
            status: status(self.status),
            earnings: self.earnings.to_serialized(),
        }
    }
}

impl ToSerialized<HostEarnings> for CollabHostEarnings {
    fn to_serialized(&self) -> HostEarnings {
        HostEarnings {
            host_uid: self.host_uid.clone(),
            drifts: self.drifts.to_serialized(),
            total_usd: dollars(self.total_cents),
            tickets_sold: self.tickets_sold,
        }
    }
}

impl ToSerialized<Promo> for CollabPromo {
    fn to_serialized(&self) -> Promo {
        Promo {
            share_url: self.share_url.clone(),
            web_url: self.web_url.clone(),
            message: self.message.clone(),
        }
    }
}

impl ToSerialized<Recording> for CollabRecording {
    fn to_serialized(&self) -> Recording {
        let status = match self.status {
            RecordingStatus::Recording => "recording",
            RecordingStatus::Stopped => "stopped",
        };

        Recording {
            recording_id: self.recording_id.clone(),
            channel: self.channel.clone(),
            uid: self.uid.clone(),
            started_at: self.started_at.timestamp_millis(),
            stopped_at: self.stopped_at.map(|t| t.timestamp_millis()),
            duration_ms: self.duration_ms,
            status: status.to_string(),
        }
    }
}
