//! All request bodies and query parameters accepted by endpoints are defined here

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::errors::ServerError;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewSessionSchema {
    #[validate(length(min = 1, max = 128))]
    pub host_id: String,
    #[validate(length(max = 128))]
    #[serde(default)]
    pub host_display_name: String,
    #[validate(length(max = 512))]
    pub host_photo_ref: Option<String>,
    #[validate(length(max = 256))]
    #[serde(default)]
    pub title: String,
    /// The name of the room, derived from the session id if left out
    #[validate(length(min = 1, max = 128))]
    pub room_name: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ViewerDeltaSchema {
    /// Positive when viewers join, negative when they leave
    #[validate(range(min = -10000, max = 10000))]
    pub delta: i64,
}

#[derive(Debug, IntoParams, Deserialize)]
#[into_params(parameter_in = Query)]
pub struct RecentQuery {
    /// How many sessions to return
    pub limit: Option<usize>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinRequestSchema {
    #[validate(length(min = 1, max = 128))]
    pub from_uid: String,
    #[validate(length(max = 128))]
    #[serde(default)]
    pub from_name: String,
    /// Checked for blocks instead of the room's host when given
    #[validate(length(min = 1, max = 128))]
    pub host_uid: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AcceptSchema {
    #[validate(length(min = 1, max = 128))]
    pub requester_uid: String,
    /// The channel the token is for, the room if left out
    #[validate(length(min = 1, max = 128))]
    pub channel: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub host_uid: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserSchema {
    #[validate(length(min = 1, max = 128))]
    pub uid: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BlockSchema {
    #[validate(length(min = 1, max = 128))]
    pub uid: String,
    #[validate(length(min = 1, max = 128))]
    pub target_uid: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetSchema {
    #[validate(length(min = 1, max = 128))]
    pub target_uid: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MuteSchema {
    #[validate(length(min = 1, max = 128))]
    pub target_uid: String,
    /// Defaults to five minutes
    #[validate(range(min = 1))]
    pub duration_sec: Option<u64>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TimeoutSchema {
    #[validate(length(min = 1, max = 128))]
    pub target_uid: String,
    /// Defaults to five minutes
    #[validate(range(min = 1))]
    pub duration_min: Option<u64>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KickSchema {
    #[validate(length(min = 1, max = 128))]
    pub target_uid: String,
    #[validate(length(min = 1, max = 128))]
    pub kicker_uid: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransferHostSchema {
    #[validate(length(min = 1, max = 128))]
    pub new_host_uid: String,
    #[validate(length(max = 128))]
    pub new_host_name: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChatSchema {
    pub enabled: bool,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewDriftSchema {
    #[validate(length(max = 256))]
    #[serde(default)]
    pub title: String,
    #[validate(length(min = 1, max = 64))]
    pub ticket_number: String,
    #[serde(rename = "priceUSD")]
    pub price_usd: f64,
    #[validate(range(min = 1, max = 1440))]
    pub duration_mins: u64,
    #[validate(length(min = 1, max = 128))]
    pub host_uid: String,
    #[validate(length(max = 128))]
    #[serde(default)]
    pub host_name: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StartRecordingSchema {
    #[validate(length(min = 1, max = 128))]
    pub channel: String,
    #[validate(length(min = 1, max = 128))]
    pub uid: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StopRecordingSchema {
    /// Either the id of the recording, or the channel being recorded
    #[validate(length(min = 1, max = 128))]
    pub recording_id: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub channel: Option<String>,
}

#[derive(Debug, IntoParams, Deserialize)]
#[into_params(parameter_in = Query)]
pub struct RecordingsQuery {
    pub channel: Option<String>,
}

#[derive(Debug, IntoParams, Deserialize)]
#[into_params(parameter_in = Query)]
pub struct TokenQuery {
    pub channel: String,
    pub uid: Option<String>,
    /// `audience` for a subscriber token, anything else for a publisher token
    pub role: Option<String>,
    /// Lifetime in seconds, clamped to the allowed range
    pub expire: Option<u64>,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|e| ServerError::InvalidBody(e.body_text()))?;

        extracted_json
            .0
            .validate()
            .map_err(|e| ServerError::InvalidBody(e.to_string()))?;

        Ok(Self(extracted_json.0))
    }
}
