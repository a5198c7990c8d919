use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;
use utoipauto::utoipauto;

#[utoipauto(paths = "./driftline-server/src")]
#[derive(OpenApi)]
#[openapi(
    info(
        description = "driftline-server exposes endpoints to coordinate live sessions, their rooms and chartered drifts"
    ),
    tags(
        (name = "sessions", description = "Free live sessions"),
        (name = "rooms", description = "Joining a room through the host"),
        (name = "moderation", description = "Blocks and in-room moderation"),
        (name = "drifts", description = "Ticketed drifts and their ledgers"),
        (name = "recordings", description = "Recording bookkeeping"),
        (name = "rtc", description = "Capability tokens for the RTC provider"),
        (name = "events", description = "Server sent event streams")
    )
)]
pub struct ApiDoc;

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
