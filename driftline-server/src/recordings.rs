use axum::{
    extract::{Path, Query},
    routing::{get, post},
    Json,
};
use driftline_collab::CollabError;

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{RecordingsQuery, StartRecordingSchema, StopRecordingSchema, ValidatedJson},
    serialized::{ErrorBody, Recording, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/recordings",
    tag = "recordings",
    request_body = StartRecordingSchema,
    responses(
        (status = 200, body = Recording),
        (status = 409, description = "The channel is already being recorded", body = ErrorBody)
    )
)]
async fn start_recording(
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<StartRecordingSchema>,
) -> ServerResult<Json<Recording>> {
    let recording = context
        .collab
        .recordings
        .start_recording(&body.channel, &body.uid)?;

    Ok(Json(recording.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/recordings/stop",
    tag = "recordings",
    request_body = StopRecordingSchema,
    responses(
        (status = 200, body = Recording),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
async fn stop_recording(
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<StopRecordingSchema>,
) -> ServerResult<Json<Recording>> {
    let id_or_channel = body
        .recording_id
        .or(body.channel)
        .ok_or_else(|| CollabError::invalid("Missing recordingId or channel"))?;

    let recording = context.collab.recordings.stop_recording(&id_or_channel)?;

    Ok(Json(recording.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/recordings",
    tag = "recordings",
    params(RecordingsQuery),
    responses(
        (status = 200, description = "Recordings, newest first", body = Vec<Recording>)
    )
)]
async fn recordings(
    context: ServerContext,
    Query(query): Query<RecordingsQuery>,
) -> Json<Vec<Recording>> {
    let recordings = context
        .collab
        .recordings
        .recordings(query.channel.as_deref());

    Json(recordings.to_serialized())
}

#[utoipa::path(
    get,
    path = "/v1/recordings/{id}",
    tag = "recordings",
    responses(
        (status = 200, body = Recording),
        (status = 404, body = ErrorBody)
    )
)]
async fn recording(
    context: ServerContext,
    Path(recording_id): Path<String>,
) -> ServerResult<Json<Recording>> {
    let recording = context.collab.recordings.recording(&recording_id)?;

    Ok(Json(recording.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(recordings).post(start_recording))
        .route("/stop", post(stop_recording))
        .route("/:id", get(recording))
}
