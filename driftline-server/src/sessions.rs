use axum::{
    extract::{Path, Query},
    routing::{get, post},
    Json,
};
use driftline_collab::NewSession;

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewSessionSchema, RecentQuery, ValidatedJson, ViewerDeltaSchema},
    serialized::{ErrorBody, Session, ShareLink, StartedSession, ToSerialized, ViewerCount},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/sessions",
    tag = "sessions",
    request_body = NewSessionSchema,
    responses(
        (status = 200, body = StartedSession),
        (status = 400, body = ErrorBody),
        (status = 409, description = "The room is already live", body = ErrorBody),
        (status = 503, description = "Tokens cannot be issued", body = ErrorBody)
    )
)]
async fn start_session(
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<NewSessionSchema>,
) -> ServerResult<Json<StartedSession>> {
    let started = context.collab.sessions.start_session(NewSession {
        host_id: body.host_id,
        host_display_name: body.host_display_name,
        host_photo_ref: body.host_photo_ref,
        title: body.title,
        room_name_hint: body.room_name,
    })?;

    Ok(Json(started.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/end",
    tag = "sessions",
    responses(
        (status = 200, description = "The ended session, also when it had already ended", body = Session),
        (status = 404, body = ErrorBody)
    )
)]
async fn end_session(
    context: ServerContext,
    Path(session_id): Path<String>,
) -> ServerResult<Json<Session>> {
    let session = context.collab.sessions.end_session(&session_id).await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/sessions/recent",
    tag = "sessions",
    params(RecentQuery),
    responses(
        (status = 200, description = "Live sessions, newest first", body = Vec<Session>)
    )
)]
async fn recent_sessions(
    context: ServerContext,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<Session>> {
    let limit = query
        .limit
        .unwrap_or(context.collab.config().recent_limit);

    let sessions = context.collab.sessions.list_recent(limit).await;

    Json(sessions.to_serialized())
}

#[utoipa::path(
    get,
    path = "/v1/sessions/live",
    tag = "sessions",
    responses(
        (status = 200, description = "Every live session in this process", body = Vec<Session>)
    )
)]
async fn live_sessions(context: ServerContext) -> Json<Vec<Session>> {
    Json(context.collab.sessions.live().to_serialized())
}

#[utoipa::path(
    get,
    path = "/v1/sessions/{id}",
    tag = "sessions",
    responses(
        (status = 200, body = Session),
        (status = 404, body = ErrorBody)
    )
)]
async fn session(
    context: ServerContext,
    Path(session_id): Path<String>,
) -> ServerResult<Json<Session>> {
    let session = context.collab.sessions.session(&session_id).await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/sessions/{id}/viewers",
    tag = "sessions",
    responses(
        (status = 200, body = ViewerCount),
        (status = 404, body = ErrorBody)
    )
)]
async fn viewer_count(
    context: ServerContext,
    Path(session_id): Path<String>,
) -> ServerResult<Json<ViewerCount>> {
    let viewer_count = context.collab.sessions.viewer_count(&session_id)?;

    Ok(Json(ViewerCount { viewer_count }))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/viewers",
    tag = "sessions",
    request_body = ViewerDeltaSchema,
    responses(
        (status = 200, description = "The new count, never below zero", body = ViewerCount),
        (status = 403, description = "The session has ended", body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
async fn record_viewer_delta(
    context: ServerContext,
    Path(session_id): Path<String>,
    ValidatedJson(body): ValidatedJson<ViewerDeltaSchema>,
) -> ServerResult<Json<ViewerCount>> {
    let viewer_count = context
        .collab
        .sessions
        .record_viewer_delta(&session_id, body.delta)?;

    Ok(Json(ViewerCount { viewer_count }))
}

#[utoipa::path(
    get,
    path = "/v1/sessions/{id}/share",
    tag = "sessions",
    responses(
        (status = 200, body = ShareLink),
        (status = 404, body = ErrorBody)
    )
)]
async fn share_link(
    context: ServerContext,
    Path(session_id): Path<String>,
) -> ServerResult<Json<ShareLink>> {
    let link = context.collab.sessions.share_link(&session_id).await?;

    Ok(Json(link.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(start_session))
        .route("/recent", get(recent_sessions))
        .route("/live", get(live_sessions))
        .route("/:id", get(session))
        .route("/:id/end", post(end_session))
        .route("/:id/viewers", get(viewer_count).post(record_viewer_delta))
        .route("/:id/share", get(share_link))
}
