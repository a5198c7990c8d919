use axum::{
    extract::Path,
    routing::{get, post},
    Json,
};

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{AcceptSchema, JoinRequestSchema, UserSchema, ValidatedJson},
    serialized::{Changed, ErrorBody, RoomSnapshot, ToSerialized, Token},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms/{room}",
    tag = "rooms",
    responses(
        (status = 200, body = RoomSnapshot),
        (status = 404, body = ErrorBody)
    )
)]
async fn room(context: ServerContext, Path(room_name): Path<String>) -> ServerResult<Json<RoomSnapshot>> {
    let snapshot = context.collab.negotiation.snapshot(&room_name)?;

    Ok(Json(snapshot.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{room}/requests",
    tag = "rooms",
    request_body = JoinRequestSchema,
    responses(
        (status = 200, description = "The host was asked. Asking again while pending changes nothing."),
        (status = 403, description = "The requester and host are blocked, or the requester is timed out", body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
async fn request_join(
    context: ServerContext,
    Path(room_name): Path<String>,
    ValidatedJson(body): ValidatedJson<JoinRequestSchema>,
) -> ServerResult<()> {
    context.collab.negotiation.request(
        &room_name,
        &body.from_uid,
        &body.from_name,
        body.host_uid.as_deref(),
    )?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{room}/accept",
    tag = "rooms",
    request_body = AcceptSchema,
    responses(
        (status = 200, description = "A subscriber token for the requester", body = Token),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 503, body = ErrorBody)
    )
)]
async fn accept_join(
    context: ServerContext,
    Path(room_name): Path<String>,
    ValidatedJson(body): ValidatedJson<AcceptSchema>,
) -> ServerResult<Json<Token>> {
    let token = context.collab.negotiation.accept(
        &room_name,
        &body.requester_uid,
        body.channel.as_deref(),
        body.host_uid.as_deref(),
    )?;

    Ok(Json(token.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{room}/withdraw",
    tag = "rooms",
    request_body = UserSchema,
    responses(
        (status = 200, description = "Whether a pending request was taken back", body = Changed),
        (status = 404, body = ErrorBody)
    )
)]
async fn withdraw_join(
    context: ServerContext,
    Path(room_name): Path<String>,
    ValidatedJson(body): ValidatedJson<UserSchema>,
) -> ServerResult<Json<Changed>> {
    let changed = context.collab.negotiation.withdraw(&room_name, &body.uid)?;

    Ok(Json(Changed { changed }))
}

pub fn router() -> Router {
    Router::new()
        .route("/:room", get(room))
        .route("/:room/requests", post(request_join))
        .route("/:room/accept", post(accept_join))
        .route("/:room/withdraw", post(withdraw_join))
}
