use axum::{
    extract::Path,
    routing::{delete, get, post},
    Json,
};

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{
        BlockSchema, ChatSchema, KickSchema, MuteSchema, TargetSchema, TimeoutSchema,
        TransferHostSchema, ValidatedJson,
    },
    serialized::{Blocked, Changed, ErrorBody, Pinned, Restrictions, ToSerialized, Token, Until},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/blocks",
    tag = "moderation",
    request_body = BlockSchema,
    responses(
        (status = 200, description = "The pair can no longer see each other's requests"),
        (status = 400, body = ErrorBody)
    )
)]
async fn block(context: ServerContext, ValidatedJson(body): ValidatedJson<BlockSchema>) -> ServerResult<()> {
    context.collab.moderation.block(&body.uid, &body.target_uid)?;
    Ok(())
}

#[utoipa::path(
    delete,
    path = "/v1/blocks",
    tag = "moderation",
    request_body = BlockSchema,
    responses(
        (status = 200, description = "The caller's own block was lifted, if there was one"),
        (status = 400, body = ErrorBody)
    )
)]
async fn unblock(context: ServerContext, ValidatedJson(body): ValidatedJson<BlockSchema>) -> ServerResult<()> {
    context.collab.moderation.unblock(&body.uid, &body.target_uid)?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/blocks/{uid}",
    tag = "moderation",
    responses(
        (status = 200, description = "Everyone the user has blocked", body = Vec<String>)
    )
)]
async fn blocked_by(context: ServerContext, Path(uid): Path<String>) -> Json<Vec<String>> {
    Json(context.collab.moderation.blocked_by(&uid))
}

#[utoipa::path(
    get,
    path = "/v1/blocks/{uid}/{other}",
    tag = "moderation",
    responses(
        (status = 200, description = "Whether either user blocked the other", body = Blocked)
    )
)]
async fn is_blocked(
    context: ServerContext,
    Path((uid, other)): Path<(String, String)>,
) -> Json<Blocked> {
    Json(Blocked {
        blocked: context.collab.moderation.is_blocked(&uid, &other),
    })
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{room}/mute",
    tag = "moderation",
    request_body = MuteSchema,
    responses(
        (status = 200, body = Until),
        (status = 404, body = ErrorBody)
    )
)]
async fn mute(
    context: ServerContext,
    Path(room_name): Path<String>,
    ValidatedJson(body): ValidatedJson<MuteSchema>,
) -> ServerResult<Json<Until>> {
    let until = context
        .collab
        .moderation
        .mute(&room_name, &body.target_uid, body.duration_sec)?;

    Ok(Json(Until {
        until: until.timestamp_millis(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{room}/unmute",
    tag = "moderation",
    request_body = TargetSchema,
    responses(
        (status = 200, description = "Whether the user was muted", body = Changed),
        (status = 404, body = ErrorBody)
    )
)]
async fn unmute(
    context: ServerContext,
    Path(room_name): Path<String>,
    ValidatedJson(body): ValidatedJson<TargetSchema>,
) -> ServerResult<Json<Changed>> {
    let changed = context.collab.moderation.unmute(&room_name, &body.target_uid)?;

    Ok(Json(Changed { changed }))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{room}/timeout",
    tag = "moderation",
    request_body = TimeoutSchema,
    responses(
        (status = 200, body = Until),
        (status = 404, body = ErrorBody)
    )
)]
async fn timeout(
    context: ServerContext,
    Path(room_name): Path<String>,
    ValidatedJson(body): ValidatedJson<TimeoutSchema>,
) -> ServerResult<Json<Until>> {
    let until = context
        .collab
        .moderation
        .timeout(&room_name, &body.target_uid, body.duration_min)?;

    Ok(Json(Until {
        until: until.timestamp_millis(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{room}/pin",
    tag = "moderation",
    request_body = TargetSchema,
    responses(
        (status = 200, description = "The user is pinned, replacing any earlier pin"),
        (status = 404, body = ErrorBody)
    )
)]
async fn pin(
    context: ServerContext,
    Path(room_name): Path<String>,
    ValidatedJson(body): ValidatedJson<TargetSchema>,
) -> ServerResult<()> {
    context.collab.moderation.pin(&room_name, &body.target_uid)?;
    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{room}/unpin",
    tag = "moderation",
    responses(
        (status = 200, description = "The user that was pinned, if any", body = Pinned),
        (status = 404, body = ErrorBody)
    )
)]
async fn unpin(context: ServerContext, Path(room_name): Path<String>) -> ServerResult<Json<Pinned>> {
    let user_id = context.collab.moderation.unpin(&room_name)?;

    Ok(Json(Pinned { user_id }))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{room}/kick",
    tag = "moderation",
    request_body = KickSchema,
    responses(
        (status = 200, description = "The user was removed and may request again"),
        (status = 404, body = ErrorBody)
    )
)]
async fn kick(
    context: ServerContext,
    Path(room_name): Path<String>,
    ValidatedJson(body): ValidatedJson<KickSchema>,
) -> ServerResult<()> {
    context
        .collab
        .moderation
        .kick(&room_name, &body.target_uid, body.kicker_uid.as_deref())?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{room}/cohosts",
    tag = "moderation",
    responses(
        (status = 200, body = Vec<String>),
        (status = 404, body = ErrorBody)
    )
)]
async fn co_hosts(context: ServerContext, Path(room_name): Path<String>) -> ServerResult<Json<Vec<String>>> {
    Ok(Json(context.collab.moderation.co_hosts(&room_name)?))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{room}/cohosts",
    tag = "moderation",
    request_body = TargetSchema,
    responses(
        (status = 200, description = "A publisher token for the new co-host", body = Token),
        (status = 404, body = ErrorBody),
        (status = 503, body = ErrorBody)
    )
)]
async fn invite_cohost(
    context: ServerContext,
    Path(room_name): Path<String>,
    ValidatedJson(body): ValidatedJson<TargetSchema>,
) -> ServerResult<Json<Token>> {
    let token = context
        .collab
        .moderation
        .invite_cohost(&room_name, &body.target_uid)?;

    Ok(Json(token.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{room}/cohosts/{uid}",
    tag = "moderation",
    responses(
        (status = 200, description = "Whether the user was a co-host", body = Changed),
        (status = 404, body = ErrorBody)
    )
)]
async fn remove_cohost(
    context: ServerContext,
    Path((room_name, uid)): Path<(String, String)>,
) -> ServerResult<Json<Changed>> {
    let changed = context.collab.moderation.remove_cohost(&room_name, &uid)?;

    Ok(Json(Changed { changed }))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{room}/host",
    tag = "moderation",
    request_body = TransferHostSchema,
    responses(
        (status = 200, description = "A publisher token for the new host", body = Token),
        (status = 404, body = ErrorBody),
        (status = 503, body = ErrorBody)
    )
)]
async fn transfer_host(
    context: ServerContext,
    Path(room_name): Path<String>,
    ValidatedJson(body): ValidatedJson<TransferHostSchema>,
) -> ServerResult<Json<Token>> {
    let token = context.collab.moderation.transfer_host(
        &room_name,
        &body.new_host_uid,
        body.new_host_name.as_deref(),
    )?;

    Ok(Json(token.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{room}/moderators",
    tag = "moderation",
    responses(
        (status = 200, body = Vec<String>),
        (status = 404, body = ErrorBody)
    )
)]
async fn moderators(context: ServerContext, Path(room_name): Path<String>) -> ServerResult<Json<Vec<String>>> {
    Ok(Json(context.collab.moderation.moderators(&room_name)?))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{room}/moderators",
    tag = "moderation",
    request_body = TargetSchema,
    responses(
        (status = 200, description = "Whether the user was not a moderator yet", body = Changed),
        (status = 404, body = ErrorBody)
    )
)]
async fn make_moderator(
    context: ServerContext,
    Path(room_name): Path<String>,
    ValidatedJson(body): ValidatedJson<TargetSchema>,
) -> ServerResult<Json<Changed>> {
    let changed = context
        .collab
        .moderation
        .make_moderator(&room_name, &body.target_uid)?;

    Ok(Json(Changed { changed }))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{room}/moderators/{uid}",
    tag = "moderation",
    responses(
        (status = 200, description = "Whether the user was a moderator", body = Changed),
        (status = 404, body = ErrorBody)
    )
)]
async fn remove_moderator(
    context: ServerContext,
    Path((room_name, uid)): Path<(String, String)>,
) -> ServerResult<Json<Changed>> {
    let changed = context.collab.moderation.remove_moderator(&room_name, &uid)?;

    Ok(Json(Changed { changed }))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{room}/chat",
    tag = "moderation",
    request_body = ChatSchema,
    responses(
        (status = 200, description = "Chat was turned on or off"),
        (status = 404, body = ErrorBody)
    )
)]
async fn set_chat(
    context: ServerContext,
    Path(room_name): Path<String>,
    ValidatedJson(body): ValidatedJson<ChatSchema>,
) -> ServerResult<()> {
    context.collab.moderation.set_chat(&room_name, body.enabled)?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{room}/restrictions",
    tag = "moderation",
    responses(
        (status = 200, body = Restrictions),
        (status = 404, body = ErrorBody)
    )
)]
async fn restrictions(
    context: ServerContext,
    Path(room_name): Path<String>,
) -> ServerResult<Json<Restrictions>> {
    let restrictions = context.collab.moderation.restrictions(&room_name)?;

    Ok(Json(restrictions.to_serialized()))
}

/// Routes acting on a room, nested next to [crate::rooms::router]
pub fn router() -> Router {
    Router::new()
        .route("/:room/mute", post(mute))
        .route("/:room/unmute", post(unmute))
        .route("/:room/timeout", post(timeout))
        .route("/:room/pin", post(pin))
        .route("/:room/unpin", post(unpin))
        .route("/:room/kick", post(kick))
        .route("/:room/cohosts", get(co_hosts).post(invite_cohost))
        .route("/:room/cohosts/:uid", delete(remove_cohost))
        .route("/:room/host", post(transfer_host))
        .route("/:room/moderators", get(moderators).post(make_moderator))
        .route("/:room/moderators/:uid", delete(remove_moderator))
        .route("/:room/chat", post(set_chat))
        .route("/:room/restrictions", get(restrictions))
}

pub fn blocks_router() -> Router {
    Router::new()
        .route("/", post(block).delete(unblock))
        .route("/:uid", get(blocked_by))
        .route("/:uid/:other", get(is_blocked))
}
