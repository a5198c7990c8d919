use axum::{
    extract::Path,
    routing::{get, post},
    Json,
};
use driftline_collab::NewCharteredDrift;

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{ChatSchema, NewDriftSchema, UserSchema, ValidatedJson},
    serialized::{
        Drift, Earnings, EndedDrift, ErrorBody, HostEarnings, Promo, PurchasedPass, StartedDrift,
        ToSerialized,
    },
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/drifts",
    tag = "drifts",
    request_body = NewDriftSchema,
    responses(
        (status = 200, body = StartedDrift),
        (status = 400, body = ErrorBody),
        (status = 409, description = "The ticket number is held by a live drift", body = ErrorBody),
        (status = 503, body = ErrorBody)
    )
)]
async fn start_chartered(
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<NewDriftSchema>,
) -> ServerResult<Json<StartedDrift>> {
    let started = context.collab.chartered.start_chartered(NewCharteredDrift {
        title: body.title,
        ticket_number: body.ticket_number,
        price_usd: body.price_usd,
        duration_mins: body.duration_mins,
        host_uid: body.host_uid,
        host_name: body.host_name,
    })?;

    Ok(Json(started.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/drifts",
    tag = "drifts",
    responses(
        (status = 200, description = "Every live drift, newest first", body = Vec<Drift>)
    )
)]
async fn live_drifts(context: ServerContext) -> Json<Vec<Drift>> {
    Json(context.collab.chartered.live().to_serialized())
}

#[utoipa::path(
    get,
    path = "/v1/drifts/{id}",
    tag = "drifts",
    responses(
        (status = 200, body = Drift),
        (status = 404, body = ErrorBody)
    )
)]
async fn drift(context: ServerContext, Path(drift_id): Path<String>) -> ServerResult<Json<Drift>> {
    let drift = context.collab.chartered.drift(&drift_id)?;

    Ok(Json(drift.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/drifts/{id}/passes",
    tag = "drifts",
    request_body = UserSchema,
    responses(
        (status = 200, description = "A subscriber token for the drift's channel", body = PurchasedPass),
        (status = 403, description = "The drift is not live", body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 409, description = "The user already holds a pass", body = ErrorBody)
    )
)]
async fn purchase_pass(
    context: ServerContext,
    Path(drift_id): Path<String>,
    ValidatedJson(body): ValidatedJson<UserSchema>,
) -> ServerResult<Json<PurchasedPass>> {
    let pass = context.collab.chartered.purchase_pass(&drift_id, &body.uid)?;

    Ok(Json(pass.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/drifts/{id}/passes",
    tag = "drifts",
    responses(
        (status = 200, description = "Everyone holding a pass, the host included", body = Vec<String>),
        (status = 404, body = ErrorBody)
    )
)]
async fn passes(context: ServerContext, Path(drift_id): Path<String>) -> ServerResult<Json<Vec<String>>> {
    Ok(Json(context.collab.chartered.passes(&drift_id)?))
}

#[utoipa::path(
    post,
    path = "/v1/drifts/{id}/end",
    tag = "drifts",
    responses(
        (status = 200, description = "The ended drift with its final ledger", body = EndedDrift),
        (status = 404, body = ErrorBody)
    )
)]
async fn end_chartered(
    context: ServerContext,
    Path(drift_id): Path<String>,
) -> ServerResult<Json<EndedDrift>> {
    let ended = context.collab.chartered.end_chartered(&drift_id)?;

    Ok(Json(ended.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/drifts/{id}/chat",
    tag = "drifts",
    request_body = ChatSchema,
    responses(
        (status = 200, body = Drift),
        (status = 404, body = ErrorBody)
    )
)]
async fn toggle_chat(
    context: ServerContext,
    Path(drift_id): Path<String>,
    ValidatedJson(body): ValidatedJson<ChatSchema>,
) -> ServerResult<Json<Drift>> {
    let drift = context.collab.chartered.toggle_chat(&drift_id, body.enabled)?;

    Ok(Json(drift.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/drifts/{id}/earnings",
    tag = "drifts",
    responses(
        (status = 200, body = Earnings),
        (status = 404, body = ErrorBody)
    )
)]
async fn earnings(context: ServerContext, Path(drift_id): Path<String>) -> ServerResult<Json<Earnings>> {
    let earnings = context.collab.chartered.earnings(&drift_id)?;

    Ok(Json(earnings.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/drifts/hosts/{uid}/earnings",
    tag = "drifts",
    responses(
        (status = 200, description = "Every drift the host started, with a grand total", body = HostEarnings)
    )
)]
async fn host_earnings(context: ServerContext, Path(host_uid): Path<String>) -> Json<HostEarnings> {
    Json(context.collab.chartered.host_earnings(&host_uid).to_serialized())
}

#[utoipa::path(
    post,
    path = "/v1/drifts/{id}/promo",
    tag = "drifts",
    responses(
        (status = 200, body = Promo),
        (status = 404, body = ErrorBody)
    )
)]
async fn share_promo(context: ServerContext, Path(drift_id): Path<String>) -> ServerResult<Json<Promo>> {
    let promo = context.collab.chartered.share_promo(&drift_id)?;

    Ok(Json(promo.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(live_drifts).post(start_chartered))
        .route("/hosts/:uid/earnings", get(host_earnings))
        .route("/:id", get(drift))
        .route("/:id/passes", get(passes).post(purchase_pass))
        .route("/:id/end", post(end_chartered))
        .route("/:id/chat", post(toggle_chat))
        .route("/:id/earnings", get(earnings))
        .route("/:id/promo", post(share_promo))
}
