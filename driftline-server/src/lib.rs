mod chartered;
mod context;
mod docs;
mod errors;
mod moderation;
mod recordings;
mod rooms;
mod schemas;
mod serialized;
mod sessions;
mod sse;
mod tokens;

use axum::{routing::get, Json};
use context::ServerContext;
use driftline_collab::Collab;
use log::info;
use serialized::Health;
use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub type Router = axum::Router<ServerContext>;

#[utoipa::path(
    get,
    path = "/health",
    tag = "rtc",
    responses(
        (status = 200, body = Health)
    )
)]
async fn health() -> Json<Health> {
    Json(Health { ok: true })
}

/// Builds the routes of the server around a collab system
pub fn app(collab: Arc<Collab>) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let context = ServerContext { collab };

    let version_one_router = Router::new()
        .nest("/sessions", sessions::router())
        .nest("/rooms", rooms::router().merge(moderation::router()))
        .nest("/blocks", moderation::blocks_router())
        .nest("/drifts", chartered::router())
        .nest("/recordings", recordings::router())
        .nest("/rtc", tokens::router())
        .merge(sse::router());

    Router::new()
        .nest("/v1", version_one_router)
        .route("/health", get(health))
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context)
}

/// Starts the driftline server on the configured port
pub async fn run_server(collab: Arc<Collab>) -> std::io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, collab.config().port).into();
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);

    axum::serve(listener, app(collab).into_make_service()).await
}
