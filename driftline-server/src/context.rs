use std::{convert::Infallible, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use driftline_collab::Collab;

#[derive(Clone)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ServerContext
where
    ServerContext: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(ServerContext::from_ref(state))
    }
}
