use axum::{extract::Query, routing::get, Json};
use driftline_core::Role;

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::TokenQuery,
    serialized::{ErrorBody, ToSerialized, Token},
    Router,
};

/// Used when the caller doesn't ask for a lifetime
const DEFAULT_EXPIRE_SECS: u64 = 60 * 60;

/// The uid used when the caller doesn't name one
const ANONYMOUS_UID: &str = "0";

fn role_from_query(role: Option<&str>) -> Role {
    match role {
        Some("audience") => Role::Subscriber,
        _ => Role::Publisher,
    }
}

#[utoipa::path(
    get,
    path = "/v1/rtc/token",
    tag = "rtc",
    params(TokenQuery),
    responses(
        (status = 200, body = Token),
        (status = 400, body = ErrorBody),
        (status = 503, description = "Tokens cannot be issued", body = ErrorBody)
    )
)]
async fn token(context: ServerContext, Query(query): Query<TokenQuery>) -> ServerResult<Json<Token>> {
    let token = context.collab.issue_token(
        &query.channel,
        query.uid.as_deref().unwrap_or(ANONYMOUS_UID),
        role_from_query(query.role.as_deref()),
        query.expire.unwrap_or(DEFAULT_EXPIRE_SECS),
    )?;

    Ok(Json(token.to_serialized()))
}

pub fn router() -> Router {
    Router::new().route("/token", get(token))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_role_from_query() {
        assert_eq!(role_from_query(Some("audience")), Role::Subscriber);
        assert_eq!(role_from_query(Some("host")), Role::Publisher);
        assert_eq!(role_from_query(None), Role::Publisher);
    }
}
