use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use driftline_collab::CollabError;
use thiserror::Error;

use crate::serialized::ErrorBody;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Collab(#[from] CollabError),
    /// The request body couldn't be parsed or failed validation
    #[error("{0}")]
    InvalidBody(String),
}

impl ServerError {
    /// The stable error kind exposed to clients
    fn kind(&self) -> &'static str {
        match self {
            Self::Collab(e) => e.kind(),
            Self::InvalidBody(_) => "invalid_argument",
        }
    }

    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::Collab(e) => match e {
                CollabError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                CollabError::NotFound { .. } => StatusCode::NOT_FOUND,
                CollabError::Forbidden(_) => StatusCode::FORBIDDEN,
                CollabError::Conflict(_) => StatusCode::CONFLICT,
                CollabError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            kind: self.kind().to_string(),
            message: self.to_string(),
        };

        (self.as_status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (CollabError::invalid("Missing hostId"), StatusCode::BAD_REQUEST),
            (CollabError::not_found("Room", "x"), StatusCode::NOT_FOUND),
            (CollabError::Forbidden("".into()), StatusCode::FORBIDDEN),
            (CollabError::Conflict("".into()), StatusCode::CONFLICT),
            (
                CollabError::Unavailable("".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (error, status) in cases {
            let kind = error.kind();
            let error = ServerError::from(error);

            assert_eq!(error.as_status_code(), status);
            assert_eq!(error.kind(), kind);
        }
    }
}
