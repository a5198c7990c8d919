use driftline_core::CredentialError;
use thiserror::Error;

pub type CollabResult<T> = Result<T, CollabError>;

/// Every rejected operation ends up as one of these.
/// Rejections happen before any state is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollabError {
    /// A required field is missing or malformed
    #[error("{0}")]
    InvalidArgument(String),
    /// The session, room, or drift doesn't exist
    #[error("{resource} {identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    /// A blocked pair, or a resource not in the required state
    #[error("{0}")]
    Forbidden(String),
    /// A state-dependent rule was violated
    #[error("{0}")]
    Conflict(String),
    /// A downstream dependency that blocks the caller is unreachable
    #[error("{0}")]
    Unavailable(String),
}

impl CollabError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found(resource: &'static str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            identifier: identifier.into(),
        }
    }

    /// A stable identifier of the error kind, exposed to clients
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound { .. } => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

impl From<CredentialError> for CollabError {
    fn from(value: CredentialError) -> Self {
        match value {
            CredentialError::NotConfigured => Self::Unavailable(value.to_string()),
            e => Self::InvalidArgument(e.to_string()),
        }
    }
}

/// Rejects blank required fields, returning the trimmed value
pub(crate) fn required<'a>(value: &'a str, field: &str) -> CollabResult<&'a str> {
    let value = value.trim();

    if value.is_empty() {
        return Err(CollabError::invalid(format!("Missing {field}")));
    }

    Ok(value)
}
