//! Error taxonomy for the authentication subsystem.

use thiserror::Error;

/// Coarse kind every `AuthError` collapses to. Callers branch on this, never
/// on the specific variant, so a rejection never leaks which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    Validation,
    Unavailable,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingAuthorization,
    #[error("malformed Authorization header")]
    MalformedAuthorization,
    #[error("invalid token")]
    InvalidToken,
    #[error("token has expired")]
    ExpiredToken,
    #[error("wrong token type")]
    WrongTokenType,
    #[error("session has been revoked")]
    SessionRevoked,
    #[error("token issuer is not recognized")]
    InvalidIssuer,
    #[error("API token validator is unavailable")]
    ApiTokenUnavailable,
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: missing permission {permission}")]
    Forbidden { permission: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("required collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        use AuthError::*;
        match self {
            MissingAuthorization
            | MalformedAuthorization
            | InvalidToken
            | ExpiredToken
            | WrongTokenType
            | SessionRevoked
            | InvalidIssuer
            | ApiTokenUnavailable
            | Unauthorized => ErrorKind::Authentication,
            Forbidden { .. } => ErrorKind::Authorization,
            Validation { .. } => ErrorKind::Validation,
            Unavailable(_) | Internal(_) => ErrorKind::Unavailable,
        }
    }
}

impl From<switchyard_crypto::TokenError> for AuthError {
    fn from(err: switchyard_crypto::TokenError) -> Self {
        match err {
            switchyard_crypto::TokenError::Malformed => AuthError::InvalidToken,
            switchyard_crypto::TokenError::Expired => AuthError::ExpiredToken,
            switchyard_crypto::TokenError::WrongType => AuthError::WrongTokenType,
            switchyard_crypto::TokenError::Invalid(_) => AuthError::InvalidToken,
            switchyard_crypto::TokenError::Encoding(_) => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<switchyard_cache::RevokerError> for AuthError {
    fn from(err: switchyard_cache::RevokerError) -> Self {
        AuthError::Unavailable(err.to_string())
    }
}
