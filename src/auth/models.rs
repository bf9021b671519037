//! Authentication error and request context types.

use thiserror::Error;

use crate::auth::identity::IdentityToken;
use crate::domain::Profile;
use crate::errors::{AuthErrorType, TenancyError};

/// Failure while verifying a bearer credential.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingBearer,
    #[error("malformed authorization header")]
    MalformedBearer,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    ExpiredToken,
    #[error("token subject is empty")]
    EmptySubject,
    #[error("signing keys unavailable: {0}")]
    KeySetUnavailable(String),
}

impl AuthError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::KeySetUnavailable(_))
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken(err.to_string()),
        }
    }
}

impl From<AuthError> for TenancyError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingBearer => {
                TenancyError::auth(err.to_string(), AuthErrorType::MissingToken)
            }
            AuthError::ExpiredToken => {
                TenancyError::auth(err.to_string(), AuthErrorType::ExpiredToken)
            }
            AuthError::MalformedBearer | AuthError::InvalidToken(_) | AuthError::EmptySubject => {
                TenancyError::auth(err.to_string(), AuthErrorType::InvalidToken)
            }
            AuthError::KeySetUnavailable(_) => TenancyError::service_unavailable(err.to_string()),
        }
    }
}

/// Request-scoped caller derived from a verified token.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub identity: IdentityToken,
    pub profile: Profile,
}
