//! # Error Types
//!
//! Error types for the tenancy backend using `thiserror`.

use std::fmt;

/// Custom result type for tenancy operations
pub type Result<T> = std::result::Result<T, TenancyError>;

/// Main error type for the tenancy backend
#[derive(thiserror::Error, Debug)]
pub enum TenancyError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Authentication errors (missing, malformed, invalid or expired credential)
    #[error("Authentication error: {message}")]
    Auth { message: String, error_type: AuthErrorType },

    /// An upstream dependency (the federated key set) could not be reached
    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// Caller lacks the organization role required for the operation
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Resource not found errors
    #[error("Resource not found: {resource_type} with ID '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Resource conflict errors (unique constraint, last owner)
    #[error("Resource conflict: {message}")]
    Conflict { message: String, resource_type: String },
}

/// Authentication error subtypes
#[derive(Debug, Clone, PartialEq)]
pub enum AuthErrorType {
    InvalidToken,
    ExpiredToken,
    MissingToken,
}

impl fmt::Display for AuthErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorType::InvalidToken => write!(f, "invalid_token"),
            AuthErrorType::ExpiredToken => write!(f, "expired_token"),
            AuthErrorType::MissingToken => write!(f, "missing_token"),
        }
    }
}

impl TenancyError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a database error with context
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an authentication error
    pub fn auth<S: Into<String>>(message: S, error_type: AuthErrorType) -> Self {
        Self::Auth { message: message.into(), error_type }
    }

    pub fn service_unavailable<S: Into<String>>(message: S) -> Self {
        Self::ServiceUnavailable { message: message.into() }
    }

    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden { message: message.into() }
    }

    /// Create an internal server error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a conflict error
    pub fn conflict<M: Into<String>, R: Into<String>>(message: M, resource_type: R) -> Self {
        Self::Conflict { message: message.into(), resource_type: resource_type.into() }
    }

    /// Map a sqlx error to `Conflict` when it is a unique-constraint violation,
    /// otherwise wrap it as a database error with the given context.
    pub fn from_write<S: Into<String>>(
        source: sqlx::Error,
        resource_type: &str,
        context: S,
    ) -> Self {
        let context = context.into();
        let is_unique = source.as_database_error().is_some_and(|db_err| db_err.is_unique_violation());
        if is_unique {
            Self::conflict(format!("{}: {} already exists", context, resource_type), resource_type)
        } else {
            Self::database(source, context)
        }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self {
            TenancyError::Config { .. } => 500,
            TenancyError::Database { .. } => 500,
            TenancyError::Io { .. } => 500,
            TenancyError::Validation { .. } => 400,
            TenancyError::Auth { .. } => 401,
            TenancyError::Forbidden { .. } => 403,
            TenancyError::ServiceUnavailable { .. } => 503,
            TenancyError::Internal { .. } => 500,
            TenancyError::NotFound { .. } => 404,
            TenancyError::Conflict { .. } => 409,
        }
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TenancyError::Database { .. }
                | TenancyError::Io { .. }
                | TenancyError::ServiceUnavailable { .. }
        )
    }
}

// Error conversions for common external error types
impl From<sqlx::Error> for TenancyError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<std::io::Error> for TenancyError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<validator::ValidationErrors> for TenancyError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let message = fields
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = TenancyError::config("Test configuration error");
        assert!(matches!(error, TenancyError::Config { .. }));
        assert_eq!(error.to_string(), "Configuration error: Test configuration error");
    }

    #[test]
    fn test_validation_error() {
        let error = TenancyError::validation_field("Invalid email format", "email");
        if let TenancyError::Validation { field, .. } = error {
            assert_eq!(field, Some("email".to_string()));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(TenancyError::validation("test").status_code(), 400);
        assert_eq!(TenancyError::auth("test", AuthErrorType::InvalidToken).status_code(), 401);
        assert_eq!(TenancyError::forbidden("test").status_code(), 403);
        assert_eq!(TenancyError::not_found("organization", "test").status_code(), 404);
        assert_eq!(TenancyError::conflict("test", "profile").status_code(), 409);
        assert_eq!(TenancyError::service_unavailable("jwks").status_code(), 503);
        assert_eq!(TenancyError::internal("test").status_code(), 500);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(TenancyError::service_unavailable("jwks").is_retryable());
        assert!(!TenancyError::forbidden("nope").is_retryable());
        assert!(!TenancyError::not_found("organization", "test").is_retryable());
        assert!(!TenancyError::auth("bad", AuthErrorType::ExpiredToken).is_retryable());
    }

    #[test]
    fn test_row_not_found_is_not_a_conflict() {
        let error = TenancyError::from_write(sqlx::Error::RowNotFound, "profile", "Failed to insert");
        assert!(matches!(error, TenancyError::Database { .. }));
    }

    #[test]
    fn test_auth_error_type_display() {
        assert_eq!(AuthErrorType::InvalidToken.to_string(), "invalid_token");
        assert_eq!(AuthErrorType::ExpiredToken.to_string(), "expired_token");
        assert_eq!(AuthErrorType::MissingToken.to_string(), "missing_token");
    }
}
