//! # Structured Logging
//!
//! Subscriber setup and span macros for the tracing ecosystem. `RUST_LOG`
//! takes precedence over the configured level when set.

use crate::config::{AppConfig, AuthProviderKind, ObservabilityConfig};
use crate::errors::{Result, TenancyError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Create a tracing span for request tracking.
///
/// ```rust,ignore
/// let span = request_span!("GET", "/profile");
/// let span = request_span!("PUT", "/organization/x/members", org_id = "x");
/// ```
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            profile_id = tracing::field::Empty
        )
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            profile_id = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Create a tracing span for database operations.
#[macro_export]
macro_rules! db_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Build the env filter from `RUST_LOG`, falling back to the configured level.
pub fn build_filter(config: &ObservabilityConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            TenancyError::config(format!("Invalid log level '{}': {}", config.log_level, e))
        }),
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// leave the first subscriber in place.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = build_filter(config)?;

    let installed = if config.json_logging {
        tracing_subscriber::registry().with(filter).with(fmt::layer().json()).try_init()
    } else {
        tracing_subscriber::registry().with(filter).with(fmt::layer().compact()).try_init()
    };

    if let Err(e) = installed {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }

    Ok(())
}

/// Log configuration at startup
pub fn log_config_info(config: &AppConfig) {
    let auth_provider = match config.auth.provider {
        AuthProviderKind::Local => "local",
        AuthProviderKind::Federated => "federated",
    };

    tracing::info!(
        server_address = %config.server.bind_address(),
        database_url = %crate::storage::pool::sanitize_url(&config.database.url),
        auth_provider,
        jwks_url = ?config.auth.jwks_url,
        protect_last_owner = config.organizations.protect_last_owner,
        reconcile_invitations = config.organizations.reconcile_invitations,
        "Tenancy backend configuration"
    );

    if config.auth.provider == AuthProviderKind::Local && config.auth.uses_default_secret() {
        tracing::warn!("JWT_SECRET is not set; local tokens are signed with the default secret");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let _span = request_span!("GET", "/profile");
        let _span = request_span!("PUT", "/organization/x/members", org_id = "x");
        let _span = db_span!("insert_profile");
        let _span = db_span!("insert_profile", table = "profiles");
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let config =
            ObservabilityConfig { log_level: "tenancy=loudest".to_string(), json_logging: false };
        if std::env::var("RUST_LOG").is_err() {
            assert!(build_filter(&config).is_err());
        }
    }

    #[test]
    fn test_init_logging_twice() {
        let config = ObservabilityConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }
}
