//! # Configuration Management
//!
//! Environment-driven configuration for the tenancy backend. `.env` files are
//! loaded by the binary before [`AppConfig::from_env`] runs.

pub mod settings;

pub use settings::{
    AppConfig, AuthConfig, AuthProviderKind, DatabaseConfig, ObservabilityConfig,
    OrganizationsConfig, ServerConfig, DEFAULT_JWT_SECRET,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.provider, AuthProviderKind::Local);
        assert!(config.database.is_sqlite());
        assert!(config.auth.uses_default_secret());
    }
}
