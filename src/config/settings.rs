//! # Configuration Settings
//!
//! Defines the configuration structure for the tenancy backend. Every section
//! has a `Default` suitable for local development and a `from_env` loader.

use crate::domain::Role;
use crate::errors::{Result, TenancyError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

/// Default HS256 secret used when `JWT_SECRET` is not set.
pub const DEFAULT_JWT_SECRET: &str = "default-secret-change-me-in-production";

const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,

    #[validate(nested)]
    pub database: DatabaseConfig,

    #[validate(nested)]
    pub observability: ObservabilityConfig,

    #[validate(nested)]
    pub auth: AuthConfig,

    #[validate(nested)]
    pub organizations: OrganizationsConfig,
}

impl AppConfig {
    /// Load every section from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env(),
            observability: ObservabilityConfig::from_env(),
            auth: AuthConfig::from_env()?,
            organizations: OrganizationsConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(TenancyError::from)?;
        self.validate_custom()
    }

    /// Cross-field checks the validator derive cannot express
    fn validate_custom(&self) -> Result<()> {
        if !self.database.is_sqlite() {
            return Err(TenancyError::validation("Database URL must start with 'sqlite:'"));
        }

        match self.auth.provider {
            AuthProviderKind::Local => {
                if self.auth.jwt_secret.len() < 32 {
                    return Err(TenancyError::validation(
                        "JWT secret must be at least 32 characters long",
                    ));
                }
            }
            AuthProviderKind::Federated => {
                let jwks_url = self.auth.jwks_url.as_deref().ok_or_else(|| {
                    TenancyError::validation("Federated auth requires a JWKS URL")
                })?;
                url::Url::parse(jwks_url).map_err(|e| {
                    TenancyError::validation(format!("Invalid JWKS URL '{}': {}", jwks_url, e))
                })?;
            }
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, message = "Port must be between 1 and 65535"))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080 }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: std::env::var("TENANCY_HOST").unwrap_or(defaults.host),
            port: parse_env("TENANCY_PORT")?.unwrap_or(defaults.port),
        })
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    #[validate(range(max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,

    /// Run embedded migrations when the pool is created
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/tenancy.db".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    /// Create DatabaseConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let url = std::env::var("DATABASE_URL").unwrap_or(defaults.url);

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.max_connections);

        let min_connections = std::env::var("DATABASE_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.min_connections);

        let connect_timeout_seconds = std::env::var("DATABASE_CONNECT_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.connect_timeout_seconds);

        let idle_timeout_seconds = std::env::var("DATABASE_IDLE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.idle_timeout_seconds);

        let auto_migrate = std::env::var("DATABASE_AUTO_MIGRATE")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(defaults.auto_migrate);

        Self {
            url,
            max_connections,
            min_connections,
            connect_timeout_seconds,
            idle_timeout_seconds,
            auto_migrate,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level or env-filter directive (e.g. `info,sqlx=warn`)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_level: std::env::var("TENANCY_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logging: std::env::var("TENANCY_JSON_LOGGING")
                .map(|s| s.to_lowercase() == "true" || s == "1")
                .unwrap_or(defaults.json_logging),
        }
    }
}

/// Which bearer verifier the process runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProviderKind {
    /// HS256 tokens signed with `jwt_secret`
    Local,
    /// RS256 tokens checked against a remote JWKS
    Federated,
}

impl FromStr for AuthProviderKind {
    type Err = TenancyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "jwt" => Ok(AuthProviderKind::Local),
            "federated" | "firebase" => Ok(AuthProviderKind::Federated),
            other => Err(TenancyError::validation_field(
                format!("Unknown auth provider '{}'", other),
                "auth.provider",
            )),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuthConfig {
    pub provider: AuthProviderKind,

    /// HS256 secret for the local provider
    #[serde(skip_serializing)]
    pub jwt_secret: String,

    /// Lifetime of locally issued tokens
    #[validate(range(
        min = 60,
        max = 2592000,
        message = "Token TTL must be between 1 minute and 30 days"
    ))]
    pub token_ttl_seconds: u64,

    /// Key-set endpoint for the federated provider
    pub jwks_url: Option<String>,

    /// Expected `iss` claim (federated)
    pub issuer: Option<String>,

    /// Expected `aud` claim (federated)
    pub audience: Option<String>,

    #[validate(range(
        min = 1,
        max = 86400,
        message = "JWKS cache TTL must be between 1 second and 24 hours"
    ))]
    pub jwks_cache_ttl_seconds: u64,

    #[validate(range(
        min = 1,
        max = 60,
        message = "JWKS fetch timeout must be between 1 and 60 seconds"
    ))]
    pub jwks_fetch_timeout_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider: AuthProviderKind::Local,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl_seconds: 3600,
            jwks_url: None,
            issuer: None,
            audience: None,
            jwks_cache_ttl_seconds: 3600,
            jwks_fetch_timeout_seconds: 5,
        }
    }
}

impl AuthConfig {
    /// Federated configuration for a Firebase project: Google's secure-token
    /// key set, with issuer and audience derived from the project id.
    pub fn firebase(project_id: &str) -> Self {
        Self {
            provider: AuthProviderKind::Federated,
            jwks_url: Some(FIREBASE_JWKS_URL.to_string()),
            issuer: Some(format!("https://securetoken.google.com/{}", project_id)),
            audience: Some(project_id.to_string()),
            ..Self::default()
        }
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds)
    }

    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_seconds)
    }

    pub fn jwks_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_fetch_timeout_seconds)
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("FIREBASE_PROJECT_ID") {
            Ok(project_id) if !project_id.trim().is_empty() => Self::firebase(project_id.trim()),
            _ => Self::default(),
        };

        if let Ok(provider) = std::env::var("TENANCY_AUTH_PROVIDER") {
            config.provider = provider.parse()?;
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            config.jwt_secret = secret;
        }
        if let Some(ttl) = parse_env("TENANCY_TOKEN_TTL_SECONDS")? {
            config.token_ttl_seconds = ttl;
        }
        if let Ok(url) = std::env::var("TENANCY_JWKS_URL") {
            config.jwks_url = Some(url);
        }
        if let Ok(issuer) = std::env::var("TENANCY_JWT_ISSUER") {
            config.issuer = Some(issuer);
        }
        if let Ok(audience) = std::env::var("TENANCY_JWT_AUDIENCE") {
            config.audience = Some(audience);
        }
        if let Some(ttl) = parse_env("TENANCY_JWKS_CACHE_TTL_SECONDS")? {
            config.jwks_cache_ttl_seconds = ttl;
        }
        if let Some(timeout) = parse_env("TENANCY_JWKS_FETCH_TIMEOUT_SECONDS")? {
            config.jwks_fetch_timeout_seconds = timeout;
        }

        Ok(config)
    }
}

/// Organization and membership policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrganizationsConfig {
    /// Name given to the organization created alongside a new profile
    #[validate(length(min = 1, max = 255, message = "Default organization name must be 1-255 characters"))]
    pub default_organization_name: String,

    /// Minimum role to invite, re-role or remove members
    pub manage_members_role: Role,

    pub rename_organization_role: Role,

    pub delete_organization_role: Role,

    /// Reject demoting or removing the final owner of an organization
    pub protect_last_owner: bool,

    /// Bind email invitations to a profile when it signs up with that email
    pub reconcile_invitations: bool,
}

impl Default for OrganizationsConfig {
    fn default() -> Self {
        Self {
            default_organization_name: "My Organization".to_string(),
            manage_members_role: Role::Admin,
            rename_organization_role: Role::Admin,
            delete_organization_role: Role::Admin,
            protect_last_owner: true,
            reconcile_invitations: true,
        }
    }
}

impl OrganizationsConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            default_organization_name: std::env::var("TENANCY_DEFAULT_ORGANIZATION_NAME")
                .unwrap_or(defaults.default_organization_name),
            manage_members_role: parse_env("TENANCY_MANAGE_MEMBERS_ROLE")?
                .unwrap_or(defaults.manage_members_role),
            rename_organization_role: parse_env("TENANCY_RENAME_ORGANIZATION_ROLE")?
                .unwrap_or(defaults.rename_organization_role),
            delete_organization_role: parse_env("TENANCY_DELETE_ORGANIZATION_ROLE")?
                .unwrap_or(defaults.delete_organization_role),
            protect_last_owner: std::env::var("TENANCY_PROTECT_LAST_OWNER")
                .map(|s| s.to_lowercase() == "true" || s == "1")
                .unwrap_or(defaults.protect_last_owner),
            reconcile_invitations: std::env::var("TENANCY_RECONCILE_INVITATIONS")
                .map(|s| s.to_lowercase() == "true" || s == "1")
                .unwrap_or(defaults.reconcile_invitations),
        })
    }
}

/// Parse an optional environment variable, failing loudly on malformed values.
fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| TenancyError::validation_field(format!("Invalid {}: {}", key, e), key)),
        Err(_) => Ok(None),
    }
}
