//! # REST API Components
//!
//! HTTP routing, authentication middleware wiring and request/response
//! handling for profiles and organizations.

pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use extract::ApiJson;
pub use routes::build_router;
pub use server::start_api_server;

use crate::auth::{build_auth_provider, SharedAuthProvider};
use crate::config::AppConfig;
use crate::errors::Result;
use crate::services::{MembershipService, ProvisioningService};
use crate::storage::DbPool;

/// Shared state handed to every handler and to the authentication middleware.
#[derive(Clone)]
pub struct AppState {
    pub auth: SharedAuthProvider,
    pub provisioning: ProvisioningService,
    pub membership: MembershipService,
    pub pool: DbPool,
}

impl AppState {
    /// Build the auth provider and services from configuration.
    pub fn new(config: &AppConfig, pool: DbPool) -> Result<Self> {
        let auth = build_auth_provider(&config.auth)?;
        Ok(Self::with_provider(config, pool, auth))
    }

    pub fn with_provider(config: &AppConfig, pool: DbPool, auth: SharedAuthProvider) -> Self {
        Self {
            auth,
            provisioning: ProvisioningService::with_pool(pool.clone(), &config.organizations),
            membership: MembershipService::with_pool(pool.clone(), config.organizations.clone()),
            pool,
        }
    }
}
