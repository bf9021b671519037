//! Bearer verification abstraction.
//!
//! The active provider is chosen once from [`AuthConfig`] at startup and
//! shared as `Arc<dyn AuthProvider>` for the lifetime of the process.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::federated::FederatedProvider;
use crate::auth::identity::IdentityToken;
use crate::auth::local::LocalSignedProvider;
use crate::auth::models::AuthError;
use crate::config::{AuthConfig, AuthProviderKind};
use crate::errors::Result;

/// Turns an `Authorization` header value into a verified identity.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn verify(&self, authorization_header: &str) -> std::result::Result<IdentityToken, AuthError>;

    fn kind(&self) -> AuthProviderKind;
}

pub type SharedAuthProvider = Arc<dyn AuthProvider>;

/// Construct the configured provider.
pub fn build_auth_provider(config: &AuthConfig) -> Result<SharedAuthProvider> {
    match config.provider {
        AuthProviderKind::Local => Ok(Arc::new(LocalSignedProvider::from_config(config))),
        AuthProviderKind::Federated => Ok(Arc::new(FederatedProvider::from_config(config)?)),
    }
}

/// Extract the token from a `Bearer <token>` header value.
pub fn bearer_token(header: &str) -> std::result::Result<&str, AuthError> {
    let header = header.trim();
    if header.is_empty() {
        return Err(AuthError::MissingBearer);
    }

    let (scheme, token) = header.split_once(' ').ok_or(AuthError::MalformedBearer)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedBearer);
    }

    Ok(token)
}
