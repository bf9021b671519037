//! Authentication module entry point.
//!
//! Bearer tokens are verified by a pluggable [`AuthProvider`]: a locally
//! signed HS256 provider for development and self-hosted deployments, or a
//! federated RS256 provider that validates against a remote JWKS document.
//! The [`middleware`] turns a verified identity into a [`CallerContext`].

pub mod federated;
pub mod identity;
pub mod local;
pub mod middleware;
pub mod models;
pub mod provider;

pub use federated::{FederatedProvider, Jwk, JwkSet};
pub use identity::{Claims, IdentityToken};
pub use local::LocalSignedProvider;
pub use models::{AuthError, CallerContext};
pub use provider::{bearer_token, build_auth_provider, AuthProvider, SharedAuthProvider};
