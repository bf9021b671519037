//! # Tenancy
//!
//! Multi-tenant account backend. Callers authenticate with a bearer token,
//! verified either with a locally held HS256 secret or against a federated
//! identity provider's JWKS. The first authenticated request provisions a
//! profile together with a default organization the caller owns; from there
//! profiles create organizations and grant each other roles by email.
//!
//! ## Architecture
//!
//! ```text
//! HTTP (axum) → auth middleware → services → repositories (sqlx/SQLite)
//!                    ↓
//!              AuthProvider (local | federated)
//! ```

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::AppConfig;
pub use errors::{Result, TenancyError};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
