//! # Observability Infrastructure
//!
//! Structured logging for the tenancy backend.

pub mod logging;

pub use logging::{init_logging, log_config_info};
