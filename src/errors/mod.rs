//! # Error Handling
//!
//! Crate-wide error taxonomy. Every fallible operation in the core returns
//! [`Result`], and the API layer turns [`TenancyError`] into an HTTP status.

pub mod types;

pub use types::{AuthErrorType, Result, TenancyError};
