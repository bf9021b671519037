//! Request extractors that report failures as [`ApiError`] JSON bodies.

use axum::extract::FromRequest;

use crate::api::error::ApiError;

/// `Json<T>` whose rejections render through [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
