//! Axum middleware for authentication and profile resolution.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::{field, warn, Instrument};

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::auth::models::CallerContext;

/// Verifies the bearer token, resolves the caller's profile and stores a
/// [`CallerContext`] in the request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let correlation_id = uuid::Uuid::new_v4();
    let span = crate::request_span!(
        method,
        path,
        auth.subject = field::Empty,
        correlation_id = %correlation_id
    );

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    let context = async {
        let identity = state.auth.verify(&header).await.map_err(|err| {
            warn!(%correlation_id, error = %err, "authentication failed");
            ApiError::from(err)
        })?;
        tracing::Span::current().record("auth.subject", field::display(&identity.subject_id));

        let profile = state.provisioning.ensure_profile(&identity).await.map_err(|err| {
            warn!(%correlation_id, error = %err, "profile resolution failed");
            ApiError::from(err)
        })?;
        tracing::Span::current().record("profile_id", field::display(&profile.id));

        Ok::<_, ApiError>(CallerContext { identity, profile })
    }
    .instrument(span)
    .await?;

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
