//! Handlers for the caller's own profile.
//!
//! The authentication middleware has already provisioned the profile by the
//! time any of these run, so `POST /profile` simply reports it.

use axum::{extract::State, http::StatusCode, Extension, Json};
use tracing::instrument;

use crate::api::dto::{ProfileDto, UpdateProfileBody};
use crate::api::error::ApiError;
use crate::api::{ApiJson, AppState};
use crate::auth::CallerContext;

#[instrument(skip(context), fields(profile_id = %context.profile.id), name = "ensure_profile_handler")]
pub async fn ensure_profile_handler(
    Extension(context): Extension<CallerContext>,
) -> Result<Json<ProfileDto>, ApiError> {
    Ok(Json(ProfileDto::from(context.profile)))
}

#[instrument(skip(state, context), fields(profile_id = %context.profile.id), name = "get_profile_handler")]
pub async fn get_profile_handler(
    State(state): State<AppState>,
    Extension(context): Extension<CallerContext>,
) -> Result<Json<ProfileDto>, ApiError> {
    let profile = state.provisioning.get_profile(&context.profile.id).await?;
    Ok(Json(ProfileDto::from(profile)))
}

#[instrument(skip(state, context, body), fields(profile_id = %context.profile.id), name = "update_profile_handler")]
pub async fn update_profile_handler(
    State(state): State<AppState>,
    Extension(context): Extension<CallerContext>,
    ApiJson(body): ApiJson<UpdateProfileBody>,
) -> Result<Json<ProfileDto>, ApiError> {
    let profile = state.provisioning.update_profile(&context.profile.id, body.into()).await?;
    Ok(Json(ProfileDto::from(profile)))
}

#[instrument(skip(state, context), fields(profile_id = %context.profile.id), name = "delete_profile_handler")]
pub async fn delete_profile_handler(
    State(state): State<AppState>,
    Extension(context): Extension<CallerContext>,
) -> Result<StatusCode, ApiError> {
    state.provisioning.delete_profile(&context.profile.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
