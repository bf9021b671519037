//! Organization and membership API handlers.
//!
//! Every handler acts on behalf of the authenticated caller; role checks are
//! enforced by [`crate::services::MembershipService`].

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;
use validator::Validate;

use crate::{
    api::{
        dto::{MemberDto, OrganizationDto, OrganizationNameBody},
        error::ApiError,
        ApiJson, AppState,
    },
    auth::CallerContext,
    domain::{MemberIdentifier, OrgId, SetMemberRoleRequest},
    errors::TenancyError,
};

/// Malformed ids cannot name an existing organization, so they are reported as missing.
fn parse_org_id(raw: &str) -> Result<OrgId, ApiError> {
    OrgId::parse(raw).map_err(|_| ApiError::from(TenancyError::not_found("Organization", raw)))
}

#[instrument(skip(state, context, body), fields(caller = %context.profile.id), name = "create_organization_handler")]
pub async fn create_organization_handler(
    State(state): State<AppState>,
    Extension(context): Extension<CallerContext>,
    ApiJson(body): ApiJson<OrganizationNameBody>,
) -> Result<Json<OrganizationDto>, ApiError> {
    let organization =
        state.membership.create_organization(&context.profile.id, &body.name).await?;
    Ok(Json(OrganizationDto::from(organization)))
}

#[instrument(skip(state, context), fields(caller = %context.profile.id), name = "list_organizations_handler")]
pub async fn list_organizations_handler(
    State(state): State<AppState>,
    Extension(context): Extension<CallerContext>,
) -> Result<Json<Vec<OrganizationDto>>, ApiError> {
    let organizations = state.membership.list_organizations(&context.profile.id).await?;
    Ok(Json(organizations.into_iter().map(OrganizationDto::from).collect()))
}

#[instrument(skip(state, context, body), fields(caller = %context.profile.id, org_id = %org_id), name = "rename_organization_handler")]
pub async fn rename_organization_handler(
    State(state): State<AppState>,
    Extension(context): Extension<CallerContext>,
    Path(org_id): Path<String>,
    ApiJson(body): ApiJson<OrganizationNameBody>,
) -> Result<Json<OrganizationDto>, ApiError> {
    let org_id = parse_org_id(&org_id)?;
    let organization =
        state.membership.rename_organization(&context.profile.id, &org_id, &body.name).await?;
    Ok(Json(OrganizationDto::from(organization)))
}

#[instrument(skip(state, context), fields(caller = %context.profile.id, org_id = %org_id), name = "delete_organization_handler")]
pub async fn delete_organization_handler(
    State(state): State<AppState>,
    Extension(context): Extension<CallerContext>,
    Path(org_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let org_id = parse_org_id(&org_id)?;
    state.membership.delete_organization(&context.profile.id, &org_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, context), fields(caller = %context.profile.id, org_id = %org_id), name = "list_members_handler")]
pub async fn list_members_handler(
    State(state): State<AppState>,
    Extension(context): Extension<CallerContext>,
    Path(org_id): Path<String>,
) -> Result<Json<Vec<MemberDto>>, ApiError> {
    let org_id = parse_org_id(&org_id)?;
    let members = state.membership.list_members(&context.profile.id, &org_id).await?;
    Ok(Json(members.into_iter().map(MemberDto::from).collect()))
}

#[instrument(skip(state, context, request), fields(caller = %context.profile.id, org_id = %org_id), name = "set_member_role_handler")]
pub async fn set_member_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<CallerContext>,
    Path(org_id): Path<String>,
    ApiJson(request): ApiJson<SetMemberRoleRequest>,
) -> Result<Json<MemberDto>, ApiError> {
    request.validate().map_err(TenancyError::from)?;
    let org_id = parse_org_id(&org_id)?;

    let membership = state
        .membership
        .set_member_role(&context.profile.id, &org_id, &request.email, request.role)
        .await?;
    Ok(Json(MemberDto::from(membership)))
}

#[instrument(skip(state, context), fields(caller = %context.profile.id, org_id = %org_id, identifier = %identifier), name = "remove_member_handler")]
pub async fn remove_member_handler(
    State(state): State<AppState>,
    Extension(context): Extension<CallerContext>,
    Path((org_id, identifier)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let org_id = parse_org_id(&org_id)?;
    let identifier: MemberIdentifier = identifier.parse()?;

    state.membership.remove_member(&context.profile.id, &org_id, &identifier).await?;
    Ok(StatusCode::NO_CONTENT)
}
