//! Organization membership service
//!
//! Every mutation first resolves the caller's role in the target organization
//! and compares it with the configured threshold for the operation. A missing
//! organization is reported as not found; a caller without a membership, or
//! with too low a role, is forbidden. Member changes are further capped at
//! the caller's own role: nobody grants, demotes or removes above their rank.

use std::sync::Arc;

use tracing::{info, instrument};
use validator::Validate;

use crate::config::OrganizationsConfig;
use crate::domain::{
    normalize_email, MemberIdentifier, Membership, OrgId, Organization, OrganizationNameRequest,
    ProfileId, Role,
};
use crate::errors::{Result, TenancyError};
use crate::storage::{
    DbPool, MembershipRepository, OrganizationRepository, ProfileRepository,
    SqlxMembershipRepository, SqlxOrganizationRepository, SqlxProfileRepository,
};

/// Service for organization and membership management
#[derive(Clone)]
pub struct MembershipService {
    organizations: Arc<dyn OrganizationRepository>,
    memberships: Arc<dyn MembershipRepository>,
    profiles: Arc<dyn ProfileRepository>,
    policy: OrganizationsConfig,
}

impl MembershipService {
    pub fn new(
        organizations: Arc<dyn OrganizationRepository>,
        memberships: Arc<dyn MembershipRepository>,
        profiles: Arc<dyn ProfileRepository>,
        policy: OrganizationsConfig,
    ) -> Self {
        Self { organizations, memberships, profiles, policy }
    }

    pub fn with_pool(pool: DbPool, policy: OrganizationsConfig) -> Self {
        Self::new(
            Arc::new(SqlxOrganizationRepository::new(pool.clone())),
            Arc::new(SqlxMembershipRepository::new(pool.clone())),
            Arc::new(SqlxProfileRepository::new(pool)),
            policy,
        )
    }

    /// Resolve the organization and check the caller holds at least `required`.
    async fn authorize(
        &self,
        caller: &ProfileId,
        org_id: &OrgId,
        required: Role,
    ) -> Result<(Organization, Role)> {
        let organization = self
            .organizations
            .find_by_id(org_id)
            .await?
            .ok_or_else(|| TenancyError::not_found("Organization", org_id.as_str()))?;

        let role = self
            .memberships
            .find_role(org_id, caller)
            .await?
            .ok_or_else(|| TenancyError::forbidden("Not a member of this organization"))?;

        if !role.at_least(required) {
            return Err(TenancyError::forbidden(format!(
                "Role '{}' or higher is required, caller has '{}'",
                required, role
            )));
        }

        Ok((organization, role))
    }

    /// Role held by the registered member behind `email`, if any.
    async fn member_role_by_email(&self, org_id: &OrgId, email: &str) -> Result<Option<Role>> {
        match self.profiles.find_by_email(email).await? {
            Some(profile) => self.memberships.find_role(org_id, &profile.id).await,
            None => Ok(None),
        }
    }

    fn ensure_within_rank(caller_role: Role, target: Role) -> Result<()> {
        if caller_role.at_least(target) {
            Ok(())
        } else {
            Err(TenancyError::forbidden(format!(
                "Role '{}' cannot act on role '{}'",
                caller_role, target
            )))
        }
    }

    fn validated_name(name: &str) -> Result<String> {
        let request = OrganizationNameRequest::new(name);
        request.validate()?;
        Ok(request.name)
    }

    #[instrument(skip(self), fields(owner = %owner), name = "create_organization")]
    pub async fn create_organization(&self, owner: &ProfileId, name: &str) -> Result<Organization> {
        let name = Self::validated_name(name)?;
        let organization = self.organizations.create_with_owner(&name, owner).await?;
        info!(organization_id = %organization.id, "Organization created");
        Ok(organization)
    }

    #[instrument(skip(self), fields(caller = %caller, org_id = %org_id), name = "rename_organization")]
    pub async fn rename_organization(
        &self,
        caller: &ProfileId,
        org_id: &OrgId,
        name: &str,
    ) -> Result<Organization> {
        let name = Self::validated_name(name)?;
        self.authorize(caller, org_id, self.policy.rename_organization_role).await?;
        self.organizations.rename(org_id, &name).await
    }

    pub async fn list_organizations(&self, profile_id: &ProfileId) -> Result<Vec<Organization>> {
        self.organizations.list_for_profile(profile_id).await
    }

    /// Members of an organization; readable by any member.
    pub async fn list_members(&self, caller: &ProfileId, org_id: &OrgId) -> Result<Vec<Membership>> {
        self.authorize(caller, org_id, Role::Lurker).await?;
        self.memberships.list_members(org_id).await
    }

    #[instrument(skip(self, email), fields(caller = %caller, org_id = %org_id, role = %role), name = "set_member_role")]
    pub async fn set_member_role(
        &self,
        caller: &ProfileId,
        org_id: &OrgId,
        email: &str,
        role: Role,
    ) -> Result<Membership> {
        let email = normalize_email(email)?;
        let (_, caller_role) =
            self.authorize(caller, org_id, self.policy.manage_members_role).await?;
        Self::ensure_within_rank(caller_role, role)?;
        if let Some(current) = self.member_role_by_email(org_id, &email).await? {
            Self::ensure_within_rank(caller_role, current)?;
        }

        let membership = self
            .memberships
            .grant_role(org_id, &email, role, self.policy.protect_last_owner)
            .await?;
        info!(
            membership_id = %membership.id,
            placeholder = membership.is_placeholder(),
            "Member role set"
        );
        Ok(membership)
    }

    #[instrument(skip(self), fields(caller = %caller, org_id = %org_id, identifier = %identifier), name = "remove_member")]
    pub async fn remove_member(
        &self,
        caller: &ProfileId,
        org_id: &OrgId,
        identifier: &MemberIdentifier,
    ) -> Result<()> {
        let (_, caller_role) =
            self.authorize(caller, org_id, self.policy.manage_members_role).await?;
        let current = match identifier {
            MemberIdentifier::Profile(profile_id) => {
                self.memberships.find_role(org_id, profile_id).await?
            }
            MemberIdentifier::Email(email) => self.member_role_by_email(org_id, email).await?,
        };
        if let Some(current) = current {
            Self::ensure_within_rank(caller_role, current)?;
        }
        self.memberships.remove(org_id, identifier, self.policy.protect_last_owner).await
    }

    #[instrument(skip(self), fields(caller = %caller, org_id = %org_id), name = "delete_organization")]
    pub async fn delete_organization(&self, caller: &ProfileId, org_id: &OrgId) -> Result<()> {
        self.authorize(caller, org_id, self.policy.delete_organization_role).await?;
        self.organizations.delete(org_id).await?;
        info!("Organization deleted");
        Ok(())
    }
}
