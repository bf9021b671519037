//! Profile provisioning service
//!
//! Resolves a verified identity to a local profile, creating the profile, its
//! default organization and the owner membership on first contact.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::auth::IdentityToken;
use crate::config::OrganizationsConfig;
use crate::domain::{normalize_email, NewProfile, Profile, ProfileId, ProfileUpdate};
use crate::errors::{Result, TenancyError};
use crate::storage::{DbPool, ProfileRepository, SqlxProfileRepository};

/// Service owning the profile lifecycle
#[derive(Clone)]
pub struct ProvisioningService {
    profiles: Arc<dyn ProfileRepository>,
    default_organization_name: String,
    reconcile_invitations: bool,
}

impl ProvisioningService {
    pub fn new(profiles: Arc<dyn ProfileRepository>, config: &OrganizationsConfig) -> Self {
        Self {
            profiles,
            default_organization_name: config.default_organization_name.clone(),
            reconcile_invitations: config.reconcile_invitations,
        }
    }

    pub fn with_pool(pool: DbPool, config: &OrganizationsConfig) -> Self {
        Self::new(Arc::new(SqlxProfileRepository::new(pool)), config)
    }

    /// Return the caller's profile, provisioning it on first authentication.
    #[instrument(skip(self, identity), fields(subject = %identity.subject_id), name = "ensure_profile")]
    pub async fn ensure_profile(&self, identity: &IdentityToken) -> Result<Profile> {
        if let Some(existing) = self.profiles.find_by_subject(&identity.subject_id).await? {
            return self.profiles.touch_last_seen(&existing.id).await;
        }

        let email = identity.email.as_deref().ok_or_else(|| {
            TenancyError::validation_field("Identity token carries no email address", "email")
        })?;

        let new_profile = NewProfile {
            id: ProfileId::new(),
            auth_subject_id: identity.subject_id.clone(),
            email: normalize_email(email)?,
            name: identity.name.clone(),
            avatar_url: identity.picture_url.clone(),
        };

        match self
            .profiles
            .provision(new_profile, &self.default_organization_name, self.reconcile_invitations)
            .await
        {
            Ok(provisioned) => {
                info!(
                    profile_id = %provisioned.profile.id,
                    organization_id = %provisioned.organization.id,
                    reconciled_invitations = provisioned.reconciled_invitations,
                    "Provisioned new profile"
                );
                Ok(provisioned.profile)
            }
            Err(TenancyError::Conflict { .. }) => {
                // Either a concurrent request for the same subject won, or the
                // email belongs to a different subject.
                match self.profiles.find_by_subject(&identity.subject_id).await? {
                    Some(winner) => Ok(winner),
                    None => {
                        warn!("Email already registered to a different subject");
                        Err(TenancyError::conflict(
                            "Email address is already registered to another account",
                            "Profile",
                        ))
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_profile(&self, id: &ProfileId) -> Result<Profile> {
        self.profiles
            .find_by_id(id)
            .await?
            .ok_or_else(|| TenancyError::not_found("Profile", id.as_str()))
    }

    /// Apply a partial update. Subscribing keeps an existing subscription timestamp.
    #[instrument(skip(self, update), fields(profile_id = %id), name = "update_profile")]
    pub async fn update_profile(&self, id: &ProfileId, update: ProfileUpdate) -> Result<Profile> {
        let current = self.get_profile(id).await?;

        match update.is_subscribed_to_newsletter {
            Some(true) if !current.is_subscribed_to_newsletter() => {
                self.profiles.set_newsletter_subscription(id, Some(Utc::now())).await
            }
            Some(false) if current.is_subscribed_to_newsletter() => {
                self.profiles.set_newsletter_subscription(id, None).await
            }
            _ => Ok(current),
        }
    }

    #[instrument(skip(self), fields(profile_id = %id), name = "delete_profile")]
    pub async fn delete_profile(&self, id: &ProfileId) -> Result<()> {
        self.profiles.delete(id).await?;
        info!(profile_id = %id, "Profile deleted");
        Ok(())
    }
}
