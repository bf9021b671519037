//! Organization and membership domain models.
//!
//! A membership links an organization either to a registered profile or to a
//! bare email address (an invitation for someone who has not signed up yet).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use crate::domain::profile::normalize_email;
use crate::domain::{MembershipId, OrgId, ProfileId, Role};
use crate::errors::TenancyError;

/// Represents an organization in the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A role grant inside an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: MembershipId,
    pub organization_id: OrgId,
    /// Set once the member has a profile; `None` for pending invitations
    pub profile_id: Option<ProfileId>,
    /// Invited email for placeholders, the profile's email for bound members
    pub email: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    /// Whether this membership is an email-only invitation.
    pub fn is_placeholder(&self) -> bool {
        self.profile_id.is_none()
    }
}

/// Request to create or rename an organization.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationNameRequest {
    #[validate(length(min = 1, max = 255, message = "Organization name must be 1-255 characters"))]
    pub name: String,
}

impl OrganizationNameRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into().trim().to_string() }
    }
}

/// Request to grant a role to an email address.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetMemberRoleRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub role: Role,
}

/// Target of a member removal: a profile id or an email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberIdentifier {
    Profile(ProfileId),
    Email(String),
}

impl FromStr for MemberIdentifier {
    type Err = TenancyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = ProfileId::parse(s.trim()) {
            return Ok(MemberIdentifier::Profile(id));
        }
        normalize_email(s).map(MemberIdentifier::Email).map_err(|_| {
            TenancyError::validation_field(
                format!("'{}' is neither a profile id nor an email address", s),
                "identifier",
            )
        })
    }
}

impl std::fmt::Display for MemberIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberIdentifier::Profile(id) => write!(f, "{}", id),
            MemberIdentifier::Email(email) => write!(f, "{}", email),
        }
    }
}
