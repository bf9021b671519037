use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Membership, Organization, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationDto {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Organization> for OrganizationDto {
    fn from(org: Organization) -> Self {
        Self {
            id: org.id.into_string(),
            name: org.name,
            created_at: org.created_at,
            updated_at: org.updated_at,
        }
    }
}

/// Body for creating or renaming an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationNameBody {
    pub name: String,
}

/// One membership row. `pending` is true for invitations that are not yet
/// bound to a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    pub pending: bool,
}

impl From<Membership> for MemberDto {
    fn from(membership: Membership) -> Self {
        Self {
            pending: membership.is_placeholder(),
            id: membership.id.into_string(),
            profile_id: membership.profile_id.map(|id| id.into_string()),
            email: membership.email,
            role: membership.role,
        }
    }
}
