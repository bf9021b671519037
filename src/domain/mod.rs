//! Domain layer
//!
//! Pure domain entities for the account backend: identifiers, roles,
//! profiles, organizations and memberships. Nothing here talks to the
//! database or the network.

pub mod id;
pub mod organization;
pub mod profile;
pub mod role;

pub use id::{MembershipId, OrgId, ProfileId};
pub use organization::{
    MemberIdentifier, Membership, Organization, OrganizationNameRequest, SetMemberRoleRequest,
};
pub use profile::{normalize_email, NewProfile, Profile, ProfileUpdate};
pub use role::{Role, RoleParseError};
