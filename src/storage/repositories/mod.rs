//! Repository modules for data access
//!
//! Each repository is a trait with a sqlx-backed implementation holding the pool.

pub mod organization;
pub mod profile;

pub use organization::{
    MembershipRepository, OrganizationRepository, SqlxMembershipRepository,
    SqlxOrganizationRepository,
};
pub use profile::{ProfileRepository, ProvisionedProfile, SqlxProfileRepository};
