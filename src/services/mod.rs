//! Business logic services
//!
//! Profile provisioning and organization membership, separated from HTTP
//! concerns.

pub mod membership;
pub mod provisioning;

pub use membership::MembershipService;
pub use provisioning::ProvisioningService;
