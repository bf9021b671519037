//! Data Transfer Objects (DTOs) for API layer
//!
//! DTOs define the external JSON contract and stay separate from the domain
//! entities so the wire format can evolve independently. Field names are
//! camelCase on the wire.

pub mod organization;
pub mod profile;

pub use organization::{MemberDto, OrganizationDto, OrganizationNameBody};
pub use profile::{ProfileDto, UpdateProfileBody};
