//! HTTP request handlers organized by resource type

pub mod health;
pub mod organizations;
pub mod profile;

pub use health::health_handler;
pub use organizations::{
    create_organization_handler, delete_organization_handler, list_members_handler,
    list_organizations_handler, remove_member_handler, rename_organization_handler,
    set_member_role_handler,
};
pub use profile::{
    delete_profile_handler, ensure_profile_handler, get_profile_handler, update_profile_handler,
};
