//! Organization roles.
//!
//! Roles are ordered capability levels. The derive order below is the
//! privilege order, so `Role::Lurker < Role::Owner` holds.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Role of a profile (or invited email) within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access
    Lurker,
    /// Can modify organization content
    Editor,
    /// Can manage members and organization settings
    Admin,
    /// Full control over the organization
    Owner,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Lurker, Role::Editor, Role::Admin, Role::Owner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Lurker => "lurker",
            Role::Editor => "editor",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Whether this role grants at least the capabilities of `required`.
    pub fn at_least(&self, required: Role) -> bool {
        *self >= required
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lurker" => Ok(Role::Lurker),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid organization role: {0}")]
pub struct RoleParseError(pub String);
