//! Profile domain models.
//!
//! A profile is the local account record for an authenticated subject. It is
//! keyed both by the identity provider's subject id and by email.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::domain::ProfileId;
use crate::errors::{Result, TenancyError};

/// Stored profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: ProfileId,
    pub auth_subject_id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub subscribed_to_newsletter_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_subscribed_to_newsletter(&self) -> bool {
        self.subscribed_to_newsletter_at.is_some()
    }
}

/// Insert payload for a first-time subject.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: ProfileId,
    pub auth_subject_id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Partial update of the caller-editable profile fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub is_subscribed_to_newsletter: Option<bool>,
}

/// Trim and lowercase an email address, rejecting values that are not emails.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if !email.validate_email() {
        return Err(TenancyError::validation_field(format!("Invalid email address: {}", raw), "email"));
    }
    Ok(email)
}
