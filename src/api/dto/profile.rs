use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Profile, ProfileUpdate};

/// Profile as returned to its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub is_subscribed_to_newsletter: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl From<Profile> for ProfileDto {
    fn from(profile: Profile) -> Self {
        Self {
            is_subscribed_to_newsletter: profile.is_subscribed_to_newsletter(),
            id: profile.id.into_string(),
            email: profile.email,
            name: profile.name,
            avatar_url: profile.avatar_url,
            created_at: profile.created_at,
            last_seen_at: profile.last_seen_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileBody {
    #[serde(default)]
    pub is_subscribed_to_newsletter: Option<bool>,
}

impl From<UpdateProfileBody> for ProfileUpdate {
    fn from(body: UpdateProfileBody) -> Self {
        ProfileUpdate { is_subscribed_to_newsletter: body.is_subscribed_to_newsletter }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProfileId;

    #[test]
    fn profile_dto_uses_camel_case() {
        let now = Utc::now();
        let dto = ProfileDto::from(Profile {
            id: ProfileId::new(),
            auth_subject_id: "sub-1".into(),
            email: "a@example.com".into(),
            name: None,
            avatar_url: Some("https://example.com/a.png".into()),
            subscribed_to_newsletter_at: Some(now),
            created_at: now,
            updated_at: now,
            last_seen_at: now,
        });

        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["isSubscribedToNewsletter"], true);
        assert_eq!(json["avatarUrl"], "https://example.com/a.png");
        assert!(json.get("name").is_none());
        assert!(json.get("authSubjectId").is_none());
    }

    #[test]
    fn empty_update_body_is_accepted() {
        let body: UpdateProfileBody = serde_json::from_str("{}").unwrap();
        assert_eq!(ProfileUpdate::from(body).is_subscribed_to_newsletter, None);
    }
}
