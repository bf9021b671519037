//! Verified identity claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::models::AuthError;

/// Wire claims shared by locally issued and federated tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (provider user id)
    #[serde(default)]
    pub sub: String,
    /// Expiration time, seconds since the epoch
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// Claim set of a bearer credential whose signature and expiry were verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityToken {
    pub subject_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture_url: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl IdentityToken {
    /// Build an identity from decoded claims. The signature must already have
    /// been checked; this enforces the non-empty subject and a future expiry.
    pub fn from_claims(claims: Claims) -> Result<Self, AuthError> {
        let subject_id = claims.sub.trim().to_string();
        if subject_id.is_empty() {
            return Err(AuthError::EmptySubject);
        }

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::InvalidToken("expiry out of range".to_string()))?;
        if expires_at <= Utc::now() {
            return Err(AuthError::ExpiredToken);
        }

        Ok(Self {
            subject_id,
            email: non_empty(claims.email),
            name: non_empty(claims.name),
            picture_url: non_empty(claims.picture),
            expires_at,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str, exp: i64) -> Claims {
        Claims {
            sub: sub.to_string(),
            exp,
            iat: None,
            email: Some("a@example.com".into()),
            name: Some("  ".into()),
            picture: None,
        }
    }

    #[test]
    fn builds_identity_from_valid_claims() {
        let exp = Utc::now().timestamp() + 600;
        let identity = IdentityToken::from_claims(claims("user-1", exp)).unwrap();
        assert_eq!(identity.subject_id, "user-1");
        assert_eq!(identity.email.as_deref(), Some("a@example.com"));
        assert_eq!(identity.name, None);
        assert_eq!(identity.expires_at.timestamp(), exp);
    }

    #[test]
    fn rejects_blank_subject() {
        let exp = Utc::now().timestamp() + 600;
        let err = IdentityToken::from_claims(claims("   ", exp)).unwrap_err();
        assert!(matches!(err, AuthError::EmptySubject));
    }

    #[test]
    fn rejects_past_expiry() {
        let exp = Utc::now().timestamp() - 1;
        let err = IdentityToken::from_claims(claims("user-1", exp)).unwrap_err();
        assert!(matches!(err, AuthError::ExpiredToken));
    }

    #[test]
    fn missing_subject_deserializes_as_empty() {
        let claims: Claims = serde_json::from_str(r#"{"exp": 10}"#).unwrap();
        assert!(claims.sub.is_empty());
    }
}
