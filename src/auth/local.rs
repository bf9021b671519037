//! HS256 tokens signed with a shared secret.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::identity::{Claims, IdentityToken};
use crate::auth::models::AuthError;
use crate::auth::provider::{bearer_token, AuthProvider};
use crate::config::{AuthConfig, AuthProviderKind};

/// Issues and verifies self-signed tokens.
pub struct LocalSignedProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
}

impl LocalSignedProvider {
    pub fn new(secret: &[u8], token_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            token_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.as_bytes(), config.token_ttl())
    }

    /// Issue a token for `subject` valid for the configured TTL.
    pub fn issue_token(
        &self,
        subject: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            exp: now + self.token_ttl.as_secs() as i64,
            iat: Some(now),
            email: email.map(str::to_string),
            name: name.map(str::to_string),
            picture: None,
        };
        self.sign(&claims)
    }

    /// Sign arbitrary claims.
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(AuthError::from)
    }

    fn decode_token(&self, token: &str) -> Result<IdentityToken, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        IdentityToken::from_claims(data.claims)
    }
}

#[async_trait]
impl AuthProvider for LocalSignedProvider {
    async fn verify(&self, authorization_header: &str) -> Result<IdentityToken, AuthError> {
        let token = bearer_token(authorization_header)?;
        self.decode_token(token)
    }

    fn kind(&self) -> AuthProviderKind {
        AuthProviderKind::Local
    }
}
