//! RS256 tokens verified against a remote JSON Web Key Set.
//!
//! Keys are cached per provider instance for `jwks_cache_ttl`. A token whose
//! `kid` is missing from the cached set forces a refresh before it is
//! rejected, at most once per [`MIN_REFRESH_INTERVAL`]. Only one fetch is in
//! flight at a time; concurrent callers wait for it and reuse its result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use crate::auth::identity::{Claims, IdentityToken};
use crate::auth::models::AuthError;
use crate::auth::provider::{bearer_token, AuthProvider};
use crate::config::{AuthConfig, AuthProviderKind};
use crate::errors::{Result, TenancyError};

/// JSON Web Key as published by identity services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    #[serde(rename = "use", default)]
    pub key_use: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
}

/// JSON Web Key Set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn find_by_kid(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    pub fn first(&self) -> Option<&Jwk> {
        self.keys.first()
    }

    fn select(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(kid) => self.find_by_kid(kid),
            None => self.first(),
        }
    }
}

/// Minimum spacing between refreshes triggered by unknown key ids.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

struct CachedKeySet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Verifier for tokens minted by an external identity service.
pub struct FederatedProvider {
    client: Client,
    jwks_url: String,
    validation: Validation,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    cache: RwLock<Option<CachedKeySet>>,
    refresh_lock: Mutex<()>,
}

impl FederatedProvider {
    pub fn new(
        jwks_url: impl Into<String>,
        issuer: Option<&str>,
        audience: Option<&str>,
        cache_ttl: Duration,
        fetch_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(fetch_timeout).build().map_err(|e| {
            TenancyError::config_with_source("Failed to build JWKS HTTP client", Box::new(e))
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            client,
            jwks_url: jwks_url.into(),
            validation,
            cache_ttl,
            min_refresh_interval: MIN_REFRESH_INTERVAL,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let jwks_url = config
            .jwks_url
            .as_deref()
            .ok_or_else(|| TenancyError::config("Federated auth requires a JWKS URL"))?;

        Self::new(
            jwks_url,
            config.issuer.as_deref(),
            config.audience.as_deref(),
            config.jwks_cache_ttl(),
            config.jwks_fetch_timeout(),
        )
    }

    async fn keys_younger_than(&self, max_age: Duration) -> Option<Arc<JwkSet>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < max_age)
            .map(|cached| Arc::clone(&cached.keys))
    }

    /// Returns a key set fetched within `max_age`, fetching one if needed.
    async fn refresh_keys(&self, max_age: Duration) -> std::result::Result<Arc<JwkSet>, AuthError> {
        let _guard = self.refresh_lock.lock().await;
        if let Some(keys) = self.keys_younger_than(max_age).await {
            return Ok(keys);
        }

        let keys = Arc::new(self.fetch_keys().await?);
        let mut cache = self.cache.write().await;
        *cache = Some(CachedKeySet { keys: Arc::clone(&keys), fetched_at: Instant::now() });
        Ok(keys)
    }

    #[instrument(skip(self), fields(jwks_url = %self.jwks_url), name = "jwks_refresh")]
    async fn fetch_keys(&self) -> std::result::Result<JwkSet, AuthError> {
        let response = self.client.get(&self.jwks_url).send().await.map_err(|e| {
            warn!(error = %e, "JWKS request failed");
            AuthError::KeySetUnavailable(e.to_string())
        })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "JWKS endpoint returned an error status");
            return Err(AuthError::KeySetUnavailable(format!(
                "JWKS endpoint returned status: {}",
                response.status()
            )));
        }

        let keys: JwkSet = response.json().await.map_err(|e| {
            AuthError::KeySetUnavailable(format!("Failed to parse JWKS: {}", e))
        })?;
        debug!(key_count = keys.keys.len(), "JWKS refreshed");
        Ok(keys)
    }

    async fn signing_key(&self, kid: Option<&str>) -> std::result::Result<Jwk, AuthError> {
        let keys = match self.keys_younger_than(self.cache_ttl).await {
            Some(keys) => keys,
            None => self.refresh_keys(self.cache_ttl).await?,
        };
        if let Some(jwk) = keys.select(kid) {
            return Ok(jwk.clone());
        }

        debug!(kid = ?kid, "Unknown key id, refreshing JWKS");
        let keys = self.refresh_keys(self.min_refresh_interval).await?;
        keys.select(kid).cloned().ok_or_else(|| unknown_key(kid))
    }
}

fn unknown_key(kid: Option<&str>) -> AuthError {
    match kid {
        Some(kid) => AuthError::InvalidToken(format!("unknown signing key '{}'", kid)),
        None => AuthError::InvalidToken("no signing keys published".to_string()),
    }
}

fn decoding_key(jwk: &Jwk) -> std::result::Result<DecodingKey, AuthError> {
    match (jwk.kty.as_str(), jwk.n.as_deref(), jwk.e.as_deref()) {
        ("RSA", Some(n), Some(e)) => DecodingKey::from_rsa_components(n, e).map_err(AuthError::from),
        _ => Err(AuthError::InvalidToken(format!("unsupported key type '{}'", jwk.kty))),
    }
}

#[async_trait]
impl AuthProvider for FederatedProvider {
    async fn verify(&self, authorization_header: &str) -> std::result::Result<IdentityToken, AuthError> {
        let token = bearer_token(authorization_header)?;

        let header = decode_header(token)?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken(format!("unsupported algorithm {:?}", header.alg)));
        }

        let jwk = self.signing_key(header.kid.as_deref()).await?;
        let key = decoding_key(&jwk)?;
        let data = decode::<Claims>(token, &key, &self.validation)?;
        IdentityToken::from_claims(data.claims)
    }

    fn kind(&self) -> AuthProviderKind {
        AuthProviderKind::Federated
    }
}
