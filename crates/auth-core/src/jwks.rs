//! JWKS key store for Cognito user pools.
//!
//! Fetches each pool's `/.well-known/jwks.json` and caches the resulting key
//! set for a fixed TTL. Every `(region, user pool)` pair gets its own cache
//! entry with the lifecycle empty → populated → stale → replaced. A refresh
//! swaps the whole key set; keys are never merged across fetches.
//!
//! # Concurrency
//!
//! Refreshes are single-flight per pool. Callers that find the cache stale
//! queue on the pool's refresh mutex; the first one fetches and the others
//! re-check freshness once they get the lock, so a burst of requests at
//! expiry costs one fetch.
//!
//! # Failure handling
//!
//! A failed refresh leaves the previous key set in place but does not serve
//! it: the request that needed fresh keys gets `AuthError::KeyFetch`.

use crate::config::{cognito_issuer_url, validate_component};
use crate::error::AuthError;
use crate::metrics::{record_jwks_cache, record_jwks_fetch};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default key set TTL (1 hour).
pub const DEFAULT_KEY_SET_TTL: Duration = Duration::from_secs(3600);

/// Default timeout for the JWKS request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound accepted for the JWKS request timeout.
pub const MAX_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum age of a key set before a forced refresh refetches it.
///
/// Stops tokens with made-up `kid`s from turning into one provider request each.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

const JWKS_PATH: &str = ".well-known/jwks.json";

/// One entry of a JWKS document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SigningKey {
    /// Key ID - the token header's `kid` must match exactly. Keys published
    /// without one can never be selected and are left out of a `KeySet`.
    #[serde(default)]
    pub kid: Option<String>,

    /// Key type ("RSA" for user pool keys).
    pub kty: String,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm (should be "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use ("sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS response body.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    /// List of JSON Web Keys.
    pub keys: Vec<SigningKey>,
}

/// Signing keys from one JWKS fetch, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    keys: Vec<SigningKey>,
}

impl KeySet {
    /// Build a key set from fetched keys.
    ///
    /// Encryption keys (`"use": "enc"`) and keys without a `kid` are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyFetch` if two keys share a `kid`, since key
    /// selection would then be ambiguous.
    pub fn from_keys(keys: Vec<SigningKey>) -> Result<Self, AuthError> {
        let mut seen = HashSet::with_capacity(keys.len());
        let mut signing_keys = Vec::with_capacity(keys.len());

        for key in keys {
            let Some(kid) = key.kid.clone() else {
                tracing::debug!(target: "nb.auth.jwks", kty = %key.kty, "Skipping key without kid");
                continue;
            };

            if !seen.insert(kid.clone()) {
                tracing::error!(target: "nb.auth.jwks", kid = %kid, "Duplicate kid in JWKS");
                return Err(AuthError::KeyFetch(format!(
                    "duplicate kid '{kid}' in key set"
                )));
            }

            if key.key_use.as_deref() == Some("enc") {
                tracing::debug!(target: "nb.auth.jwks", kid = %kid, "Skipping encryption key");
                continue;
            }

            signing_keys.push(key);
        }

        Ok(Self { keys: signing_keys })
    }

    /// Look up a key by exact `kid`.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys
            .iter()
            .find(|key| key.kid.as_deref() == Some(kid))
    }

    /// Number of signing keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set holds no signing keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate over keys in document order.
    pub fn iter(&self) -> impl Iterator<Item = &SigningKey> {
        self.keys.iter()
    }
}

/// Key store tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStoreConfig {
    /// How long a fetched key set is served before it is refetched.
    pub ttl: Duration,

    /// Timeout for the JWKS request.
    pub fetch_timeout: Duration,

    /// Minimum key set age before a forced refresh refetches it.
    pub min_refresh_interval: Duration,

    /// Replaces `https://cognito-idp.<region>.amazonaws.com` when set.
    ///
    /// The JWKS URL becomes `<base>/<user_pool_id>/.well-known/jwks.json`.
    pub provider_base_url: Option<String>,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_KEY_SET_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            provider_base_url: None,
        }
    }
}

/// Cached key set for one pool.
#[derive(Debug, Clone)]
struct CacheState {
    key_set: Arc<KeySet>,
    fetched_at: Instant,
    ttl: Duration,
}

impl CacheState {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.age(now) < self.ttl
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    region: String,
    user_pool_id: String,
}

/// Cache slot and refresh guard for one pool.
#[derive(Default)]
struct PoolCache {
    state: RwLock<Option<CacheState>>,
    refresh_lock: Mutex<()>,
}

impl PoolCache {
    async fn fresh_key_set(&self, now: Instant) -> Option<Arc<KeySet>> {
        let state = self.state.read().await;
        state
            .as_ref()
            .filter(|cached| cached.is_fresh(now))
            .map(|cached| Arc::clone(&cached.key_set))
    }
}

/// Process-wide JWKS cache.
///
/// Share one instance (behind `Arc`) between all verifications in a process.
pub struct KeyStore {
    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    config: KeyStoreConfig,

    /// Per-pool cache slots, created on first use.
    pools: RwLock<HashMap<PoolKey, Arc<PoolCache>>>,
}

impl KeyStore {
    /// Create a key store.
    pub fn new(config: KeyStoreConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                // The per-request timeout in fetch_key_set still applies
                tracing::warn!(target: "nb.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            http_client,
            config,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Create a key store with the default TTL, timeout and provider.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(KeyStoreConfig::default())
    }

    /// Key store settings.
    #[must_use]
    pub fn config(&self) -> &KeyStoreConfig {
        &self.config
    }

    /// JWKS endpoint for a pool.
    #[must_use]
    pub fn jwks_url(&self, region: &str, user_pool_id: &str) -> String {
        match &self.config.provider_base_url {
            Some(base) => format!(
                "{}/{}/{}",
                base.trim_end_matches('/'),
                user_pool_id,
                JWKS_PATH
            ),
            None => format!("{}/{}", cognito_issuer_url(region, user_pool_id), JWKS_PATH),
        }
    }

    /// Get the current key set for a pool, fetching it if the cache is
    /// empty or stale.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` for an empty or invalid region or
    /// pool id, and `AuthError::KeyFetch` if a required fetch fails.
    #[instrument(skip(self), fields(region = %region, user_pool_id = %user_pool_id))]
    pub async fn get_key_set(
        &self,
        region: &str,
        user_pool_id: &str,
    ) -> Result<Arc<KeySet>, AuthError> {
        let pool = self.pool(region, user_pool_id).await?;

        if let Some(key_set) = pool.fresh_key_set(Instant::now()).await {
            tracing::debug!(target: "nb.auth.jwks", "JWKS cache hit");
            record_jwks_cache("hit");
            return Ok(key_set);
        }

        let _refresh = pool.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(key_set) = pool.fresh_key_set(Instant::now()).await {
            tracing::debug!(target: "nb.auth.jwks", "JWKS refreshed by concurrent caller");
            record_jwks_cache("hit");
            return Ok(key_set);
        }

        record_jwks_cache("miss");
        self.refresh_pool(&pool, region, user_pool_id).await
    }

    /// Resolve a single key by `kid` from the pool's current key set.
    ///
    /// # Errors
    ///
    /// Everything [`get_key_set`](Self::get_key_set) returns, plus
    /// `AuthError::KeyNotFound` when no key has this exact `kid`.
    pub async fn get_key(
        &self,
        region: &str,
        user_pool_id: &str,
        kid: &str,
    ) -> Result<SigningKey, AuthError> {
        let key_set = self.get_key_set(region, user_pool_id).await?;

        key_set.get(kid).cloned().ok_or_else(|| {
            tracing::debug!(target: "nb.auth.jwks", kid = %kid, "Key not found in JWKS cache");
            AuthError::KeyNotFound(kid.to_string())
        })
    }

    /// Refetch a pool's key set regardless of its TTL.
    ///
    /// Used after a `kid` miss to pick up a rotated key. A key set younger
    /// than `min_refresh_interval` is returned as-is instead of refetched.
    ///
    /// # Errors
    ///
    /// Same as [`get_key_set`](Self::get_key_set).
    #[instrument(skip(self), fields(region = %region, user_pool_id = %user_pool_id))]
    pub async fn force_refresh(
        &self,
        region: &str,
        user_pool_id: &str,
    ) -> Result<Arc<KeySet>, AuthError> {
        let pool = self.pool(region, user_pool_id).await?;
        let _refresh = pool.refresh_lock.lock().await;

        {
            let now = Instant::now();
            let state = pool.state.read().await;
            if let Some(cached) = state.as_ref() {
                if cached.is_fresh(now) && cached.age(now) < self.config.min_refresh_interval {
                    tracing::debug!(
                        target: "nb.auth.jwks",
                        age = ?cached.age(now),
                        "Skipping forced JWKS refresh, key set is recent"
                    );
                    return Ok(Arc::clone(&cached.key_set));
                }
            }
        }

        record_jwks_cache("forced");
        self.refresh_pool(&pool, region, user_pool_id).await
    }

    /// Drop the cached key set for a pool. The next lookup refetches.
    pub async fn invalidate(&self, region: &str, user_pool_id: &str) {
        let key = PoolKey {
            region: region.to_string(),
            user_pool_id: user_pool_id.to_string(),
        };

        let pools = self.pools.read().await;
        if let Some(pool) = pools.get(&key) {
            *pool.state.write().await = None;
            tracing::debug!(target: "nb.auth.jwks", region = %region, user_pool_id = %user_pool_id, "JWKS cache invalidated");
        }
    }

    /// Get or create the cache slot for a pool.
    async fn pool(&self, region: &str, user_pool_id: &str) -> Result<Arc<PoolCache>, AuthError> {
        validate_component("region", region)?;
        validate_component("user pool id", user_pool_id)?;

        let key = PoolKey {
            region: region.to_string(),
            user_pool_id: user_pool_id.to_string(),
        };

        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(&key) {
                return Ok(Arc::clone(pool));
            }
        }

        let mut pools = self.pools.write().await;
        Ok(Arc::clone(pools.entry(key).or_default()))
    }

    /// Fetch and install a new key set. Caller holds the pool's refresh lock.
    async fn refresh_pool(
        &self,
        pool: &PoolCache,
        region: &str,
        user_pool_id: &str,
    ) -> Result<Arc<KeySet>, AuthError> {
        let url = self.jwks_url(region, user_pool_id);

        let started = Instant::now();
        let result = self.fetch_key_set(&url).await;
        record_jwks_fetch(
            if result.is_ok() { "success" } else { "error" },
            started.elapsed(),
        );
        let key_set = Arc::new(result?);

        tracing::info!(
            target: "nb.auth.jwks",
            key_count = key_set.len(),
            "JWKS cache refreshed"
        );

        let mut state = pool.state.write().await;
        *state = Some(CacheState {
            key_set: Arc::clone(&key_set),
            fetched_at: Instant::now(),
            ttl: self.config.ttl,
        });

        Ok(key_set)
    }

    async fn fetch_key_set(&self, url: &str) -> Result<KeySet, AuthError> {
        tracing::debug!(target: "nb.auth.jwks", url = %url, "Fetching JWKS");

        let response = self
            .http_client
            .get(url)
            .timeout(self.config.fetch_timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "nb.auth.jwks", error = %e, timed_out = e.is_timeout(), "Failed to fetch JWKS");
                if e.is_timeout() {
                    AuthError::KeyFetch("JWKS request timed out".to_string())
                } else {
                    AuthError::KeyFetch(format!("JWKS request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: "nb.auth.jwks",
                status = %status,
                "JWKS endpoint returned error"
            );
            return Err(AuthError::KeyFetch(format!(
                "JWKS endpoint returned status {}",
                status.as_u16()
            )));
        }

        let document: JwksDocument = response.json().await.map_err(|e| {
            tracing::error!(target: "nb.auth.jwks", error = %e, "Failed to parse JWKS response");
            AuthError::KeyFetch("JWKS response is not a valid key set".to_string())
        })?;

        KeySet::from_keys(document.keys)
    }

    /// Whether any key set (fresh or stale) is cached for a pool.
    #[cfg(test)]
    async fn has_cached_state(&self, region: &str, user_pool_id: &str) -> bool {
        let key = PoolKey {
            region: region.to_string(),
            user_pool_id: user_pool_id.to_string(),
        };
        let pools = self.pools.read().await;
        match pools.get(&key) {
            Some(pool) => pool.state.read().await.is_some(),
            None => false,
        }
    }
}
