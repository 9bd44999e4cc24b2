// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Issuer signing-key retrieval and caching.
//!
//! One [`SigningKeySource`] exists per configured issuer. It fetches the
//! issuer's OIDC discovery document, follows `jwks_uri` and caches the
//! resulting key set for the process lifetime.
//!
//! ## Security
//!
//! - Discovery and JWKS URLs must be `https`; anything else is a
//!   configuration error, and the HTTP client itself is `https_only`.
//! - Keys are cached with a refresh interval.
//! - A failed refresh keeps serving the previous keys (availability over
//!   immediate rotation) until the entry is older than `max_staleness`.
//!   After that, and whenever nothing was ever fetched, validation fails
//!   closed.
//!
//! ## Concurrency
//!
//! The cache is an `RwLock<Option<CacheEntry>>` replaced wholesale under a
//! per-source refresh mutex, so at most one fetch is in flight per issuer
//! and readers never observe a half-written entry. Key material sits behind
//! an `Arc` and is shared, not copied, per request. Every fetch is bounded
//! by its own timeout, and the mutex guard is dropped with a cancelled
//! caller, so an aborted request cannot wedge later refreshes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::error::KeySourceError;

/// Default key refresh interval (5 minutes).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Default ceiling on serving stale keys after refreshes fail (24 hours).
pub const DEFAULT_MAX_STALENESS: Duration = Duration::from_secs(24 * 60 * 60);

/// Default bound on a single discovery + JWKS fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause after a failed refresh, and minimum gap between forced
/// refreshes for unknown key ids.
pub const DEFAULT_RETRY_COOLDOWN: Duration = Duration::from_secs(30);

/// Path of the OIDC discovery document relative to the authority.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Key material and discovery metadata published by one issuer.
#[derive(Debug, Clone)]
pub struct SigningKeys {
    /// `issuer` advertised by the discovery document.
    pub issuer: Option<String>,
    pub jwks_uri: Url,
    pub keys: JwkSet,
}

impl SigningKeys {
    /// Find the key with the given `kid`.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
    }

    pub fn is_empty(&self) -> bool {
        self.keys.keys.is_empty()
    }
}

/// Retrieves an issuer's signing keys. Swapped for a fake in tests.
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    async fn fetch(&self, discovery_url: &Url) -> Result<SigningKeys, KeySourceError>;
}

/// Discovery document fields we use.
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    issuer: Option<String>,
    jwks_uri: String,
}

/// [`KeySetFetcher`] over HTTPS.
#[derive(Clone)]
pub struct HttpKeySetFetcher {
    client: reqwest::Client,
}

impl HttpKeySetFetcher {
    /// Create a fetcher whose client refuses plaintext URLs.
    pub fn new(timeout: Duration) -> Result<Self, KeySourceError> {
        let client = reqwest::Client::builder()
            .https_only(true)
            .timeout(timeout)
            .build()
            .map_err(|e| KeySourceError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, KeySourceError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| KeySourceError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeySourceError::Fetch(format!(
                "HTTP {} from {url}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| KeySourceError::InvalidDocument(format!("{url}: {e}")))
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    async fn fetch(&self, discovery_url: &Url) -> Result<SigningKeys, KeySourceError> {
        require_https(discovery_url)?;
        let document: DiscoveryDocument = self.get_json(discovery_url).await?;

        let jwks_uri = Url::parse(&document.jwks_uri)
            .map_err(|e| KeySourceError::InvalidDocument(format!("jwks_uri: {e}")))?;
        require_https(&jwks_uri)?;

        let keys: JwkSet = self.get_json(&jwks_uri).await?;
        if keys.keys.is_empty() {
            return Err(KeySourceError::InvalidDocument(format!(
                "{jwks_uri} returned an empty key set"
            )));
        }

        Ok(SigningKeys {
            issuer: document.issuer,
            jwks_uri,
            keys,
        })
    }
}

/// Reject non-`https` URLs.
pub fn require_https(url: &Url) -> Result<(), KeySourceError> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(KeySourceError::Config(format!(
            "{url} must use https; plaintext discovery is not allowed"
        )))
    }
}

/// Build `<authority>/.well-known/openid-configuration`.
pub fn discovery_url(authority: &str) -> Result<Url, KeySourceError> {
    let base = authority.trim().trim_end_matches('/');
    let url = Url::parse(&format!("{base}{DISCOVERY_PATH}"))
        .map_err(|e| KeySourceError::Config(format!("invalid authority {authority:?}: {e}")))?;
    require_https(&url)?;
    Ok(url)
}

/// Cache and retry tuning for a [`SigningKeySource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySourceSettings {
    pub refresh_interval: Duration,
    pub max_staleness: Duration,
    pub fetch_timeout: Duration,
    pub retry_cooldown: Duration,
}

impl Default for KeySourceSettings {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            max_staleness: DEFAULT_MAX_STALENESS,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            retry_cooldown: DEFAULT_RETRY_COOLDOWN,
        }
    }
}

/// Cache state reported to health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySourceStatus {
    /// Keys younger than the refresh interval.
    Fresh,
    /// Keys present but due for refresh.
    Stale,
    /// Nothing fetched yet.
    Empty,
}

impl KeySourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySourceStatus::Fresh => "ok",
            KeySourceStatus::Stale => "stale",
            KeySourceStatus::Empty => "unavailable",
        }
    }
}

/// JWKS cache entry.
struct CacheEntry {
    keys: Arc<SigningKeys>,
    fetched_at: Instant,
}

/// Bookkeeping guarded by the single-flight mutex.
#[derive(Default)]
struct RefreshState {
    last_failure: Option<Instant>,
    last_error: Option<String>,
}

/// Per-issuer signing-key cache.
pub struct SigningKeySource {
    discovery_url: Url,
    settings: KeySourceSettings,
    fetcher: Arc<dyn KeySetFetcher>,
    cache: RwLock<Option<CacheEntry>>,
    refresh: Mutex<RefreshState>,
}

impl SigningKeySource {
    /// Create a key source for one discovery URL. Plaintext URLs are refused.
    pub fn new(
        discovery_url: Url,
        settings: KeySourceSettings,
        fetcher: Arc<dyn KeySetFetcher>,
    ) -> Result<Self, KeySourceError> {
        require_https(&discovery_url)?;
        Ok(Self {
            discovery_url,
            settings,
            fetcher,
            cache: RwLock::new(None),
            refresh: Mutex::new(RefreshState::default()),
        })
    }

    pub fn discovery_url(&self) -> &Url {
        &self.discovery_url
    }

    pub fn settings(&self) -> &KeySourceSettings {
        &self.settings
    }

    /// Current keys, refreshing first when the cache is due.
    pub async fn get_keys(&self) -> Result<Arc<SigningKeys>, KeySourceError> {
        if let Some(keys) = self.fresh_keys().await {
            return Ok(keys);
        }
        self.refresh(false).await
    }

    /// Refresh ahead of schedule because a token named an unknown `kid`.
    ///
    /// Rate limited: if the cache was filled within the retry cooldown the
    /// cached keys are returned unchanged.
    pub async fn refresh_for_unknown_key(&self) -> Result<Arc<SigningKeys>, KeySourceError> {
        self.refresh(true).await
    }

    /// Fetch now if nothing is cached yet. Used at startup and by health checks.
    pub async fn warm(&self) -> Result<(), KeySourceError> {
        self.get_keys().await.map(|_| ())
    }

    pub async fn status(&self) -> KeySourceStatus {
        let cache = self.cache.read().await;
        match &*cache {
            Some(entry) if entry.fetched_at.elapsed() < self.settings.refresh_interval => {
                KeySourceStatus::Fresh
            }
            Some(_) => KeySourceStatus::Stale,
            None => KeySourceStatus::Empty,
        }
    }

    async fn fresh_keys(&self) -> Option<Arc<SigningKeys>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.settings.refresh_interval)
            .map(|entry| Arc::clone(&entry.keys))
    }

    async fn cached(&self) -> Option<(Arc<SigningKeys>, Instant)> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .map(|entry| (Arc::clone(&entry.keys), entry.fetched_at))
    }

    async fn refresh(&self, forced: bool) -> Result<Arc<SigningKeys>, KeySourceError> {
        let mut state = self.refresh.lock().await;

        // Whoever held the lock before us may already have refreshed.
        let current = self.cached().await;
        if let Some((keys, fetched_at)) = &current {
            let age = fetched_at.elapsed();
            let recently_failed = state
                .last_failure
                .is_some_and(|at| at.elapsed() < self.settings.retry_cooldown);

            if !forced && age < self.settings.refresh_interval {
                return Ok(Arc::clone(keys));
            }
            if forced && age < self.settings.retry_cooldown {
                return Ok(Arc::clone(keys));
            }
            if recently_failed && age <= self.settings.max_staleness {
                return Ok(Arc::clone(keys));
            }
        } else if let Some(failed_at) = state.last_failure {
            // Nothing cached and a fetch just failed: callers that queued
            // behind it share the failure instead of fetching again.
            if failed_at.elapsed() < self.settings.retry_cooldown {
                let last_error = state.last_error.as_deref().unwrap_or("fetch failed");
                return Err(KeySourceError::Unavailable(format!(
                    "{} ({last_error})",
                    self.discovery_url
                )));
            }
        }

        match self.fetch_bounded().await {
            Ok(fetched) => {
                let keys = Arc::new(fetched);
                *self.cache.write().await = Some(CacheEntry {
                    keys: Arc::clone(&keys),
                    fetched_at: Instant::now(),
                });
                state.last_failure = None;
                state.last_error = None;
                info!(
                    discovery_url = %self.discovery_url,
                    key_count = keys.keys.keys.len(),
                    forced,
                    "Signing keys refreshed"
                );
                Ok(keys)
            }
            Err(err) => {
                state.last_failure = Some(Instant::now());
                state.last_error = Some(err.to_string());
                match current {
                    Some((keys, fetched_at))
                        if fetched_at.elapsed() <= self.settings.max_staleness =>
                    {
                        warn!(
                            discovery_url = %self.discovery_url,
                            error = %err,
                            age_secs = fetched_at.elapsed().as_secs(),
                            "Signing key refresh failed, serving cached keys"
                        );
                        Ok(keys)
                    }
                    Some(_) => {
                        warn!(
                            discovery_url = %self.discovery_url,
                            error = %err,
                            "Signing key refresh failed and cached keys exceed max staleness"
                        );
                        Err(KeySourceError::Unavailable(self.discovery_url.to_string()))
                    }
                    None => {
                        warn!(
                            discovery_url = %self.discovery_url,
                            error = %err,
                            "Signing key fetch failed with no cached keys"
                        );
                        Err(err)
                    }
                }
            }
        }
    }

    async fn fetch_bounded(&self) -> Result<SigningKeys, KeySourceError> {
        debug!(discovery_url = %self.discovery_url, "Fetching signing keys");
        let timeout = self.settings.fetch_timeout;
        let keys = tokio::time::timeout(timeout, self.fetcher.fetch(&self.discovery_url))
            .await
            .map_err(|_| KeySourceError::Timeout(timeout))??;
        if keys.is_empty() {
            return Err(KeySourceError::InvalidDocument(
                "key set contains no keys".to_string(),
            ));
        }
        Ok(keys)
    }
}
