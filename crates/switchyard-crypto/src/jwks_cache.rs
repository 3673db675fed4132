//! `JWKSCache`: caches external-issuer public keys keyed by `kid`, with
//! stale-while-revalidate semantics on fetch failure.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("fetching JWKS failed: {0}")]
    Fetch(String),
    #[error("JWKS response was not valid JSON: {0}")]
    Decode(String),
    #[error("no key found for kid {0:?}")]
    KeyNotFound(Option<String>),
    #[error("JWKS cache is empty and the fetch failed")]
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKey {
    pub kty: String,
    #[serde(default)]
    pub kid: Option<String>,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<JsonWebKey>,
}

struct CacheState {
    keys: Vec<JsonWebKey>,
    fetched_at: Instant,
}

/// Caches the public keys of one external JWKS endpoint.
pub struct JwksCache {
    url: String,
    ttl: Duration,
    stale_threshold: Duration,
    http: reqwest::Client,
    state: DashMap<(), CacheState>,
    consecutive_failures: AtomicU32,
}

impl JwksCache {
    pub fn new(url: impl Into<String>, ttl: Duration, stale_threshold: Duration) -> Self {
        Self {
            url: url.into(),
            ttl,
            stale_threshold,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client builds"),
            state: DashMap::new(),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Return the RSA key matching `kid`, fetching/refreshing as needed.
    ///
    /// When `kid` is `None`, falls back to the first cached RSA key ("first
    /// key" fallback — ambiguous when multiple keys are cached; see the
    /// design notes on this behavior).
    pub async fn get_key(&self, kid: Option<&str>) -> Result<JsonWebKey, JwksError> {
        if self.needs_refresh() {
            if let Err(e) = self.refresh().await {
                if self.state.get(&()).is_none() {
                    return Err(e);
                }
                tracing::warn!(error = %e, url = %self.url, "JWKS refresh failed, serving stale cache");
            }
        }

        let entry = self.state.get(&()).ok_or(JwksError::Empty)?;
        match kid {
            Some(kid) => entry
                .keys
                .iter()
                .find(|k| k.kid.as_deref() == Some(kid))
                .cloned()
                .ok_or_else(|| JwksError::KeyNotFound(Some(kid.to_string()))),
            None => entry
                .keys
                .first()
                .cloned()
                .ok_or(JwksError::KeyNotFound(None)),
        }
    }

    fn needs_refresh(&self) -> bool {
        match self.state.get(&()) {
            None => true,
            Some(entry) => entry.fetched_at.elapsed() >= self.ttl,
        }
    }

    async fn refresh(&self) -> Result<(), JwksError> {
        let result = self.fetch().await;
        match &result {
            Ok(keys) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                self.state.insert(
                    (),
                    CacheState {
                        keys: keys.clone(),
                        fetched_at: Instant::now(),
                    },
                );
            }
            Err(_) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                let elapsed_since_stale = self
                    .state
                    .get(&())
                    .map(|e| e.fetched_at.elapsed())
                    .unwrap_or_default();
                if elapsed_since_stale >= self.stale_threshold {
                    tracing::error!(
                        url = %self.url,
                        failures,
                        stale_for_secs = elapsed_since_stale.as_secs(),
                        "JWKS cache has been stale past the configured threshold"
                    );
                }
            }
        }
        result.map(|_| ())
    }

    /// Seed the cache directly, bypassing HTTP — used by tests that need to
    /// exercise the stale-while-revalidate path deterministically.
    #[cfg(test)]
    fn seed_for_test(&self, keys: Vec<JsonWebKey>, fetched_at: Instant) {
        self.state.insert((), CacheState { keys, fetched_at });
    }

    async fn fetch(&self) -> Result<Vec<JsonWebKey>, JwksError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JwksError::Fetch(format!("HTTP {}", response.status())));
        }

        let doc: JwksDocument = response
            .json()
            .await
            .map_err(|e| JwksError::Decode(e.to_string()))?;

        Ok(doc
            .keys
            .into_iter()
            .filter(|k| k.kty == "RSA")
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwk_deserializes_without_kid() {
        let json = r#"{"kty":"RSA","n":"abc","e":"AQAB"}"#;
        let key: JsonWebKey = serde_json::from_str(json).unwrap();
        assert!(key.kid.is_none());
        assert_eq!(key.kty, "RSA");
    }

    #[tokio::test]
    async fn stale_cache_still_serves_keys_when_fetch_fails() {
        let cache = JwksCache::new(
            "http://127.0.0.1:1/jwks.json",
            Duration::from_millis(1),
            Duration::from_secs(300),
        );
        let key = JsonWebKey {
            kty: "RSA".into(),
            kid: Some("external-1".into()),
            n: "abc".into(),
            e: "AQAB".into(),
        };
        // Seed as already-expired so get_key() attempts (and fails) a refresh.
        cache.seed_for_test(vec![key], Instant::now() - Duration::from_secs(10));

        let found = cache.get_key(Some("external-1")).await.unwrap();
        assert_eq!(found.kid.as_deref(), Some("external-1"));
    }

    #[tokio::test]
    async fn empty_cache_with_failed_fetch_propagates_error() {
        let cache = JwksCache::new(
            "http://127.0.0.1:1/jwks.json",
            Duration::from_secs(60),
            Duration::from_secs(300),
        );
        let err = cache.get_key(Some("missing")).await.unwrap_err();
        assert!(matches!(err, JwksError::Fetch(_)));
    }
}
