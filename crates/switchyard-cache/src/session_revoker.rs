//! `SessionRevoker`: records revoked session ids for the lifetime of the
//! refresh token they belonged to.
//!
//! Implementations are expected to fail independently of the rest of the
//! system (they are typically a Redis-backed cache); callers decide whether
//! a read failure should fail open or closed — see `AuthManager`.

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RevokerError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SessionRevoker: Send + Sync {
    async fn revoke_session(&self, session_id: &str, ttl: Duration) -> Result<(), RevokerError>;
    async fn is_session_revoked(&self, session_id: &str) -> Result<bool, RevokerError>;
}

/// Redis-backed revoker, with an in-process DashMap front for hot reads.
pub struct RedisSessionRevoker {
    l1: DashMap<String, Instant>,
    client: redis::Client,
}

impl RedisSessionRevoker {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            l1: DashMap::new(),
            client: redis::Client::open(redis_url)?,
        })
    }

    fn key(session_id: &str) -> String {
        format!("revoked_session:{session_id}")
    }
}

#[async_trait]
impl SessionRevoker for RedisSessionRevoker {
    async fn revoke_session(&self, session_id: &str, ttl: Duration) -> Result<(), RevokerError> {
        self.l1
            .insert(session_id.to_string(), Instant::now() + ttl);

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RevokerError::Unavailable(e.to_string()))?;
        let _: () = conn
            .set_ex(Self::key(session_id), "1", ttl.as_secs().max(1))
            .await
            .map_err(|e| RevokerError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn is_session_revoked(&self, session_id: &str) -> Result<bool, RevokerError> {
        if let Some(expires) = self.l1.get(session_id) {
            if *expires > Instant::now() {
                return Ok(true);
            }
        }

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RevokerError::Unavailable(e.to_string()))?;
        let exists: bool = conn
            .exists(Self::key(session_id))
            .await
            .map_err(|e| RevokerError::Unavailable(e.to_string()))?;
        Ok(exists)
    }
}

/// In-memory revoker for tests and single-process deployments.
#[derive(Default)]
pub struct InMemorySessionRevoker {
    revoked: DashMap<String, Instant>,
}

impl InMemorySessionRevoker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRevoker for InMemorySessionRevoker {
    async fn revoke_session(&self, session_id: &str, ttl: Duration) -> Result<(), RevokerError> {
        self.revoked
            .insert(session_id.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn is_session_revoked(&self, session_id: &str) -> Result<bool, RevokerError> {
        Ok(self
            .revoked
            .get(session_id)
            .map(|e| *e > Instant::now())
            .unwrap_or(false))
    }
}

/// A revoker whose reads always fail — used to test fail-open behavior.
pub struct AlwaysFailingRevoker;

#[async_trait]
impl SessionRevoker for AlwaysFailingRevoker {
    async fn revoke_session(&self, _session_id: &str, _ttl: Duration) -> Result<(), RevokerError> {
        Err(RevokerError::Unavailable("simulated outage".into()))
    }

    async fn is_session_revoked(&self, _session_id: &str) -> Result<bool, RevokerError> {
        Err(RevokerError::Unavailable("simulated outage".into()))
    }
}

pub type SharedSessionRevoker = Arc<dyn SessionRevoker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_revoker_marks_revoked() {
        let revoker = InMemorySessionRevoker::new();
        assert!(!revoker.is_session_revoked("s1").await.unwrap());
        revoker
            .revoke_session("s1", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(revoker.is_session_revoked("s1").await.unwrap());
    }

    #[tokio::test]
    async fn always_failing_revoker_errors() {
        let revoker = AlwaysFailingRevoker;
        assert!(revoker.is_session_revoked("s1").await.is_err());
    }
}
