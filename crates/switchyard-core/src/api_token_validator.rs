//! Contract for validating opaque `enclii_`-prefixed API tokens. No
//! implementation ships with this crate; callers own the token store.

use crate::error::AuthError;
use crate::models::ApiTokenInfo;
use async_trait::async_trait;

#[async_trait]
pub trait ApiTokenValidator: Send + Sync {
    async fn validate_token_for_auth(&self, raw: &str) -> Result<ApiTokenInfo, AuthError>;

    /// Best-effort; failures here must never block the authenticated
    /// request that triggered them.
    async fn update_last_used(&self, token_id: uuid::Uuid, ip: Option<String>);
}
