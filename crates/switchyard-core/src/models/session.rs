//! Session model.
//!
//! The authoritative revocation state lives in the `SessionRevoker`
//! (`switchyard-cache`); this struct is the caller-facing view of a session
//! as created alongside a token pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: uuid::Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
