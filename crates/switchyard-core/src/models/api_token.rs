//! Opaque API token metadata, as returned by the external `APITokenValidator`.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

pub const API_TOKEN_PREFIX: &str = "enclii_";

#[derive(Debug, Clone)]
pub struct ApiTokenInfo {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub scopes: HashSet<String>,
    pub last_used_ip: Option<String>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiTokenInfo {
    pub fn has_admin_scope(&self) -> bool {
        self.scopes.contains("admin")
    }
}
