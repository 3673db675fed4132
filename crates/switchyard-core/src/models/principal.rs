//! The authenticated identity produced by `AuthManager`.

use serde::{Deserialize, Serialize};
use switchyard_crypto::Role;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    Local,
    External,
    ApiToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub projects: Vec<String>,
    pub session_id: Option<String>,
    pub token_source: TokenSource,
}

impl Principal {
    pub fn is_external(&self) -> bool {
        self.token_source == TokenSource::External
    }
}
