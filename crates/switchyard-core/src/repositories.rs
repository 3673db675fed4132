//! Repository contracts. These name only the methods this crate calls;
//! no SQL/ORM-backed implementation ships with it — callers supply their
//! own against whatever store they run.

use crate::audit::AuditEvent;
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub role: switchyard_crypto::Role,
    pub projects: Vec<String>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>>;
    async fn create(&self, email: &str, role: switchyard_crypto::Role) -> anyhow::Result<UserRecord>;
}

#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    pub owner_user_id: Uuid,
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<ProjectRecord>>;
    async fn list_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<ProjectRecord>>;
}

#[async_trait]
pub trait ProjectAccessRepository: Send + Sync {
    async fn has_access(&self, user_id: Uuid, project_id: &str) -> anyhow::Result<bool>;
    async fn grant(&self, user_id: Uuid, project_id: &str) -> anyhow::Result<()>;
    async fn revoke(&self, user_id: Uuid, project_id: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> anyhow::Result<()>;
    async fn list_for_actor(&self, actor_id: Uuid, limit: usize) -> anyhow::Result<Vec<AuditEvent>>;
}
