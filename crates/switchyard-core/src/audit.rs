//! Structured audit events for authentication and session actions.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// The fixed set of event names this subsystem may emit.
pub mod events {
    pub const LOGIN_SUCCESS: &str = "auth.login.success";
    pub const LOGIN_FAILURE: &str = "auth.login.failure";
    pub const TOKEN_ISSUED: &str = "auth.token.issued";
    pub const TOKEN_VALIDATED: &str = "auth.token.validated";
    pub const TOKEN_REFRESHED: &str = "auth.token.refreshed";
    pub const TOKEN_REFRESH_FAILED: &str = "auth.token.refresh_failed";
    pub const LOGOUT: &str = "auth.logout";
    pub const SESSION_REVOKED: &str = "auth.session.revoked";
    pub const EXTERNAL_VALIDATED: &str = "auth.external.validated";
    pub const EXTERNAL_USER_CREATED: &str = "auth.external.user_created";
    pub const EXTERNAL_USER_LINKED: &str = "auth.external.user_linked";
    pub const OIDC_LOGIN_INITIATED: &str = "auth.oidc.login_initiated";
    pub const OIDC_CALLBACK_START: &str = "auth.oidc.callback_start";
    pub const OIDC_CALLBACK_FAILED: &str = "auth.oidc.callback_failed";

    pub const RECONCILE_STARTED: &str = "reconcile.started";
    pub const RECONCILE_READY: &str = "reconcile.ready";
    pub const RECONCILE_TIMEOUT: &str = "reconcile.timeout";
    pub const RECONCILE_FAILED: &str = "reconcile.failed";

    /// `reconcile.applied.<kind>`, e.g. `reconcile.applied.deployment`.
    pub fn reconcile_applied(kind: &str) -> String {
        format!("reconcile.applied.{}", kind.to_lowercase())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Authentication,
    Authorization,
    System,
    Security,
}

#[derive(Debug, Clone)]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

impl Serialize for AuditSeverity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = match self {
            AuditSeverity::Info => "INFO",
            AuditSeverity::Warning => "WARNING",
            AuditSeverity::Critical => "CRITICAL",
        };
        serializer.serialize_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub category: AuditCategory,
    pub action: String,
    pub severity: AuditSeverity,
    pub actor_id: Option<Uuid>,
    pub email: Option<String>,
    pub session_id: Option<String>,
    pub method: Option<String>,
    pub token_source: Option<String>,
    pub token_type: Option<String>,
    pub issuer: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: serde_json::Value,
    pub outcome: AuditOutcome,
}

impl AuditEvent {
    pub fn new(category: AuditCategory, action: &str, severity: AuditSeverity) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            category,
            action: action.to_string(),
            severity,
            actor_id: None,
            email: None,
            session_id: None,
            method: None,
            token_source: None,
            token_type: None,
            issuer: None,
            expires_at: None,
            ip_address: None,
            user_agent: None,
            metadata: serde_json::json!({}),
            outcome: AuditOutcome::Success,
        }
    }

    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_context(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip;
        self.user_agent = user_agent;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn failure(mut self, reason: impl Into<String>) -> Self {
        self.outcome = AuditOutcome::Failure {
            reason: reason.into(),
        };
        self.severity = AuditSeverity::Warning;
        self
    }
}

/// Trait for recording audit events; implementations may fan events out to
/// a SIEM, a database-backed log, or (as here) structured tracing output.
#[async_trait::async_trait]
pub trait AuditLogger: Send + Sync {
    async fn log(&self, event: AuditEvent);
}

/// Default implementation: emits one `tracing::info!` per event under the
/// `audit` target so operators can filter/route it independently of ordinary
/// application logs.
pub struct TracingAuditLogger;

#[async_trait::async_trait]
impl AuditLogger for TracingAuditLogger {
    async fn log(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            event_id = %event.id,
            timestamp = %event.timestamp,
            category = ?event.category,
            action = %event.action,
            severity = ?event.severity,
            actor_id = ?event.actor_id,
            session_id = ?event.session_id,
            outcome = ?event.outcome,
            payload = %serde_json::to_string(&event).unwrap_or_default(),
            "AUDIT_EVENT"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logger_accepts_failure_event() {
        let logger = TracingAuditLogger;
        let event = AuditEvent::new(AuditCategory::Authentication, events::LOGIN_FAILURE, AuditSeverity::Info)
            .failure("invalid token");
        logger.log(event).await;
    }
}
