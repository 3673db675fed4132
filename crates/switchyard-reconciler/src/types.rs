//! Request/result types for one reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
    pub is_secret: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddonKind {
    Postgres,
    Redis,
    Mysql,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddonBinding {
    pub env_var_name: String,
    pub kind: AddonKind,
    /// Cluster/instance name, e.g. the Postgres cluster or Redis instance.
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeRequest {
    pub name: String,
    pub mount_path: String,
    pub size: String,
    pub access_mode: Option<String>,
    pub storage_class: Option<String>,
}

impl VolumeRequest {
    pub fn access_mode_or_default(&self) -> &str {
        self.access_mode.as_deref().unwrap_or("ReadWriteOnce")
    }

    pub fn storage_class_or_default(&self) -> &str {
        self.storage_class.as_deref().unwrap_or("standard")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub hostname: String,
    pub tls: bool,
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub path: String,
    pub initial_delay_seconds: u32,
    pub timeout_seconds: u32,
    pub period_seconds: u32,
    pub failure_threshold: u32,
}

impl Default for ProbeConfig {
    /// Liveness default per the orchestration contract: 30s initial delay,
    /// 5s timeout, 10s period, 3 failures.
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            initial_delay_seconds: 30,
            timeout_seconds: 5,
            period_seconds: 10,
            failure_threshold: 3,
        }
    }
}

impl ProbeConfig {
    /// Readiness default: 5s initial delay, 3s timeout, 5s period, 2 failures.
    pub fn readiness_default() -> Self {
        Self {
            path: "/health".to_string(),
            initial_delay_seconds: 5,
            timeout_seconds: 3,
            period_seconds: 5,
            failure_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    pub disabled: bool,
    pub liveness: ProbeConfig,
    pub readiness: ProbeConfig,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            liveness: ProbeConfig::default(),
            readiness: ProbeConfig::readiness_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub cpu_request: String,
    pub cpu_limit: String,
    pub memory_request: String,
    pub memory_limit: String,
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self {
            cpu_request: "100m".to_string(),
            cpu_limit: "500m".to_string(),
            memory_request: "128Mi".to_string(),
            memory_limit: "512Mi".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub service_name: String,
    pub project_id: String,
    pub release_version: String,
    pub deployment_id: String,
    pub environment: EnvironmentConfig,
    pub image: String,
    pub replicas: u32,
    pub env_vars: Vec<EnvVar>,
    pub addon_bindings: Vec<AddonBinding>,
    pub domains: Vec<DomainConfig>,
    pub health_check: HealthCheckConfig,
    pub resources: ResourceRequirements,
    pub volumes: Vec<VolumeRequest>,
}

impl ReconcileRequest {
    /// Data-integrity invariant: the namespace must be resolvable before
    /// any orchestrator object is built.
    pub fn validate(&self) -> Result<(), crate::error::ReconcileError> {
        if self.environment.namespace.trim().is_empty() {
            return Err(crate::error::ReconcileError::Validation(
                "environment.namespace must not be empty".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for var in &self.env_vars {
            if !seen.insert(var.key.as_str()) {
                return Err(crate::error::ReconcileError::Validation(format!(
                    "duplicate env var key: {}",
                    var.key
                )));
            }
        }
        Ok(())
    }
}

/// Identifiers of the objects an applier created or updated, used by the
/// caller to report what changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedObject {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileResult {
    pub success: bool,
    pub message: String,
    pub applied: Vec<AppliedObject>,
    pub next_check: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ReconcileResult {
    pub fn success(message: impl Into<String>, applied: Vec<AppliedObject>) -> Self {
        Self {
            success: true,
            message: message.into(),
            applied,
            next_check: None,
            error: None,
        }
    }

    pub fn transient(message: impl Into<String>, applied: Vec<AppliedObject>, next_check: DateTime<Utc>) -> Self {
        Self {
            success: false,
            message: message.into(),
            applied,
            next_check: Some(next_check),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, applied: Vec<AppliedObject>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            applied,
            next_check: None,
            error: Some(error.into()),
        }
    }
}

pub type Labels = HashMap<String, String>;
