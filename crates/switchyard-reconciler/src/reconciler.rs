//! `Reconciler`: sequences manifest build, apply, and readiness waiting into
//! one reconciliation pass, classifying failures as transient, fatal, or
//! partial so the caller knows whether and when to retry.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::applier::OrchestratorApplier;
use crate::error::ReconcileError;
use crate::manifest_builder::ManifestBuilder;
use crate::orchestrator_client::{ObjectHandle, ObjectKind, OrchestratorClient};
use crate::types::{ReconcileRequest, ReconcileResult};
use switchyard_config::ReconcilerSettings;
use switchyard_core::audit::{events, AuditCategory, AuditEvent, AuditLogger, AuditSeverity};

pub struct Reconciler {
    client: Arc<dyn OrchestratorClient>,
    settings: ReconcilerSettings,
    audit: Arc<dyn AuditLogger>,
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn OrchestratorClient>,
        settings: ReconcilerSettings,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        Self { client, settings, audit }
    }

    fn system_event(&self, action: &str, severity: AuditSeverity) -> AuditEvent {
        AuditEvent::new(AuditCategory::System, action, severity)
    }

    /// Sequence: namespace -> registry creds -> PVCs -> env Secret ->
    /// Deployment+Service -> Ingress (if domains) -> NetworkPolicies ->
    /// readiness wait. Each step short-circuits the rest on fatal error;
    /// readiness timing out is reported as transient via `NextCheck`.
    pub async fn reconcile(
        &self,
        request: &ReconcileRequest,
        cancel: &CancellationToken,
    ) -> ReconcileResult {
        self.audit
            .log(
                self.system_event(events::RECONCILE_STARTED, AuditSeverity::Info)
                    .with_metadata(serde_json::json!({"service": request.service_name})),
            )
            .await;

        let manifest = match ManifestBuilder::build(request, &self.settings) {
            Ok(manifest) => manifest,
            Err(err) => {
                self.audit
                    .log(
                        self.system_event(events::RECONCILE_FAILED, AuditSeverity::Warning)
                            .failure(err.to_string()),
                    )
                    .await;
                return ReconcileResult::failed(
                    format!("manifest build failed for {}", request.service_name),
                    Vec::new(),
                    err.to_string(),
                )
            }
        };

        let applier = OrchestratorApplier::new(self.client.as_ref());
        let namespace = &request.environment.namespace;

        if let Err(err) = applier.ensure_namespace(namespace).await {
            self.audit
                .log(
                    self.system_event(events::RECONCILE_FAILED, AuditSeverity::Warning)
                        .failure(err.to_string()),
                )
                .await;
            return ReconcileResult::failed("failed to ensure namespace", Vec::new(), err.to_string());
        }

        if let Err(err) = applier
            .ensure_registry_credentials(
                &self.settings.registry_credentials_source_namespace,
                namespace,
                &self.settings.registry_credentials_secret_name,
            )
            .await
        {
            self.audit
                .log(
                    self.system_event(events::RECONCILE_FAILED, AuditSeverity::Warning)
                        .failure(err.to_string()),
                )
                .await;
            return ReconcileResult::failed(
                "failed to provision registry credentials",
                Vec::new(),
                err.to_string(),
            );
        }

        if cancel.is_cancelled() {
            return ReconcileResult::failed(
                "reconcile cancelled",
                Vec::new(),
                "cancelled before apply".to_string(),
            );
        }

        let applied = match applier.apply(&manifest).await {
            Ok(applied) => applied,
            Err(err) => {
                return match err.kind() {
                    crate::error::ErrorKind::Fatal => {
                        self.audit
                            .log(
                                self.system_event(events::RECONCILE_FAILED, AuditSeverity::Critical)
                                    .failure(err.to_string()),
                            )
                            .await;
                        ReconcileResult::failed("apply failed fatally", Vec::new(), err.to_string())
                    }
                    _ => ReconcileResult::transient(
                        "apply failed transiently, will retry",
                        Vec::new(),
                        Utc::now() + chrono::Duration::seconds(self.settings.requeue_after_timeout.as_secs() as i64),
                    ),
                }
            }
        };

        for object in &applied {
            self.audit
                .log(
                    self.system_event(&events::reconcile_applied(&object.kind), AuditSeverity::Info)
                        .with_metadata(serde_json::json!({
                            "name": object.name,
                            "namespace": object.namespace,
                        })),
                )
                .await;
        }

        match self
            .wait_for_readiness(namespace, &request.service_name, request.replicas, cancel)
            .await
        {
            Ok(()) => {
                info!(service = %request.service_name, "deployment became ready");
                self.audit
                    .log(self.system_event(events::RECONCILE_READY, AuditSeverity::Info))
                    .await;
                ReconcileResult::success(format!("{} is ready", request.service_name), applied)
            }
            Err(err) => match err.kind() {
                crate::error::ErrorKind::Fatal => {
                    error!(service = %request.service_name, error = %err, "fatal pod condition");
                    self.audit
                        .log(
                            self.system_event(events::RECONCILE_FAILED, AuditSeverity::Critical)
                                .failure(err.to_string()),
                        )
                        .await;
                    ReconcileResult::failed("deployment failed", applied, err.to_string())
                }
                crate::error::ErrorKind::Transient if matches!(err, ReconcileError::Timeout) => {
                    warn!(service = %request.service_name, "readiness wait timed out");
                    self.audit
                        .log(self.system_event(events::RECONCILE_TIMEOUT, AuditSeverity::Warning))
                        .await;
                    ReconcileResult::transient(
                        "waiting for pods to become ready",
                        applied,
                        Utc::now() + chrono::Duration::seconds(self.settings.requeue_after_timeout.as_secs() as i64),
                    )
                }
                _ => {
                    warn!(service = %request.service_name, error = %err, "readiness wait did not complete");
                    ReconcileResult::transient(
                        "waiting for pods to become ready",
                        applied,
                        Utc::now() + chrono::Duration::seconds(self.settings.requeue_after_timeout.as_secs() as i64),
                    )
                }
            },
        }
    }

    /// Cascades deletion of every object this service owns. Missing
    /// objects are not treated as errors by the underlying client.
    pub async fn delete(&self, request: &ReconcileRequest) -> Result<(), ReconcileError> {
        let namespace = &request.environment.namespace;
        let name = &request.service_name;

        for kind in [
            ObjectKind::NetworkPolicy,
            ObjectKind::Ingress,
            ObjectKind::Service,
            ObjectKind::Deployment,
        ] {
            self.client
                .delete(kind, namespace, name)
                .await
                .map_err(|e| ReconcileError::Orchestrator(e.to_string()))?;
        }

        let mut labels = std::collections::HashMap::new();
        labels.insert("enclii.dev/service".to_string(), name.clone());
        for pvc in self
            .client
            .list_by_label(ObjectKind::PersistentVolumeClaim, namespace, &labels)
            .await
            .map_err(|e| ReconcileError::Orchestrator(e.to_string()))?
        {
            self.client
                .delete(ObjectKind::PersistentVolumeClaim, namespace, &pvc.name)
                .await
                .map_err(|e| ReconcileError::Orchestrator(e.to_string()))?;
        }

        self.client
            .delete(ObjectKind::Secret, namespace, &format!("{name}-secrets"))
            .await
            .map_err(|e| ReconcileError::Orchestrator(e.to_string()))?;

        Ok(())
    }

    /// Best-effort, thin rollback: bumps the Deployment's rollback-revision
    /// annotation to trigger the orchestrator's own rollback. No previous
    /// image is tracked locally; repeated rollbacks beyond the orchestrator's
    /// retained revision history have no effect.
    pub async fn rollback(&self, namespace: &str, service_name: &str) -> Result<(), ReconcileError> {
        let existing = self
            .client
            .get(ObjectKind::Deployment, namespace, service_name)
            .await
            .map_err(|e| ReconcileError::Orchestrator(e.to_string()))?
            .ok_or_else(|| {
                ReconcileError::Validation(format!("no deployment {service_name} in {namespace} to roll back"))
            })?;

        let mut handle = existing;
        let annotations = handle.body["metadata"]["annotations"]
            .as_object()
            .cloned()
            .unwrap_or_default();
        let mut annotations = annotations;
        annotations.insert(
            "enclii.dev/rollback-requested-at".to_string(),
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );
        handle.body["metadata"]["annotations"] = serde_json::Value::Object(annotations);

        self.client
            .update(handle)
            .await
            .map_err(|e| ReconcileError::Orchestrator(e.to_string()))?;
        Ok(())
    }

    async fn wait_for_readiness(
        &self,
        namespace: &str,
        service_name: &str,
        desired_replicas: u32,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let deadline = tokio::time::Instant::now() + self.settings.readiness_timeout;
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), service_name.to_string());

        loop {
            if cancel.is_cancelled() {
                return Err(ReconcileError::Orchestrator(
                    "reconcile cancelled while waiting for readiness".to_string(),
                ));
            }

            let deployment_ready = self
                .client
                .get(ObjectKind::Deployment, namespace, service_name)
                .await
                .map_err(|e| ReconcileError::Orchestrator(e.to_string()))?
                .map(|handle| deployment_is_ready(&handle, desired_replicas))
                .unwrap_or(false);

            let pods = self
                .client
                .list_by_label(ObjectKind::Pod, namespace, &labels)
                .await
                .map_err(|e| ReconcileError::Orchestrator(e.to_string()))?;

            if let Some((reason, remediation)) = classify_fatal_condition(&pods) {
                return Err(ReconcileError::FatalPod { reason, remediation });
            }

            if deployment_ready {
                return Ok(());
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(ReconcileError::Timeout);
            }

            tokio::select! {
                _ = sleep(self.settings.readiness_poll_interval) => {}
                _ = cancel.cancelled() => {
                    return Err(ReconcileError::Orchestrator(
                        "reconcile cancelled while waiting for readiness".to_string(),
                    ));
                }
            }
        }
    }
}

fn deployment_is_ready(deployment: &ObjectHandle, desired_replicas: u32) -> bool {
    let status = match deployment.body.get("status") {
        Some(s) => s,
        None => return false,
    };
    let ready = status.get("readyReplicas").and_then(|v| v.as_u64()).unwrap_or(0);
    let updated = status.get("updatedReplicas").and_then(|v| v.as_u64()).unwrap_or(0);
    ready == desired_replicas as u64 && updated == desired_replicas as u64
}

/// Inspects every pod's container statuses for a condition that will not
/// self-heal, returning a human reason and a remediation hint.
fn classify_fatal_condition(pods: &[ObjectHandle]) -> Option<(String, String)> {
    for pod in pods {
        let statuses = pod
            .body
            .get("status")
            .and_then(|s| s.get("containerStatuses"))
            .and_then(|s| s.as_array())?;

        for status in statuses {
            let waiting = match status.get("state").and_then(|s| s.get("waiting")) {
                Some(w) => w,
                None => continue,
            };
            let reason = waiting.get("reason").and_then(|r| r.as_str()).unwrap_or("");
            let message = waiting
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("")
                .to_lowercase();
            let restart_count = status.get("restartCount").and_then(|r| r.as_u64()).unwrap_or(0);

            match reason {
                "ImagePullBackOff" | "ErrImagePull" => {
                    if message.contains("401")
                        || message.contains("403")
                        || message.contains("unauthorized")
                        || message.contains("forbidden")
                    {
                        return Some((
                            "missing registry credentials".to_string(),
                            "verify enclii-registry-credentials is present and valid in the target namespace"
                                .to_string(),
                        ));
                    }
                    if message.contains("manifest unknown") || message.contains("not found") {
                        return Some((
                            "image not found".to_string(),
                            "verify the image reference and tag exist in the registry".to_string(),
                        ));
                    }
                    return Some((
                        reason.to_string(),
                        "verify enclii-registry-credentials is present and valid in the target namespace"
                            .to_string(),
                    ));
                }
                "InvalidImageName" => {
                    return Some((
                        "InvalidImageName".to_string(),
                        "correct the image reference format".to_string(),
                    ))
                }
                "CreateContainerConfigError" => {
                    let detail = if message.contains("secret") {
                        "missing secret"
                    } else {
                        "container configuration error"
                    };
                    return Some((
                        detail.to_string(),
                        "verify referenced ConfigMaps and Secrets exist".to_string(),
                    ));
                }
                "CrashLoopBackOff" if restart_count >= 5 => {
                    return Some((
                        "CrashLoopBackOff".to_string(),
                        "check application logs".to_string(),
                    ))
                }
                "BackOff" if restart_count > 0 => {
                    return Some((
                        "missing registry credentials".to_string(),
                        "verify enclii-registry-credentials is present and valid in the target namespace"
                            .to_string(),
                    ))
                }
                _ => {}
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator_client::InMemoryOrchestratorClient;
    use crate::types::{EnvVar, EnvironmentConfig, HealthCheckConfig, ResourceRequirements};

    fn sample_request() -> ReconcileRequest {
        ReconcileRequest {
            service_name: "payments-api".to_string(),
            project_id: "proj-1".to_string(),
            release_version: "v42".to_string(),
            deployment_id: "dep-1".to_string(),
            environment: EnvironmentConfig {
                name: "production".to_string(),
                namespace: "enclii-proj-1-production".to_string(),
            },
            image: "registry.internal/payments-api:v42".to_string(),
            replicas: 1,
            env_vars: vec![EnvVar {
                key: "LOG_LEVEL".to_string(),
                value: "info".to_string(),
                is_secret: false,
            }],
            addon_bindings: vec![],
            domains: vec![],
            health_check: HealthCheckConfig::default(),
            resources: ResourceRequirements::default(),
            volumes: vec![],
        }
    }

    fn pod_with_waiting_reason(reason: &str, message: &str, restart_count: u64) -> ObjectHandle {
        ObjectHandle {
            kind: ObjectKind::Pod,
            namespace: "ns".to_string(),
            name: "pod-1".to_string(),
            body: serde_json::json!({
                "status": {
                    "containerStatuses": [
                        {
                            "state": {"waiting": {"reason": reason, "message": message}},
                            "restartCount": restart_count
                        }
                    ]
                }
            }),
        }
    }

    #[test]
    fn image_pull_backoff_with_401_maps_to_registry_credentials_remediation() {
        let pod = pod_with_waiting_reason("ImagePullBackOff", "401 Unauthorized", 0);
        let (reason, remediation) = classify_fatal_condition(&[pod]).unwrap();
        assert_eq!(reason, "missing registry credentials");
        assert!(remediation.contains("enclii-registry-credentials"));
    }

    #[test]
    fn crash_loop_below_threshold_is_not_yet_fatal() {
        let pod = pod_with_waiting_reason("CrashLoopBackOff", "", 2);
        assert!(classify_fatal_condition(&[pod]).is_none());
    }

    #[test]
    fn crash_loop_at_threshold_is_fatal() {
        let pod = pod_with_waiting_reason("CrashLoopBackOff", "", 5);
        let (reason, _) = classify_fatal_condition(&[pod]).unwrap();
        assert_eq!(reason, "CrashLoopBackOff");
    }

    #[test]
    fn deployment_ready_requires_both_ready_and_updated_replicas() {
        let handle = ObjectHandle {
            kind: ObjectKind::Deployment,
            namespace: "ns".to_string(),
            name: "svc".to_string(),
            body: serde_json::json!({"status": {"readyReplicas": 3, "updatedReplicas": 2}}),
        };
        assert!(!deployment_is_ready(&handle, 3));
    }

    #[tokio::test]
    async fn reconcile_times_out_transiently_when_no_pods_ever_appear() {
        let client: Arc<dyn OrchestratorClient> = Arc::new(InMemoryOrchestratorClient::new());
        let mut settings = ReconcilerSettings::default();
        settings.readiness_timeout = std::time::Duration::from_millis(20);
        settings.readiness_poll_interval = std::time::Duration::from_millis(5);
        let audit: Arc<dyn AuditLogger> = Arc::new(switchyard_core::audit::TracingAuditLogger);
        let reconciler = Reconciler::new(client, settings, audit);
        let cancel = CancellationToken::new();

        let result = reconciler.reconcile(&sample_request(), &cancel).await;

        // Missing registry credentials is a warning, not fatal; apply
        // succeeds against the in-memory fake, and with no pods ever
        // appearing the readiness wait times out transiently.
        assert!(!result.success);
        assert!(result.error.is_none());
        assert!(result.next_check.is_some());
    }

    #[tokio::test]
    async fn reconcile_reports_registry_credentials_remediation_on_fatal_image_pull() {
        let client = Arc::new(InMemoryOrchestratorClient::new());
        let request = sample_request();

        client
            .create(pod_with_waiting_reason("ImagePullBackOff", "401 Unauthorized", 0))
            .await
            .unwrap();
        // The pod fixture carries no app label, so give it one matching the
        // pod-readiness label selector the reconciler lists by.
        let mut labeled = client
            .get(ObjectKind::Pod, "ns", "pod-1")
            .await
            .unwrap()
            .unwrap();
        labeled.namespace = request.environment.namespace.clone();
        labeled.body["metadata"] = serde_json::json!({"labels": {"app": request.service_name}});
        client.delete(ObjectKind::Pod, "ns", "pod-1").await.unwrap();
        client.create(labeled).await.unwrap();

        let mut settings = ReconcilerSettings::default();
        settings.readiness_timeout = std::time::Duration::from_millis(20);
        settings.readiness_poll_interval = std::time::Duration::from_millis(5);
        let audit: Arc<dyn AuditLogger> = Arc::new(switchyard_core::audit::TracingAuditLogger);
        let client: Arc<dyn OrchestratorClient> = client;
        let reconciler = Reconciler::new(client, settings, audit);
        let cancel = CancellationToken::new();

        let result = reconciler.reconcile(&request, &cancel).await;

        assert!(!result.success);
        let error = result.error.expect("expected a fatal error");
        assert!(error.contains("enclii-registry-credentials"));
    }

    #[tokio::test]
    async fn delete_is_not_an_error_on_missing_objects() {
        let client: Arc<dyn OrchestratorClient> = Arc::new(InMemoryOrchestratorClient::new());
        let audit: Arc<dyn AuditLogger> = Arc::new(switchyard_core::audit::TracingAuditLogger);
        let reconciler = Reconciler::new(client, ReconcilerSettings::default(), audit);
        assert!(reconciler.delete(&sample_request()).await.is_ok());
    }
}
