//! `OrchestratorApplier`: idempotent create-or-update of a [`DesiredManifest`]
//! against an [`OrchestratorClient`], preserving the fields the orchestrator
//! itself owns (cluster-assigned IPs, immutable selectors, ...).

use crate::error::ReconcileError;
use crate::manifest_builder::DesiredManifest;
use crate::orchestrator_client::{ObjectHandle, ObjectKind, OrchestratorClient, OrchestratorError};
use crate::types::AppliedObject;
use tracing::{info, warn};

pub struct OrchestratorApplier<'a> {
    client: &'a dyn OrchestratorClient,
}

impl<'a> OrchestratorApplier<'a> {
    pub fn new(client: &'a dyn OrchestratorClient) -> Self {
        Self { client }
    }

    pub async fn apply(
        &self,
        manifest: &DesiredManifest,
    ) -> Result<Vec<AppliedObject>, ReconcileError> {
        let mut applied = Vec::new();

        for pvc in &manifest.pvcs {
            applied.push(self.apply_pvc(pvc).await?);
        }

        if let Some(secret) = &manifest.secret {
            applied.push(self.apply_secret(secret).await?);
        }

        applied.push(self.apply_deployment(&manifest.deployment).await?);
        applied.push(self.apply_service(&manifest.service).await?);

        if let Some(ingress) = &manifest.ingress {
            applied.push(self.apply_ingress(ingress).await?);
        }

        for policy in &manifest.network_policies {
            applied.push(self.apply_network_policy(policy).await?);
        }

        Ok(applied)
    }

    /// Creates the target namespace if it doesn't already exist, labeled
    /// for ownership tracking. A race where another caller creates it first
    /// is treated as success.
    pub async fn ensure_namespace(&self, namespace: &str) -> Result<(), ReconcileError> {
        if self
            .client
            .get(ObjectKind::Namespace, "", namespace)
            .await
            .map_err(to_reconcile_error)?
            .is_some()
        {
            return Ok(());
        }

        let mut labels = serde_json::Map::new();
        labels.insert(
            "enclii.dev/managed-by".to_string(),
            serde_json::Value::String("switchyard".to_string()),
        );
        labels.insert(
            "enclii.dev/platform".to_string(),
            serde_json::Value::String("enclii".to_string()),
        );

        let body = serde_json::json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {
                "name": namespace,
                "labels": labels,
            }
        });

        match self
            .client
            .create(ObjectHandle {
                kind: ObjectKind::Namespace,
                namespace: String::new(),
                name: namespace.to_string(),
                body,
            })
            .await
        {
            Ok(_) => Ok(()),
            Err(OrchestratorError::AlreadyExists { .. }) => Ok(()),
            Err(err) => Err(to_reconcile_error(err)),
        }
    }

    /// Copies `enclii-registry-credentials` from the system namespace into
    /// the target namespace if it isn't already present there. A missing
    /// source secret is a warning, not a fatal error — the deployment may
    /// still succeed if the image is already cached or the registry is
    /// public.
    pub async fn ensure_registry_credentials(
        &self,
        system_namespace: &str,
        target_namespace: &str,
        secret_name: &str,
    ) -> Result<(), ReconcileError> {
        if self
            .client
            .get(ObjectKind::Secret, target_namespace, secret_name)
            .await
            .map_err(to_reconcile_error)?
            .is_some()
        {
            return Ok(());
        }

        let source = match self
            .client
            .get(ObjectKind::Secret, system_namespace, secret_name)
            .await
            .map_err(to_reconcile_error)?
        {
            Some(source) => source,
            None => {
                warn!(
                    system_namespace,
                    "registry credentials secret missing from source namespace, deployment may fail image pulls"
                );
                return Ok(());
            }
        };

        let mut body = source.body;
        if let Some(metadata) = body.get_mut("metadata") {
            metadata["namespace"] = serde_json::Value::String(target_namespace.to_string());
            if let Some(obj) = metadata.as_object_mut() {
                obj.remove("resourceVersion");
                obj.remove("uid");
            }
        }

        match self
            .client
            .create(ObjectHandle {
                kind: ObjectKind::Secret,
                namespace: target_namespace.to_string(),
                name: secret_name.to_string(),
                body,
            })
            .await
        {
            Ok(_) => {
                info!(target_namespace, "copied registry credentials into namespace");
                Ok(())
            }
            // A concurrent reconciliation raced us to the copy; the
            // credentials are present either way.
            Err(OrchestratorError::AlreadyExists { .. }) => Ok(()),
            Err(err) => Err(to_reconcile_error(err)),
        }
    }

    async fn apply_secret(
        &self,
        secret: &k8s_openapi::api::core::v1::Secret,
    ) -> Result<AppliedObject, ReconcileError> {
        // Secret data is always fully replaced: there is no field on a
        // Secret worth preserving from a prior apply.
        self.create_or_replace(ObjectKind::Secret, secret).await
    }

    async fn apply_pvc(
        &self,
        pvc: &k8s_openapi::api::core::v1::PersistentVolumeClaim,
    ) -> Result<AppliedObject, ReconcileError> {
        // PVC spec is immutable after creation; only labels may be updated
        // on an existing claim.
        let name = name_of(&pvc.metadata);
        let namespace = namespace_of(&pvc.metadata);
        let body = serde_json::to_value(pvc).map_err(to_json_error)?;

        match self
            .client
            .get(ObjectKind::PersistentVolumeClaim, &namespace, &name)
            .await
            .map_err(to_reconcile_error)?
        {
            None => {
                self.client
                    .create(ObjectHandle {
                        kind: ObjectKind::PersistentVolumeClaim,
                        namespace: namespace.clone(),
                        name: name.clone(),
                        body,
                    })
                    .await
                    .map_err(to_reconcile_error)?;
            }
            Some(mut existing) => {
                if let (Some(existing_meta), Some(desired_meta)) =
                    (existing.body.get_mut("metadata"), body.get("metadata"))
                {
                    existing_meta["labels"] = desired_meta["labels"].clone();
                }
                self.client
                    .update(existing)
                    .await
                    .map_err(to_reconcile_error)?;
            }
        }

        Ok(AppliedObject {
            kind: "PersistentVolumeClaim".to_string(),
            name,
            namespace,
        })
    }

    async fn apply_deployment(
        &self,
        deployment: &k8s_openapi::api::apps::v1::Deployment,
    ) -> Result<AppliedObject, ReconcileError> {
        // Selector and pod-template labels are immutable once the
        // Deployment exists; everything else (image, env, resources,
        // replicas, probes) is replaced with the desired value.
        let name = name_of(&deployment.metadata);
        let namespace = namespace_of(&deployment.metadata);
        let desired = serde_json::to_value(deployment).map_err(to_json_error)?;

        match self
            .client
            .get(ObjectKind::Deployment, &namespace, &name)
            .await
            .map_err(to_reconcile_error)?
        {
            None => {
                self.client
                    .create(ObjectHandle {
                        kind: ObjectKind::Deployment,
                        namespace: namespace.clone(),
                        name: name.clone(),
                        body: desired,
                    })
                    .await
                    .map_err(to_reconcile_error)?;
            }
            Some(mut existing) => {
                let existing_selector = existing
                    .body
                    .get("spec")
                    .and_then(|s| s.get("selector"))
                    .cloned();
                let existing_template_labels = existing
                    .body
                    .get("spec")
                    .and_then(|s| s.get("template"))
                    .and_then(|t| t.get("metadata"))
                    .and_then(|m| m.get("labels"))
                    .cloned();

                existing.body = desired;
                if let Some(spec) = existing.body.get_mut("spec") {
                    if let Some(selector) = existing_selector {
                        spec["selector"] = selector;
                    }
                    if let Some(labels) = existing_template_labels {
                        spec["template"]["metadata"]["labels"] = labels;
                    }
                }

                self.client
                    .update(existing)
                    .await
                    .map_err(to_reconcile_error)?;
            }
        }

        Ok(AppliedObject {
            kind: "Deployment".to_string(),
            name,
            namespace,
        })
    }

    async fn apply_service(
        &self,
        service: &k8s_openapi::api::core::v1::Service,
    ) -> Result<AppliedObject, ReconcileError> {
        // clusterIP is orchestrator-assigned and must be carried forward;
        // the selector is preserved too since flipping it would orphan
        // existing endpoints mid-rollout.
        let name = name_of(&service.metadata);
        let namespace = namespace_of(&service.metadata);
        let desired = serde_json::to_value(service).map_err(to_json_error)?;

        match self
            .client
            .get(ObjectKind::Service, &namespace, &name)
            .await
            .map_err(to_reconcile_error)?
        {
            None => {
                self.client
                    .create(ObjectHandle {
                        kind: ObjectKind::Service,
                        namespace: namespace.clone(),
                        name: name.clone(),
                        body: desired,
                    })
                    .await
                    .map_err(to_reconcile_error)?;
            }
            Some(mut existing) => {
                let cluster_ip = existing
                    .body
                    .get("spec")
                    .and_then(|s| s.get("clusterIP"))
                    .cloned();

                existing.body = desired;
                if let (Some(spec), Some(ip)) = (existing.body.get_mut("spec"), cluster_ip) {
                    spec["clusterIP"] = ip;
                }

                self.client
                    .update(existing)
                    .await
                    .map_err(to_reconcile_error)?;
            }
        }

        Ok(AppliedObject {
            kind: "Service".to_string(),
            name,
            namespace,
        })
    }

    async fn apply_ingress(
        &self,
        ingress: &k8s_openapi::api::networking::v1::Ingress,
    ) -> Result<AppliedObject, ReconcileError> {
        self.create_or_replace(ObjectKind::Ingress, ingress).await
    }

    async fn apply_network_policy(
        &self,
        policy: &k8s_openapi::api::networking::v1::NetworkPolicy,
    ) -> Result<AppliedObject, ReconcileError> {
        self.create_or_replace(ObjectKind::NetworkPolicy, policy).await
    }

    /// Full desired-state replacement: used for objects with no field the
    /// orchestrator owns independently of what we send.
    async fn create_or_replace<T>(
        &self,
        kind: ObjectKind,
        object: &T,
    ) -> Result<AppliedObject, ReconcileError>
    where
        T: k8s_openapi::Metadata<Ty = k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta>
            + serde::Serialize,
    {
        let metadata = object.metadata();
        let name = name_of(metadata);
        let namespace = namespace_of(metadata);
        let body = serde_json::to_value(object).map_err(to_json_error)?;

        match self
            .client
            .get(kind, &namespace, &name)
            .await
            .map_err(to_reconcile_error)?
        {
            None => {
                self.client
                    .create(ObjectHandle {
                        kind,
                        namespace: namespace.clone(),
                        name: name.clone(),
                        body,
                    })
                    .await
                    .map_err(to_reconcile_error)?;
            }
            Some(mut existing) => {
                existing.body = body;
                self.client
                    .update(existing)
                    .await
                    .map_err(to_reconcile_error)?;
            }
        }

        Ok(AppliedObject {
            kind: format!("{kind:?}"),
            name,
            namespace,
        })
    }
}

fn name_of(metadata: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> String {
    metadata.name.clone().unwrap_or_default()
}

fn namespace_of(metadata: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> String {
    metadata.namespace.clone().unwrap_or_default()
}

fn to_reconcile_error(err: OrchestratorError) -> ReconcileError {
    warn!(error = %err, "orchestrator call failed");
    ReconcileError::Orchestrator(err.to_string())
}

fn to_json_error(err: serde_json::Error) -> ReconcileError {
    ReconcileError::Orchestrator(format!("failed to serialize manifest: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest_builder::ManifestBuilder;
    use crate::types::{
        EnvVar, EnvironmentConfig, HealthCheckConfig, ReconcileRequest, ResourceRequirements,
    };
    use switchyard_config::ReconcilerSettings;

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
            replicas: 2,
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

    /// Re-applying the same manifest twice must not mutate anything an
    /// orchestrator assigned on the first apply (e.g. a Service's clusterIP).
    #[tokio::test]
    async fn reapplying_identical_manifest_preserves_orchestrator_assigned_fields() {
        let client = InMemoryOrchestratorClient::new();
        let request = sample_request();
        let manifest = ManifestBuilder::build(&request, &ReconcilerSettings::default()).unwrap();
        let applier = OrchestratorApplier::new(&client);

        applier.apply(&manifest).await.unwrap();

        let mut assigned = client
            .get(ObjectKind::Service, &request.environment.namespace, &request.service_name)
            .await
            .unwrap()
            .unwrap();
        assigned.body["spec"]["clusterIP"] = serde_json::Value::String("10.96.1.1".to_string());
        client.update(assigned).await.unwrap();

        applier.apply(&manifest).await.unwrap();

        let after = client
            .get(ObjectKind::Service, &request.environment.namespace, &request.service_name)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            after.body["spec"]["clusterIP"],
            serde_json::Value::String("10.96.1.1".to_string())
        );
    }
}
