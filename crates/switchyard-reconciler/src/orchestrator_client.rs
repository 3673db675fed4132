//! `OrchestratorClient`: the abstracted interface to the target
//! orchestrator. No live cluster connection is implemented here — only the
//! trait contract and an in-memory fake used by tests.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Namespace,
    Deployment,
    Service,
    Secret,
    PersistentVolumeClaim,
    Ingress,
    NetworkPolicy,
    ConfigMap,
    Pod,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("not found: {kind:?}/{namespace}/{name}")]
    NotFound {
        kind: ObjectKind,
        namespace: String,
        name: String,
    },
    #[error("already exists: {kind:?}/{namespace}/{name}")]
    AlreadyExists {
        kind: ObjectKind,
        namespace: String,
        name: String,
    },
    #[error("orchestrator call failed: {0}")]
    Other(String),
}

/// An object as stored/retrieved: kind, namespace, name, and its full
/// desired/observed body as JSON (the body is produced from typed
/// `k8s-openapi` structs by the manifest builder; the client only needs to
/// move bytes, not interpret most of them).
#[derive(Debug, Clone)]
pub struct ObjectHandle {
    pub kind: ObjectKind,
    pub namespace: String,
    pub name: String,
    pub body: serde_json::Value,
}

#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    async fn get(
        &self,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ObjectHandle>, OrchestratorError>;

    async fn create(&self, handle: ObjectHandle) -> Result<ObjectHandle, OrchestratorError>;

    async fn update(&self, handle: ObjectHandle) -> Result<ObjectHandle, OrchestratorError>;

    async fn delete(
        &self,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), OrchestratorError>;

    async fn list_by_label(
        &self,
        kind: ObjectKind,
        namespace: &str,
        label_selector: &HashMap<String, String>,
    ) -> Result<Vec<ObjectHandle>, OrchestratorError>;
}

/// In-memory fake used by reconciler tests; models a single namespace-keyed
/// store with the same NotFound/AlreadyExists error shape a real client
/// would surface.
#[derive(Default)]
pub struct InMemoryOrchestratorClient {
    objects: dashmap::DashMap<(ObjectKind, String, String), serde_json::Value>,
}

impl InMemoryOrchestratorClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches_labels(body: &serde_json::Value, selector: &HashMap<String, String>) -> bool {
        let labels = body
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .cloned()
            .unwrap_or_default();
        selector.iter().all(|(k, v)| {
            labels
                .get(k)
                .and_then(|val| val.as_str())
                .map(|s| s == v)
                .unwrap_or(false)
        })
    }
}

#[async_trait]
impl OrchestratorClient for InMemoryOrchestratorClient {
    async fn get(
        &self,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ObjectHandle>, OrchestratorError> {
        Ok(self
            .objects
            .get(&(kind, namespace.to_string(), name.to_string()))
            .map(|v| ObjectHandle {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
                body: v.clone(),
            }))
    }

    async fn create(&self, handle: ObjectHandle) -> Result<ObjectHandle, OrchestratorError> {
        let key = (handle.kind, handle.namespace.clone(), handle.name.clone());
        if self.objects.contains_key(&key) {
            return Err(OrchestratorError::AlreadyExists {
                kind: handle.kind,
                namespace: handle.namespace,
                name: handle.name,
            });
        }
        self.objects.insert(key, handle.body.clone());
        Ok(handle)
    }

    async fn update(&self, handle: ObjectHandle) -> Result<ObjectHandle, OrchestratorError> {
        let key = (handle.kind, handle.namespace.clone(), handle.name.clone());
        if !self.objects.contains_key(&key) {
            return Err(OrchestratorError::NotFound {
                kind: handle.kind,
                namespace: handle.namespace,
                name: handle.name,
            });
        }
        self.objects.insert(key, handle.body.clone());
        Ok(handle)
    }

    async fn delete(
        &self,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), OrchestratorError> {
        self.objects
            .remove(&(kind, namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn list_by_label(
        &self,
        kind: ObjectKind,
        namespace: &str,
        label_selector: &HashMap<String, String>,
    ) -> Result<Vec<ObjectHandle>, OrchestratorError> {
        Ok(self
            .objects
            .iter()
            .filter(|entry| {
                let (k, ns, _name) = entry.key();
                *k == kind && ns == namespace && Self::matches_labels(entry.value(), label_selector)
            })
            .map(|entry| {
                let (k, ns, name) = entry.key().clone();
                ObjectHandle {
                    kind: k,
                    namespace: ns,
                    name,
                    body: entry.value().clone(),
                }
            })
            .collect())
    }
}
