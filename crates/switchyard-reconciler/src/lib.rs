pub mod applier;
pub mod error;
pub mod manifest_builder;
pub mod orchestrator_client;
pub mod reconciler;
pub mod types;

pub use applier::OrchestratorApplier;
pub use error::{ErrorKind, ReconcileError};
pub use manifest_builder::{DesiredManifest, ManifestBuilder};
pub use orchestrator_client::{
    InMemoryOrchestratorClient, ObjectHandle, ObjectKind, OrchestratorClient, OrchestratorError,
};
pub use reconciler::Reconciler;
pub use types::{
    AddonBinding, AddonKind, AppliedObject, DomainConfig, EnvVar, EnvironmentConfig,
    HealthCheckConfig, Labels, ProbeConfig, ReconcileRequest, ReconcileResult,
    ResourceRequirements, RouteConfig, VolumeRequest,
};
