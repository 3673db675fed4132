//! `ManifestBuilder`: a pure function from a [`ReconcileRequest`] to the set
//! of desired orchestrator objects. Builds typed `k8s-openapi` structs; does
//! not talk to any client. Wall time is used only for annotations, never
//! for control flow.

use crate::types::{AddonKind, EnvironmentConfig, ReconcileRequest};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar as KubeEnvVar, EnvVarSource, HTTPGetAction,
    LocalObjectReference, PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSpec,
    PodTemplateSpec, Probe, ResourceRequirements as KubeResourceRequirements, Secret,
    SecretKeySelector, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, IPBlock, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, NetworkPolicy, NetworkPolicyEgressRule,
    NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicyPort, NetworkPolicySpec,
    ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;
use switchyard_config::ReconcilerSettings;

use crate::error::ReconcileError;
use crate::types::Labels;

const TERMINATION_GRACE_PERIOD_SECONDS: i64 = 30;
const KUBECONFIG_ENV_VAR: &str = "ENCLII_KUBE_CONFIG";
const KUBECONFIG_CONFIGMAP_NAME: &str = "switchyard-kubeconfig";
const KUBECONFIG_MOUNT_PATH: &str = "/etc/kubeconfig";

/// The full set of objects desired for one service's environment. Each
/// field is `None` when the request doesn't call for that object (e.g. no
/// domains configured means no Ingress).
pub struct DesiredManifest {
    pub secret: Option<Secret>,
    pub pvcs: Vec<PersistentVolumeClaim>,
    pub deployment: Deployment,
    pub service: Service,
    pub ingress: Option<Ingress>,
    pub network_policies: Vec<NetworkPolicy>,
}

pub struct ManifestBuilder;

impl ManifestBuilder {
    pub fn build(
        request: &ReconcileRequest,
        settings: &ReconcilerSettings,
    ) -> Result<DesiredManifest, ReconcileError> {
        request.validate()?;

        let port = switchyard_config::resolve_port(settings);
        let labels = base_labels(request);
        let pod_labels = pod_labels(request, &labels);
        let secret = build_env_secret(request, &labels);
        let pvcs = build_pvcs(request, &labels);
        let deployment = build_deployment(request, &pod_labels, port);
        let service = build_service(request, &labels, port);
        let ingress = build_ingress(request, &labels, settings);
        let network_policies = build_network_policies(request, &labels, settings, port);

        Ok(DesiredManifest {
            secret,
            pvcs,
            deployment,
            service,
            ingress,
            network_policies,
        })
    }
}

/// Labels shared by every object this service owns. Matches the minimal
/// selector pair `{app, enclii.dev/service}` plus project/managed-by.
fn base_labels(request: &ReconcileRequest) -> Labels {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), request.service_name.clone());
    labels.insert("enclii.dev/service".to_string(), request.service_name.clone());
    labels.insert("enclii.dev/project".to_string(), request.project_id.clone());
    labels.insert("enclii.dev/managed-by".to_string(), "switchyard".to_string());
    labels.into_iter().collect()
}

/// Deployment and pod-template labels add version/release/deployment on
/// top of the base set; these aren't part of the immutable selector.
fn pod_labels(request: &ReconcileRequest, base: &Labels) -> Labels {
    let mut labels = base.clone();
    labels.insert("version".to_string(), request.release_version.clone());
    labels.insert(
        "enclii.dev/release".to_string(),
        request.release_version.clone(),
    );
    labels.insert(
        "enclii.dev/deployment".to_string(),
        request.deployment_id.clone(),
    );
    labels
}

/// The Deployment selector: the minimal, immutable pair named in the
/// contract. Must never grow once a Deployment exists (see the applier).
fn selector_labels(request: &ReconcileRequest) -> Labels {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), request.service_name.clone());
    labels.insert("enclii.dev/service".to_string(), request.service_name.clone());
    labels.into_iter().collect()
}

fn object_meta(name: String, environment: &EnvironmentConfig, labels: &Labels) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(environment.namespace.clone()),
        labels: Some(labels.clone().into_iter().collect()),
        ..Default::default()
    }
}

fn secret_name(service_name: &str) -> String {
    format!("{service_name}-secrets")
}

fn build_env_secret(request: &ReconcileRequest, labels: &Labels) -> Option<Secret> {
    let secret_vars: BTreeMap<String, k8s_openapi::ByteString> = request
        .env_vars
        .iter()
        .filter(|v| v.is_secret)
        .map(|v| {
            (
                v.key.clone(),
                k8s_openapi::ByteString(v.value.clone().into_bytes()),
            )
        })
        .collect();

    if secret_vars.is_empty() {
        return None;
    }

    Some(Secret {
        metadata: object_meta(
            secret_name(&request.service_name),
            &request.environment,
            labels,
        ),
        data: Some(secret_vars),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    })
}

fn pvc_name(service_name: &str, volume_name: &str) -> String {
    format!("{service_name}-{volume_name}")
}

fn build_pvcs(request: &ReconcileRequest, labels: &Labels) -> Vec<PersistentVolumeClaim> {
    request
        .volumes
        .iter()
        .map(|vol| {
            let mut requests = BTreeMap::new();
            requests.insert("storage".to_string(), Quantity(vol.size.clone()));

            PersistentVolumeClaim {
                metadata: object_meta(
                    pvc_name(&request.service_name, &vol.name),
                    &request.environment,
                    labels,
                ),
                spec: Some(PersistentVolumeClaimSpec {
                    access_modes: Some(vec![vol.access_mode_or_default().to_string()]),
                    storage_class_name: Some(vol.storage_class_or_default().to_string()),
                    resources: Some(VolumeResourceRequirements {
                        requests: Some(requests),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }
        })
        .collect()
}

fn addon_env_var(binding: &crate::types::AddonBinding) -> KubeEnvVar {
    match binding.kind {
        AddonKind::Postgres => KubeEnvVar {
            name: binding.env_var_name.clone(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: Some(format!("{}-app", binding.name)),
                    key: "uri".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        AddonKind::Mysql => KubeEnvVar {
            name: binding.env_var_name.clone(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: Some(format!("{}-credentials", binding.name)),
                    key: "uri".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        AddonKind::Redis => KubeEnvVar {
            name: binding.env_var_name.clone(),
            value: Some(format!(
                "redis://{}.{}.svc.cluster.local:6379/0",
                binding.name, binding.namespace
            )),
            ..Default::default()
        },
    }
}

fn standard_env_vars(request: &ReconcileRequest, port: u16) -> Vec<KubeEnvVar> {
    [
        ("ENCLII_SERVICE_NAME", request.service_name.clone()),
        ("ENCLII_PROJECT_ID", request.project_id.clone()),
        ("ENCLII_RELEASE_VERSION", request.release_version.clone()),
        ("ENCLII_DEPLOYMENT_ID", request.deployment_id.clone()),
        ("PORT", port.to_string()),
    ]
    .into_iter()
    .map(|(name, value)| KubeEnvVar {
        name: name.to_string(),
        value: Some(value),
        ..Default::default()
    })
    .collect()
}

fn build_container_env(request: &ReconcileRequest, port: u16) -> Vec<KubeEnvVar> {
    let mut env = standard_env_vars(request, port);

    env.extend(request.env_vars.iter().filter(|v| !v.is_secret).map(|v| KubeEnvVar {
        name: v.key.clone(),
        value: Some(v.value.clone()),
        ..Default::default()
    }));

    for v in request.env_vars.iter().filter(|v| v.is_secret) {
        env.push(KubeEnvVar {
            name: v.key.clone(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: Some(secret_name(&request.service_name)),
                    key: v.key.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    for binding in &request.addon_bindings {
        env.push(addon_env_var(binding));
    }

    env
}

fn build_probe(path: &str, port: u16, cfg: &crate::types::ProbeConfig) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::Int(port as i32),
            ..Default::default()
        }),
        initial_delay_seconds: Some(cfg.initial_delay_seconds as i32),
        timeout_seconds: Some(cfg.timeout_seconds as i32),
        period_seconds: Some(cfg.period_seconds as i32),
        failure_threshold: Some(cfg.failure_threshold as i32),
        ..Default::default()
    }
}

fn build_deployment(request: &ReconcileRequest, pod_labels: &Labels, port: u16) -> Deployment {
    let mut volumes = Vec::new();
    let mut volume_mounts = Vec::new();

    for vol in &request.volumes {
        volumes.push(Volume {
            name: vol.name.clone(),
            persistent_volume_claim: Some(k8s_openapi::api::core::v1::PersistentVolumeClaimVolumeSource {
                claim_name: pvc_name(&request.service_name, &vol.name),
                read_only: Some(false),
            }),
            ..Default::default()
        });
        volume_mounts.push(VolumeMount {
            name: vol.name.clone(),
            mount_path: vol.mount_path.clone(),
            ..Default::default()
        });
    }

    if std::env::var(KUBECONFIG_ENV_VAR).is_ok() {
        volumes.push(Volume {
            name: "kubeconfig".to_string(),
            config_map: Some(k8s_openapi::api::core::v1::ConfigMapVolumeSource {
                name: Some(KUBECONFIG_CONFIGMAP_NAME.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        volume_mounts.push(VolumeMount {
            name: "kubeconfig".to_string(),
            mount_path: KUBECONFIG_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        });
    }

    let mut limits = BTreeMap::new();
    limits.insert("cpu".to_string(), Quantity(request.resources.cpu_limit.clone()));
    limits.insert(
        "memory".to_string(),
        Quantity(request.resources.memory_limit.clone()),
    );
    let mut resource_requests = BTreeMap::new();
    resource_requests.insert("cpu".to_string(), Quantity(request.resources.cpu_request.clone()));
    resource_requests.insert(
        "memory".to_string(),
        Quantity(request.resources.memory_request.clone()),
    );

    let (liveness_probe, readiness_probe) = if request.health_check.disabled {
        (None, None)
    } else {
        (
            Some(build_probe(
                &request.health_check.liveness.path,
                port,
                &request.health_check.liveness,
            )),
            Some(build_probe(
                &request.health_check.readiness.path,
                port,
                &request.health_check.readiness,
            )),
        )
    };

    let container = Container {
        name: request.service_name.clone(),
        image: Some(request.image.clone()),
        env: Some(build_container_env(request, port)),
        ports: Some(vec![ContainerPort {
            name: Some("http".to_string()),
            container_port: port as i32,
            ..Default::default()
        }]),
        resources: Some(KubeResourceRequirements {
            limits: Some(limits),
            requests: Some(resource_requests),
            ..Default::default()
        }),
        liveness_probe,
        readiness_probe,
        volume_mounts: if volume_mounts.is_empty() {
            None
        } else {
            Some(volume_mounts)
        },
        ..Default::default()
    };

    let selector = selector_labels(request);

    Deployment {
        metadata: object_meta(request.service_name.clone(), &request.environment, pod_labels),
        spec: Some(DeploymentSpec {
            replicas: Some(request.replicas as i32),
            selector: LabelSelector {
                match_labels: Some(selector.clone().into_iter().collect()),
                ..Default::default()
            },
            strategy: Some(DeploymentStrategy {
                type_: Some("RollingUpdate".to_string()),
                rolling_update: Some(RollingUpdateDeployment {
                    max_unavailable: Some(IntOrString::String("25%".to_string())),
                    max_surge: Some(IntOrString::String("25%".to_string())),
                }),
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels.clone().into_iter().collect()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: if volumes.is_empty() { None } else { Some(volumes) },
                    termination_grace_period_seconds: Some(TERMINATION_GRACE_PERIOD_SECONDS),
                    restart_policy: Some("Always".to_string()),
                    image_pull_secrets: Some(vec![LocalObjectReference {
                        name: Some("enclii-registry-credentials".to_string()),
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

fn build_service(request: &ReconcileRequest, labels: &Labels, port: u16) -> Service {
    let selector = selector_labels(request);

    Service {
        metadata: object_meta(request.service_name.clone(), &request.environment, labels),
        spec: Some(ServiceSpec {
            selector: Some(selector.into_iter().collect()),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: 80,
                target_port: Some(IntOrString::Int(port as i32)),
                ..Default::default()
            }]),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        status: None,
    }
}

fn sanitize_domain(domain: &str) -> String {
    domain.replace('.', "-")
}

fn build_ingress(
    request: &ReconcileRequest,
    labels: &Labels,
    settings: &ReconcilerSettings,
) -> Option<Ingress> {
    if request.domains.is_empty() {
        return None;
    }

    let default_backend = || IngressBackend {
        service: Some(IngressServiceBackend {
            name: request.service_name.clone(),
            port: Some(ServiceBackendPort {
                number: Some(80),
                ..Default::default()
            }),
        }),
        ..Default::default()
    };

    let mut rules = Vec::new();
    let mut tls = Vec::new();

    for domain in &request.domains {
        let paths = if domain.routes.is_empty() {
            vec![HTTPIngressPath {
                path: Some("/".to_string()),
                path_type: "Prefix".to_string(),
                backend: default_backend(),
            }]
        } else {
            domain
                .routes
                .iter()
                .map(|route| HTTPIngressPath {
                    path: Some(route.path.clone()),
                    path_type: "Prefix".to_string(),
                    backend: default_backend(),
                })
                .collect()
        };

        rules.push(IngressRule {
            host: Some(domain.hostname.clone()),
            http: Some(HTTPIngressRuleValue { paths }),
        });

        if domain.tls {
            tls.push(IngressTLS {
                hosts: Some(vec![domain.hostname.clone()]),
                secret_name: Some(format!(
                    "{}-{}-tls",
                    request.service_name,
                    sanitize_domain(&domain.hostname)
                )),
            });
        }
    }

    let mut annotations = BTreeMap::new();
    annotations.insert(
        "kubernetes.io/ingress.class".to_string(),
        settings.ingress_class.clone(),
    );
    annotations.insert(
        "cert-manager.io/cluster-issuer".to_string(),
        settings.cert_issuer.clone(),
    );
    annotations.insert(
        "nginx.ingress.kubernetes.io/ssl-redirect".to_string(),
        "true".to_string(),
    );

    let mut metadata = object_meta(request.service_name.clone(), &request.environment, labels);
    metadata.annotations = Some(annotations.into_iter().collect());

    Some(Ingress {
        metadata,
        spec: Some(IngressSpec {
            rules: Some(rules),
            tls: if tls.is_empty() { None } else { Some(tls) },
            ..Default::default()
        }),
        status: None,
    })
}

/// Two NetworkPolicies per service: restrict inbound traffic to the
/// resolved port from known ingress sources, and restrict outbound traffic
/// to DNS, the API server, and declared addon backends.
fn build_network_policies(
    request: &ReconcileRequest,
    labels: &Labels,
    settings: &ReconcilerSettings,
    port: u16,
) -> Vec<NetworkPolicy> {
    let pod_selector = LabelSelector {
        match_labels: Some(selector_labels(request).into_iter().collect()),
        ..Default::default()
    };

    let own_namespace_peer = || NetworkPolicyPeer {
        namespace_selector: Some(LabelSelector {
            match_labels: Some(
                [("kubernetes.io/metadata.name".to_string(), request.environment.namespace.clone())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    };

    let namespace_peer = |namespace: &str| NetworkPolicyPeer {
        namespace_selector: Some(LabelSelector {
            match_labels: Some(
                [("kubernetes.io/metadata.name".to_string(), namespace.to_string())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    };

    let tcp_port = |p: i32| NetworkPolicyPort {
        port: Some(IntOrString::Int(p)),
        protocol: Some("TCP".to_string()),
        end_port: None,
    };

    let ingress_policy = NetworkPolicy {
        metadata: object_meta(
            format!("{}-ingress", request.service_name),
            &request.environment,
            labels,
        ),
        spec: Some(NetworkPolicySpec {
            pod_selector: pod_selector.clone(),
            policy_types: Some(vec!["Ingress".to_string()]),
            ingress: Some(vec![NetworkPolicyIngressRule {
                from: Some(vec![
                    namespace_peer(&settings.ingress_controller_namespace),
                    namespace_peer(&settings.tunnel_namespace),
                    own_namespace_peer(),
                ]),
                ports: Some(vec![tcp_port(port as i32)]),
            }]),
            egress: None,
        }),
    };

    let mut egress_rules = vec![
        // DNS to kube-system, UDP and TCP 53.
        NetworkPolicyEgressRule {
            to: Some(vec![NetworkPolicyPeer {
                namespace_selector: Some(LabelSelector {
                    match_labels: Some(
                        [("kubernetes.io/metadata.name".to_string(), "kube-system".to_string())]
                            .into_iter()
                            .collect(),
                    ),
                    ..Default::default()
                }),
                pod_selector: Some(LabelSelector {
                    match_labels: Some(
                        [("k8s-app".to_string(), "kube-dns".to_string())]
                            .into_iter()
                            .collect(),
                    ),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ports: Some(vec![
                NetworkPolicyPort {
                    port: Some(IntOrString::Int(53)),
                    protocol: Some("UDP".to_string()),
                    end_port: None,
                },
                tcp_port(53),
            ]),
        },
        // API server over the internal CIDR.
        NetworkPolicyEgressRule {
            to: Some(vec![NetworkPolicyPeer {
                ip_block: Some(IPBlock {
                    cidr: "10.0.0.0/8".to_string(),
                    except: None,
                }),
                ..Default::default()
            }]),
            ports: Some(vec![tcp_port(443), tcp_port(6443)]),
        },
        // Single-node API-server case: 6443 reachable from anywhere.
        NetworkPolicyEgressRule {
            to: Some(vec![NetworkPolicyPeer {
                ip_block: Some(IPBlock {
                    cidr: "0.0.0.0/0".to_string(),
                    except: None,
                }),
                ..Default::default()
            }]),
            ports: Some(vec![tcp_port(6443)]),
        },
        // Shared data namespace reachable on the common addon ports
        // regardless of whether a binding names it explicitly.
        NetworkPolicyEgressRule {
            to: Some(vec![namespace_peer(&settings.data_namespace)]),
            ports: Some(vec![tcp_port(5432), tcp_port(6379)]),
        },
        // Unrestricted within the service's own namespace.
        NetworkPolicyEgressRule {
            to: Some(vec![own_namespace_peer()]),
            ports: None,
        },
    ];

    for binding in &request.addon_bindings {
        let addon_port = match binding.kind {
            AddonKind::Postgres => 5432,
            AddonKind::Redis => 6379,
            AddonKind::Mysql => 3306,
        };
        egress_rules.push(NetworkPolicyEgressRule {
            to: Some(vec![namespace_peer(&binding.namespace)]),
            ports: Some(vec![tcp_port(addon_port)]),
        });
    }

    let egress_policy = NetworkPolicy {
        metadata: object_meta(
            format!("{}-egress", request.service_name),
            &request.environment,
            labels,
        ),
        spec: Some(NetworkPolicySpec {
            pod_selector,
            policy_types: Some(vec!["Egress".to_string()]),
            ingress: None,
            egress: Some(egress_rules),
        }),
    };

    vec![ingress_policy, egress_policy]
}

#[cfg(test)]
mod tests {
    use super::*;
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
            replicas: 3,
            env_vars: vec![
                EnvVar {
                    key: "LOG_LEVEL".to_string(),
                    value: "info".to_string(),
                    is_secret: false,
                },
                EnvVar {
                    key: "API_KEY".to_string(),
                    value: "super-secret".to_string(),
                    is_secret: true,
                },
            ],
            addon_bindings: vec![],
            domains: vec![],
            health_check: HealthCheckConfig::default(),
            resources: ResourceRequirements::default(),
            volumes: vec![],
        }
    }

    fn settings() -> ReconcilerSettings {
        ReconcilerSettings::default()
    }

    #[test]
    fn secret_vars_are_split_into_their_own_secret_object() {
        let request = sample_request();
        let manifest = ManifestBuilder::build(&request, &settings()).unwrap();
        let secret = manifest.secret.expect("expected a Secret for the secret env var");
        assert_eq!(secret.metadata.name.unwrap(), "payments-api-secrets");
        assert!(secret.data.unwrap().contains_key("API_KEY"));
    }

    #[test]
    fn no_secret_object_when_no_secret_env_vars() {
        let mut request = sample_request();
        request.env_vars.retain(|v| !v.is_secret);
        let manifest = ManifestBuilder::build(&request, &settings()).unwrap();
        assert!(manifest.secret.is_none());
    }

    #[test]
    fn no_ingress_when_no_domains_configured() {
        let request = sample_request();
        let manifest = ManifestBuilder::build(&request, &settings()).unwrap();
        assert!(manifest.ingress.is_none());
    }

    #[test]
    fn deployment_selector_is_subset_of_pod_template_labels() {
        let request = sample_request();
        let manifest = ManifestBuilder::build(&request, &settings()).unwrap();
        let spec = manifest.deployment.spec.unwrap();
        let selector = spec.selector.match_labels.unwrap();
        let pod_labels = spec.template.metadata.unwrap().labels.unwrap();
        for (k, v) in &selector {
            assert_eq!(pod_labels.get(k), Some(v));
        }
    }

    #[test]
    fn deployment_carries_rolling_update_and_pull_secret() {
        let request = sample_request();
        let manifest = ManifestBuilder::build(&request, &settings()).unwrap();
        let spec = manifest.deployment.spec.unwrap();
        let strategy = spec.strategy.unwrap();
        let rolling = strategy.rolling_update.unwrap();
        assert_eq!(
            rolling.max_unavailable,
            Some(IntOrString::String("25%".to_string()))
        );
        let pod_spec = spec.template.spec.unwrap();
        assert_eq!(
            pod_spec.image_pull_secrets.unwrap()[0].name.as_deref(),
            Some("enclii-registry-credentials")
        );
    }

    #[test]
    fn standard_env_vars_are_present_with_resolved_port() {
        let request = sample_request();
        let manifest = ManifestBuilder::build(&request, &settings()).unwrap();
        let container = &manifest.deployment.spec.unwrap().template.spec.unwrap().containers[0];
        let env = container.env.as_ref().unwrap();
        let port_var = env.iter().find(|v| v.name == "PORT").unwrap();
        assert_eq!(port_var.value.as_deref(), Some("4200"));
        assert!(env.iter().any(|v| v.name == "ENCLII_SERVICE_NAME"));
    }

    #[test]
    fn invalid_request_is_rejected_before_any_object_is_built() {
        let mut request = sample_request();
        request.environment.namespace = String::new();
        assert!(ManifestBuilder::build(&request, &settings()).is_err());
    }
}
