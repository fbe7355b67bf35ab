use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, Namespace, Pod, PodSpec, PodTemplateSpec,
    ResourceQuota, ResourceQuotaSpec, ResourceRequirements, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule, IngressServiceBackend,
    IngressSpec, ServiceBackendPort,
};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};

use super::{ClusterGateway, GatewayResult};

pub const MANAGED_LABEL: &str = "kubdev.managed";
pub const APP_LABEL: &str = "app";
pub const IDE_CONTAINER_PORT: i32 = 8080;
const MANAGER: &str = "kubedev-orchestrator";

fn labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP_LABEL.to_string(), name.to_string()),
        (MANAGED_LABEL.to_string(), "true".to_string()),
    ])
}

pub struct DeploymentStatusView {
    pub phase: &'static str,
    pub ready_replicas: i32,
    pub total_replicas: i32,
}

impl ClusterGateway {
    pub async fn ensure_namespace(&self, name: &str) -> GatewayResult<()> {
        let api: Api<Namespace> = Api::all(self.client());
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        self.with_idempotent_create(api.create(&PostParams::default(), &ns)).await
    }

    pub async fn ensure_resource_quota(
        &self,
        namespace: &str,
        name: &str,
        cpu: &str,
        memory: &str,
        storage: &str,
    ) -> GatewayResult<()> {
        let api: Api<ResourceQuota> = Api::namespaced(self.client(), namespace);
        let mut hard = BTreeMap::new();
        hard.insert("requests.cpu".to_string(), Quantity(cpu.to_string()));
        hard.insert("requests.memory".to_string(), Quantity(memory.to_string()));
        hard.insert(
            "requests.storage".to_string(),
            Quantity(storage.to_string()),
        );
        let quota = ResourceQuota {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: Some(ResourceQuotaSpec {
                hard: Some(hard),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.with_idempotent_create(api.create(&PostParams::default(), &quota)).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_deployment(
        &self,
        namespace: &str,
        name: &str,
        image: &str,
        env: &BTreeMap<String, String>,
        cpu: &str,
        memory: &str,
    ) -> GatewayResult<()> {
        let api: Api<Deployment> = Api::namespaced(self.client(), namespace);
        let mut requests = BTreeMap::new();
        requests.insert("cpu".to_string(), Quantity(cpu.to_string()));
        requests.insert("memory".to_string(), Quantity(memory.to_string()));

        let env_vars: Vec<EnvVar> = env
            .iter()
            .map(|(k, v)| EnvVar {
                name: k.clone(),
                value: Some(v.clone()),
                ..Default::default()
            })
            .collect();

        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels(name)),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                selector: LabelSelector {
                    match_labels: Some(labels(name)),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels(name)),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "ide".to_string(),
                            image: Some(image.to_string()),
                            ports: Some(vec![ContainerPort {
                                container_port: IDE_CONTAINER_PORT,
                                ..Default::default()
                            }]),
                            env: Some(env_vars),
                            resources: Some(ResourceRequirements {
                                requests: Some(requests),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        self.with_idempotent_create(api.create(&PostParams::default(), &deployment)).await
    }

    pub async fn create_service(&self, namespace: &str, name: &str) -> GatewayResult<()> {
        let api: Api<Service> = Api::namespaced(self.client(), namespace);
        let service = Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels(name)),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(labels(name)),
                ports: Some(vec![ServicePort {
                    port: 80,
                    target_port: Some(
                        k8s_openapi::apimachinery::pkg::util::intstr::IntOrString::Int(
                            IDE_CONTAINER_PORT,
                        ),
                    ),
                    ..Default::default()
                }]),
                type_: Some("ClusterIP".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.with_idempotent_create(api.create(&PostParams::default(), &service)).await
    }

    pub async fn create_ingress(
        &self,
        namespace: &str,
        name: &str,
        host: &str,
    ) -> GatewayResult<()> {
        let api: Api<Ingress> = Api::namespaced(self.client(), namespace);
        let ingress = Ingress {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels(name)),
                annotations: Some(BTreeMap::from([(
                    "kubernetes.io/ingress.class".to_string(),
                    "nginx".to_string(),
                )])),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                rules: Some(vec![IngressRule {
                    host: Some(host.to_string()),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some("/".to_string()),
                            path_type: "Prefix".to_string(),
                            backend: IngressBackend {
                                service: Some(IngressServiceBackend {
                                    name: name.to_string(),
                                    port: Some(ServiceBackendPort {
                                        number: Some(80),
                                        ..Default::default()
                                    }),
                                }),
                                ..Default::default()
                            },
                        }],
                    }),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.with_idempotent_create(api.create(&PostParams::default(), &ingress)).await
    }

    pub async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> GatewayResult<()> {
        let api: Api<Deployment> = Api::namespaced(self.client(), namespace);
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        self.with_write_timeout(api.patch(
            name,
            &PatchParams::apply(MANAGER),
            &Patch::Merge(&patch),
        ))
        .await
        .map(|_| ())
    }

    pub async fn get_deployment_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> GatewayResult<DeploymentStatusView> {
        let api: Api<Deployment> = Api::namespaced(self.client(), namespace);
        self.with_read_timeout(api.get(name)).await.map(|d| {
            let status = d.status.unwrap_or_default();
            let ready = status.ready_replicas.unwrap_or(0);
            let total = status.replicas.unwrap_or(0);
            DeploymentStatusView {
                phase: if ready >= 1 { "Running" } else { "Pending" },
                ready_replicas: ready,
                total_replicas: total,
            }
        })
    }

    pub async fn delete_deployment(&self, namespace: &str, name: &str) -> GatewayResult<()> {
        let api: Api<Deployment> = Api::namespaced(self.client(), namespace);
        match self
            .with_write_timeout(api.delete(name, &DeleteParams::default()))
            .await
        {
            GatewayResult::NotFound => GatewayResult::Ok(()),
            other => other.map(|_| ()),
        }
    }

    pub async fn delete_service(&self, namespace: &str, name: &str) -> GatewayResult<()> {
        let api: Api<Service> = Api::namespaced(self.client(), namespace);
        match self
            .with_write_timeout(api.delete(name, &DeleteParams::default()))
            .await
        {
            GatewayResult::NotFound => GatewayResult::Ok(()),
            other => other.map(|_| ()),
        }
    }

    pub async fn delete_ingress(&self, namespace: &str, name: &str) -> GatewayResult<()> {
        let api: Api<Ingress> = Api::namespaced(self.client(), namespace);
        match self
            .with_write_timeout(api.delete(name, &DeleteParams::default()))
            .await
        {
            GatewayResult::NotFound => GatewayResult::Ok(()),
            other => other.map(|_| ()),
        }
    }

    /// Deletes a dedicated per-tenant CR namespace. Not used by lifecycle
    /// `Delete` against the shared `CR_NAMESPACE` — see DESIGN.md.
    pub async fn delete_namespace(&self, name: &str) -> GatewayResult<()> {
        let api: Api<Namespace> = Api::all(self.client());
        match self
            .with_write_timeout(api.delete(name, &DeleteParams::default()))
            .await
        {
            GatewayResult::NotFound => GatewayResult::Ok(()),
            other => other.map(|_| ()),
        }
    }

    pub async fn get_pod_logs(
        &self,
        namespace: &str,
        workload: &str,
        tail_lines: i64,
    ) -> GatewayResult<Vec<String>> {
        let pods: Api<Pod> = Api::namespaced(self.client(), namespace);
        let selector = format!("{APP_LABEL}={workload}");
        let list = match self
            .with_read_timeout(pods.list(&ListParams::default().labels(&selector)))
            .await
        {
            GatewayResult::Ok(list) => list,
            GatewayResult::NotFound => return GatewayResult::Ok(vec![]),
            GatewayResult::Unavailable(r) => return GatewayResult::Unavailable(r),
        };
        let Some(pod) = list.items.into_iter().next() else {
            return GatewayResult::Ok(vec![]);
        };
        let name = pod.metadata.name.unwrap_or_default();
        let log_params = kube::api::LogParams {
            tail_lines: Some(tail_lines),
            ..Default::default()
        };
        self.with_read_timeout(pods.logs(&name, &log_params))
            .await
            .map(|text| text.lines().map(str::to_string).collect())
    }

    pub async fn list_managed_pods(&self, namespace: Option<&str>) -> GatewayResult<Vec<Pod>> {
        let selector = format!("{MANAGED_LABEL}=true");
        let list_params = ListParams::default().labels(&selector);
        let result = match namespace {
            Some(ns) => {
                let api: Api<Pod> = Api::namespaced(self.client(), ns);
                self.with_read_timeout(api.list(&list_params)).await
            }
            None => {
                let api: Api<Pod> = Api::all(self.client());
                self.with_read_timeout(api.list(&list_params)).await
            }
        };
        result.map(|l| l.items)
    }

    /// Resolves an access URL when the CR's `status.ideUrl` is empty: for a
    /// NodePort service, `http://<platform-domain>:<nodePort>`; for
    /// ClusterIP, a port-forward-style local URL. Returns `None` when
    /// neither is resolvable.
    pub async fn get_nodeport_url(
        &self,
        namespace: &str,
        service_name: &str,
        platform_domain: &str,
    ) -> GatewayResult<Option<String>> {
        let api: Api<Service> = Api::namespaced(self.client(), namespace);
        self.with_read_timeout(api.get(service_name)).await.map(|svc| {
            let spec = svc.spec.unwrap_or_default();
            match spec.type_.as_deref() {
                Some("NodePort") => spec
                    .ports
                    .unwrap_or_default()
                    .into_iter()
                    .find_map(|p| p.node_port)
                    .map(|node_port| format!("http://{platform_domain}:{node_port}")),
                _ => spec
                    .ports
                    .unwrap_or_default()
                    .into_iter()
                    .next()
                    .map(|p| format!("http://{platform_domain}:{}", p.port)),
            }
        })
    }
}
