//! kube-rs backed cluster gateway

use std::path::Path;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, WatchEvent, WatchParams},
    config::{KubeConfigOptions, Kubeconfig},
    core::GroupVersionKind,
    discovery::{self, Scope},
    runtime::wait::{await_condition, conditions},
    Client, Config,
};
use tracing::{debug, info, instrument};

use super::gateway::{target, ClusterGateway};
use super::status::WorkloadStatus;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::manifest::ManifestPayload;

/// Field manager recorded on server-side applied objects
pub const FIELD_MANAGER: &str = "eirinix-testing";

/// Gateway talking to the API server directly through a kube::Client
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    namespace: String,
}

impl KubeGateway {
    /// Connect using the inferred kubeconfig or in-cluster config
    #[instrument(skip_all)]
    pub async fn new() -> HarnessResult<Self> {
        let config = Config::infer()
            .await
            .map_err(|e| HarnessError::gateway("connect", "inferred config", e))?;
        Self::connect(config)
    }

    /// Connect using an explicit kubeconfig file
    #[instrument]
    pub async fn from_kubeconfig(path: &Path) -> HarnessResult<Self> {
        let target = path.display().to_string();
        let kubeconfig = Kubeconfig::read_from(path)
            .map_err(|e| HarnessError::gateway("connect", target.clone(), e))?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| HarnessError::gateway("connect", target, e))?;
        Self::connect(config)
    }

    /// Connect with the kubeconfig from the harness settings, if any
    pub async fn from_config(config: &HarnessConfig) -> HarnessResult<Self> {
        match &config.kubeconfig {
            Some(path) => Self::from_kubeconfig(path).await,
            None => Self::new().await,
        }
    }

    /// Wrap an existing client; its default namespace becomes ours
    pub fn from_client(client: Client) -> Self {
        let namespace = client.default_namespace().to_string();
        Self { client, namespace }
    }

    fn connect(config: Config) -> HarnessResult<Self> {
        let client = Client::try_from(config)
            .map_err(|e| HarnessError::gateway("connect", "kube client", e))?;
        info!("Connected to Kubernetes cluster");
        Ok(Self::from_client(client))
    }

    /// Default namespace for manifests without an explicit one
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Check if cluster is reachable
    pub async fn health_check(&self) -> HarnessResult<bool> {
        let version = self
            .client
            .apiserver_version()
            .await
            .map_err(|e| HarnessError::gateway("health check", "apiserver", e))?;
        info!(version = %version.git_version, "Kubernetes cluster is healthy");
        Ok(true)
    }

    /// Open a watch on pods in `namespace`, optionally filtered by labels.
    ///
    /// The stream is meant to be fed to [`crate::watcher::dispatch`].
    #[instrument(skip(self))]
    pub async fn watch_pods(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> HarnessResult<BoxStream<'static, Result<WatchEvent<Pod>, kube::Error>>> {
        let mut params = WatchParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }

        let stream = self
            .pods(namespace)
            .watch(&params, "0")
            .await
            .map_err(|e| HarnessError::gateway("watch", format!("pods in {}", namespace), e))?;

        info!(namespace, "Pod watch started");
        Ok(stream.boxed())
    }

    /// Server-side apply every document of `manifest`.
    ///
    /// Namespaced resources land in `namespace_override` if given, else in the
    /// namespace written in the document, else in the client default.
    async fn apply_documents(
        &self,
        manifest: &ManifestPayload,
        namespace_override: Option<&str>,
    ) -> HarnessResult<()> {
        let scope = namespace_override.unwrap_or(&self.namespace).to_string();
        let docs = manifest
            .documents()
            .map_err(|e| HarnessError::gateway("apply", scope.clone(), e))?;

        for doc in docs {
            let mut obj: DynamicObject = serde_yaml::from_value(doc)
                .map_err(|e| HarnessError::gateway("apply", scope.clone(), e))?;

            let gvk = document_gvk(&obj)
                .ok_or_else(|| HarnessError::gateway("apply", scope.clone(), "document has no apiVersion/kind"))?;
            let name = obj
                .metadata
                .name
                .clone()
                .ok_or_else(|| HarnessError::gateway("apply", scope.clone(), "document has no metadata.name"))?;

            let (resource, caps) = discovery::pinned_kind(&self.client, &gvk)
                .await
                .map_err(|e| HarnessError::gateway("apply", format!("{} {}", gvk.kind, name), e))?;

            let api: Api<DynamicObject> = if caps.scope == Scope::Namespaced {
                let namespace = namespace_override
                    .map(str::to_string)
                    .or_else(|| obj.metadata.namespace.clone())
                    .unwrap_or_else(|| self.namespace.clone());
                obj.metadata.namespace = Some(namespace.clone());
                Api::namespaced_with(self.client.clone(), &namespace, &resource)
            } else {
                Api::all_with(self.client.clone(), &resource)
            };

            let params = PatchParams::apply(FIELD_MANAGER).force();
            api.patch(&name, &params, &Patch::Apply(&obj))
                .await
                .map_err(|e| HarnessError::gateway("apply", format!("{} {}", gvk.kind, name), e))?;

            info!(kind = %gvk.kind, name = %name, "Applied resource");
        }

        Ok(())
    }
}

/// Split `apiVersion` into group and version, e.g. `apps/v1` or `v1`
fn document_gvk(obj: &DynamicObject) -> Option<GroupVersionKind> {
    let types = obj.types.as_ref()?;
    let (group, version) = match types.api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", types.api_version.as_str()),
    };
    Some(GroupVersionKind::gvk(group, version, &types.kind))
}

#[async_trait]
impl ClusterGateway for KubeGateway {
    #[instrument(skip(self, manifest), fields(bytes = manifest.len()))]
    async fn apply(&self, manifest: &ManifestPayload) -> HarnessResult<()> {
        self.apply_documents(manifest, None).await
    }

    #[instrument(skip(self, manifest), fields(bytes = manifest.len()))]
    async fn apply_in_namespace(
        &self,
        manifest: &ManifestPayload,
        namespace: &str,
    ) -> HarnessResult<()> {
        self.apply_documents(manifest, Some(namespace)).await
    }

    #[instrument(skip(self))]
    async fn get_status(&self, name: &str, namespace: &str) -> HarnessResult<WorkloadStatus> {
        match self.pods(namespace).get(name).await {
            Ok(pod) => {
                let status = WorkloadStatus::from_pod(&pod);
                debug!(phase = %status.phase, "Fetched pod status");
                Ok(status)
            }
            Err(kube::Error::Api(e)) if e.code == 404 => {
                Err(HarnessError::not_found(name, namespace))
            }
            Err(e) => Err(HarnessError::gateway("get status", target(namespace, name), e)),
        }
    }

    /// Delete the pod and wait until the API server no longer has it,
    /// like `kubectl delete` does
    #[instrument(skip(self))]
    async fn delete(&self, namespace: &str, name: &str) -> HarnessResult<Vec<u8>> {
        let pods = self.pods(namespace);
        match pods.delete(name, &DeleteParams::default()).await {
            Ok(outcome) => {
                // Left means graceful deletion started; the pod is Terminating
                if let Some(pod) = outcome.left() {
                    let uid = pod.metadata.uid.unwrap_or_default();
                    debug!(uid = %uid, "Waiting for pod removal");
                    await_condition(pods, name, conditions::is_deleted(&uid))
                        .await
                        .map_err(|e| HarnessError::gateway("delete", target(namespace, name), e))?;
                }
                info!(name, namespace, "Deleted pod");
                Ok(format!("pod \"{}\" deleted\n", name).into_bytes())
            }
            Err(kube::Error::Api(e)) if e.code == 404 => {
                Err(HarnessError::not_found(name, namespace))
            }
            Err(kube::Error::Api(e)) => {
                let output = e.message.clone();
                Err(HarnessError::gateway_with_output(
                    "delete",
                    target(namespace, name),
                    output,
                    kube::Error::Api(e),
                ))
            }
            Err(e) => Err(HarnessError::gateway("delete", target(namespace, name), e)),
        }
    }
}
