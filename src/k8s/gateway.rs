//! The narrow cluster surface the harness depends on

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::status::WorkloadStatus;
use crate::error::HarnessResult;
use crate::manifest::ManifestPayload;

/// Apply / get / delete primitives against a cluster.
///
/// Implementations never retry; transient failures are returned to the
/// caller, which owns its own poll loop.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// Apply a manifest in the gateway's default namespace
    async fn apply(&self, manifest: &ManifestPayload) -> HarnessResult<()>;

    /// Apply a manifest, forcing every namespaced resource into `namespace`
    async fn apply_in_namespace(
        &self,
        manifest: &ManifestPayload,
        namespace: &str,
    ) -> HarnessResult<()>;

    /// Fetch the current status of a pod
    async fn get_status(&self, name: &str, namespace: &str) -> HarnessResult<WorkloadStatus>;

    /// Delete a pod, returning the captured output
    async fn delete(&self, namespace: &str, name: &str) -> HarnessResult<Vec<u8>>;
}

/// Gateway shared between a catalog, its handles and the test
pub type SharedGateway = Arc<dyn ClusterGateway>;

/// `namespace/name` label used in logs and error messages
pub(crate) fn target(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}
