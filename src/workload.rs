//! Lifecycle handle for a fixture workload running in the cluster

use std::fmt;

use tracing::{info, instrument, warn};

use crate::error::HarnessResult;
use crate::k8s::{SharedGateway, WorkloadStatus};
use crate::manifest::WorkloadFixture;

/// Namespace used when a fixture is applied without an explicit one
pub const DEFAULT_NAMESPACE: &str = "default";

/// One fixture pod created through a [`crate::k8s::ClusterGateway`].
///
/// The cluster is the source of truth; the handle only remembers the last
/// snapshot it fetched. Mutation needs `&mut self`, so a handle belongs to a
/// single test task.
pub struct ManagedWorkload {
    name: String,
    namespace: String,
    status: Option<WorkloadStatus>,
    gateway: SharedGateway,
}

impl ManagedWorkload {
    /// Apply `fixture` and return a handle for the pod it creates.
    ///
    /// With `namespace == None` the manifest is applied as-is and the pod is
    /// tracked in `default`.
    #[instrument(skip(gateway, fixture), fields(name = %fixture.name))]
    pub async fn start(
        gateway: SharedGateway,
        fixture: &WorkloadFixture,
        namespace: Option<&str>,
    ) -> HarnessResult<Self> {
        match namespace {
            Some(ns) => gateway.apply_in_namespace(&fixture.manifest, ns).await?,
            None => gateway.apply(&fixture.manifest).await?,
        }

        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE).to_string();
        info!(namespace = %namespace, "Workload started");

        Ok(Self {
            name: fixture.name.clone(),
            namespace,
            status: None,
            gateway,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Last fetched snapshot; `None` until the first successful sync
    pub fn status(&self) -> Option<&WorkloadStatus> {
        self.status.as_ref()
    }

    /// Refresh the snapshot from the cluster.
    ///
    /// On failure the previous snapshot is kept; it says nothing about the
    /// current state.
    #[instrument(skip(self), fields(name = %self.name, namespace = %self.namespace))]
    pub async fn sync(&mut self) -> HarnessResult<&WorkloadStatus> {
        let fetched = self.gateway.get_status(&self.name, &self.namespace).await?;
        Ok(self.status.insert(fetched))
    }

    /// Fetch fresh status and evaluate the running predicate.
    ///
    /// Always goes to the cluster, even right after a `sync`.
    pub async fn is_running(&mut self) -> HarnessResult<bool> {
        Ok(self.sync().await?.is_running())
    }

    /// Delete the pod. Single attempt; a pod already gone is `NotFound`.
    #[instrument(skip(self), fields(name = %self.name, namespace = %self.namespace))]
    pub async fn delete(&self) -> HarnessResult<Vec<u8>> {
        match self.gateway.delete(&self.namespace, &self.name).await {
            Ok(output) => {
                info!("Workload deleted");
                Ok(output)
            }
            Err(e) => {
                warn!(error = %e, "Workload deletion failed");
                Err(e)
            }
        }
    }
}

impl fmt::Debug for ManagedWorkload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedWorkload")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
