//! Kubernetes access for the test harness
//!
//! This module handles every interaction with the cluster:
//! - Applying fixture manifests
//! - Fetching pod status for lifecycle polling
//! - Deleting fixture pods on teardown
//! - Opening pod watch streams for event relays

mod client;
mod gateway;
mod kubectl;
mod memory;
mod status;

pub use client::{KubeGateway, FIELD_MANAGER};
#[cfg(test)]
pub use gateway::MockClusterGateway;
pub use gateway::{ClusterGateway, SharedGateway};
pub use kubectl::{KubectlGateway, KubectlOutput};
pub use memory::{AppliedManifest, InMemoryGateway};
pub use status::{ContainerState, WorkloadPhase, WorkloadStatus};
