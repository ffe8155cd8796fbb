//! In-process cluster gateway for tests that don't need a real cluster

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, info};

use super::gateway::{target, ClusterGateway};
use super::status::{ContainerState, WorkloadPhase, WorkloadStatus};
use crate::error::{HarnessError, HarnessResult};
use crate::manifest::ManifestPayload;

/// A manifest the fake cluster accepted, with the namespace it was applied to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedManifest {
    pub namespace: Option<String>,
    pub manifest: ManifestPayload,
}

#[derive(Default)]
struct State {
    pods: BTreeMap<(String, String), WorkloadStatus>,
    applied: Vec<AppliedManifest>,
    failures: VecDeque<String>,
}

/// Fake cluster that stores pod statuses in memory.
///
/// Applied `Pod` documents become pods in the configured initial phase; other
/// kinds are recorded but otherwise ignored.
pub struct InMemoryGateway {
    state: Mutex<State>,
    default_namespace: String,
    initial_phase: WorkloadPhase,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            default_namespace: "default".to_string(),
            initial_phase: WorkloadPhase::Running,
        }
    }

    /// Phase new pods start in (Running by default)
    pub fn with_initial_phase(mut self, phase: WorkloadPhase) -> Self {
        self.initial_phase = phase;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move a pod to `phase`; returns false if it doesn't exist
    pub fn set_phase(&self, name: &str, namespace: &str, phase: WorkloadPhase) -> bool {
        let mut state = self.state();
        match state.pods.get_mut(&(namespace.to_string(), name.to_string())) {
            Some(status) => {
                status.phase = phase;
                let running = phase == WorkloadPhase::Running;
                for container in &mut status.containers {
                    container.ready = running;
                    container.running = running;
                }
                true
            }
            None => false,
        }
    }

    /// Remove a pod behind the harness's back
    pub fn evict(&self, name: &str, namespace: &str) -> bool {
        self.state()
            .pods
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some()
    }

    /// Make the next gateway call fail with a transport error
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.state().failures.push_back(reason.into());
    }

    pub fn contains(&self, name: &str, namespace: &str) -> bool {
        self.state()
            .pods
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    pub fn applied(&self) -> Vec<AppliedManifest> {
        self.state().applied.clone()
    }

    fn take_failure(&self, operation: &'static str, target: String) -> HarnessResult<()> {
        match self.state().failures.pop_front() {
            Some(reason) => Err(HarnessError::gateway(operation, target, reason)),
            None => Ok(()),
        }
    }

    fn apply_with(&self, manifest: &ManifestPayload, namespace: Option<&str>) -> HarnessResult<()> {
        let scope = namespace.unwrap_or(&self.default_namespace).to_string();
        self.take_failure("apply", scope.clone())?;

        let docs = manifest
            .documents()
            .map_err(|e| HarnessError::gateway("apply", scope.clone(), e))?;

        let mut state = self.state();
        for doc in docs {
            if doc["kind"].as_str() != Some("Pod") {
                continue;
            }
            let name = doc["metadata"]["name"]
                .as_str()
                .ok_or_else(|| HarnessError::gateway("apply", scope.clone(), "pod has no metadata.name"))?
                .to_string();
            let ns = namespace
                .map(str::to_string)
                .or_else(|| doc["metadata"]["namespace"].as_str().map(str::to_string))
                .unwrap_or_else(|| self.default_namespace.clone());

            let running = self.initial_phase == WorkloadPhase::Running;
            let containers = doc["spec"]["containers"]
                .as_sequence()
                .map(|seq| {
                    seq.iter()
                        .filter_map(|c| c["name"].as_str())
                        .map(|cname| ContainerState {
                            name: cname.to_string(),
                            ready: running,
                            running,
                        })
                        .collect()
                })
                .unwrap_or_default();

            let status = WorkloadStatus {
                name: name.clone(),
                namespace: ns.clone(),
                phase: self.initial_phase,
                containers,
                pod_ip: None,
                message: None,
            };
            debug!(name = %name, namespace = %ns, "Fake pod created");
            state.pods.insert((ns, name), status);
        }

        state.applied.push(AppliedManifest {
            namespace: namespace.map(str::to_string),
            manifest: manifest.clone(),
        });
        Ok(())
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterGateway for InMemoryGateway {
    async fn apply(&self, manifest: &ManifestPayload) -> HarnessResult<()> {
        self.apply_with(manifest, None)
    }

    async fn apply_in_namespace(
        &self,
        manifest: &ManifestPayload,
        namespace: &str,
    ) -> HarnessResult<()> {
        self.apply_with(manifest, Some(namespace))
    }

    async fn get_status(&self, name: &str, namespace: &str) -> HarnessResult<WorkloadStatus> {
        self.take_failure("get status", target(namespace, name))?;
        self.state()
            .pods
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| HarnessError::not_found(name, namespace))
    }

    async fn delete(&self, namespace: &str, name: &str) -> HarnessResult<Vec<u8>> {
        self.take_failure("delete", target(namespace, name))?;
        match self.state().pods.remove(&(namespace.to_string(), name.to_string())) {
            Some(_) => {
                info!(name, namespace, "Fake pod deleted");
                Ok(format!("pod \"{}\" deleted\n", name).into_bytes())
            }
            None => Err(HarnessError::not_found(name, namespace)),
        }
    }
}
