//! Observed workload status and the running predicate

use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};

/// Pod lifecycle phase as reported by the cluster
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for WorkloadPhase {
    fn from(phase: &str) -> Self {
        match phase {
            "Pending" => WorkloadPhase::Pending,
            "Running" => WorkloadPhase::Running,
            "Succeeded" => WorkloadPhase::Succeeded,
            "Failed" => WorkloadPhase::Failed,
            _ => WorkloadPhase::Unknown,
        }
    }
}

impl std::fmt::Display for WorkloadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkloadPhase::Pending => write!(f, "Pending"),
            WorkloadPhase::Running => write!(f, "Running"),
            WorkloadPhase::Succeeded => write!(f, "Succeeded"),
            WorkloadPhase::Failed => write!(f, "Failed"),
            WorkloadPhase::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerState {
    pub name: String,
    pub ready: bool,
    pub running: bool,
}

/// Snapshot of a pod taken by one status fetch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkloadStatus {
    pub name: String,
    pub namespace: String,
    pub phase: WorkloadPhase,
    pub containers: Vec<ContainerState>,
    pub pod_ip: Option<String>,
    pub message: Option<String>,
}

impl WorkloadStatus {
    /// Status of a pod that has been accepted but not scheduled yet
    pub fn pending(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            phase: WorkloadPhase::Pending,
            containers: Vec::new(),
            pod_ip: None,
            message: None,
        }
    }

    /// Build a snapshot from a fetched pod
    pub fn from_pod(pod: &Pod) -> Self {
        let name = pod.metadata.name.clone().unwrap_or_default();
        let namespace = pod
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());

        let status = pod.status.as_ref();
        let phase = status
            .and_then(|s| s.phase.as_deref())
            .map(WorkloadPhase::from)
            .unwrap_or(WorkloadPhase::Unknown);

        let containers = status
            .and_then(|s| s.container_statuses.as_ref())
            .map(|statuses| {
                statuses
                    .iter()
                    .map(|cs| ContainerState {
                        name: cs.name.clone(),
                        ready: cs.ready,
                        running: cs
                            .state
                            .as_ref()
                            .map(|state| state.running.is_some())
                            .unwrap_or(false),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name,
            namespace,
            phase,
            containers,
            pod_ip: status.and_then(|s| s.pod_ip.clone()),
            message: status.and_then(|s| s.message.clone()),
        }
    }

    /// Running predicate: phase is Running and every container is up and ready
    pub fn is_running(&self) -> bool {
        self.phase == WorkloadPhase::Running
            && self.containers.iter().all(|c| c.ready && c.running)
    }
}

impl From<&Pod> for WorkloadStatus {
    fn from(pod: &Pod) -> Self {
        WorkloadStatus::from_pod(pod)
    }
}
