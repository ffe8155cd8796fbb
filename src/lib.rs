//! EiriniX test harness
//!
//! Builds disposable fixtures for integration tests of EiriniX extensions,
//! tracks their lifecycle in a Kubernetes cluster and relays watch events to
//! sinks that tests can assert on.

pub mod catalog;
pub mod config;
pub mod error;
pub mod k8s;
pub mod manager;
pub mod manifest;
pub mod port;
pub mod telemetry;
pub mod watcher;
pub mod workload;

pub use catalog::{Catalog, Preset};
pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
pub use k8s::{ClusterGateway, InMemoryGateway, KubeGateway, KubectlGateway, SharedGateway};
pub use manager::{ManagerOptions, TriState};
pub use manifest::{ManifestPayload, WorkloadFixture};
pub use watcher::{dispatch, Event, EventLog, SimpleWatcher};
pub use workload::ManagedWorkload;
