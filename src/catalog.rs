//! Fixture factory: manager configurations, manifests and workload shortcuts
//!
//! Everything except the `start_*`/`register_*` shortcuts is pure; identical
//! inputs always give byte-identical manifests.

use std::io;
use std::str::FromStr;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::k8s::{ClusterGateway, SharedGateway};
use crate::manager::{ManagerOptions, TriState};
use crate::manifest::{ManifestPayload, WorkloadFixture};
use crate::port;
use crate::watcher::{Event, SimpleWatcher};
use crate::workload::{ManagedWorkload, DEFAULT_NAMESPACE};

/// Label the extension framework uses to tell Eirini app pods apart
pub const LABEL_SOURCE_TYPE: &str = "cloudfoundry.org/source_type";

/// Pod name of the fake Eirini app
pub const EIRINI_APP_NAME: &str = "eirini-fake-app";

/// Pod name of the fake staging pod
pub const EIRINI_STAGING_APP_NAME: &str = "6ad9f634-b32e-4890-b1ba-55202d95bc3a-xdcp6";

/// Name of the Service/Endpoints pair fronting the extension manager
pub const EIRINIX_SERVICE_NAME: &str = "eirinix";

const FIXTURE_IMAGE: &str = "busybox:1.28.4";

/// Named manager presets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preset {
    Simple,
    Integration,
    IntegrationFiltered { filter: bool, namespace: String },
    IntegrationNoRegister,
    Service,
}

impl FromStr for Preset {
    type Err = String;

    /// Parameterless presets only; the filtered preset needs its arguments
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Preset::Simple),
            "integration" => Ok(Preset::Integration),
            "integration-no-register" => Ok(Preset::IntegrationNoRegister),
            "service" => Ok(Preset::Service),
            _ => Err(format!("unknown preset: {}", s)),
        }
    }
}

/// Test fixture catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    config: HarnessConfig,
    service_port: u16,
}

impl Catalog {
    /// Build a catalog, reserving the service port with `allocate_port`.
    ///
    /// Without a bindable port no manager-backed fixture can work, so a
    /// failed allocation aborts construction.
    pub fn new<F>(config: HarnessConfig, allocate_port: F) -> HarnessResult<Self>
    where
        F: FnOnce() -> io::Result<u16>,
    {
        let service_port = allocate_port()
            .map_err(|e| HarnessError::construction(format!("cannot allocate free port: {}", e)))?;
        if service_port == 0 {
            return Err(HarnessError::construction("allocator returned port 0"));
        }

        info!(service_port, kind_host = %config.kind_host, "Fixture catalog ready");
        Ok(Self {
            config,
            service_port,
        })
    }

    /// Build a catalog on an OS-assigned free port
    pub fn with_free_port(config: HarnessConfig) -> HarnessResult<Self> {
        Self::new(config, port::free_port)
    }

    /// Build a catalog from the process environment
    pub fn from_env() -> HarnessResult<Self> {
        let config = HarnessConfig::load()
            .map_err(|e| HarnessError::construction(format!("cannot load configuration: {:#}", e)))?;
        Self::with_free_port(config)
    }

    pub fn service_port(&self) -> u16 {
        self.service_port
    }

    pub fn kind_host(&self) -> &str {
        &self.config.kind_host
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    // Manager presets

    pub fn manager(&self, preset: &Preset) -> ManagerOptions {
        match preset {
            Preset::Simple => self.simple_manager(),
            Preset::Integration => self.integration_manager(),
            Preset::IntegrationFiltered { filter, namespace } => {
                self.integration_manager_filtered(*filter, namespace)
            }
            Preset::IntegrationNoRegister => self.integration_manager_no_register(),
            Preset::Service => self.simple_manager_service(),
        }
    }

    /// Dummy manager that is never expected to bind
    pub fn simple_manager(&self) -> ManagerOptions {
        ManagerOptions::new("namespace", "127.0.0.1", 90)
    }

    /// Manager reachable from the kind cluster through the EiriniX service
    pub fn integration_manager(&self) -> ManagerOptions {
        self.integration_base(DEFAULT_NAMESPACE)
    }

    /// Integration manager scoped to `namespace` with an explicit app filter
    pub fn integration_manager_filtered(&self, filter: bool, namespace: &str) -> ManagerOptions {
        self.integration_base(namespace)
            .with_filter_eirini_apps(TriState::from(filter))
    }

    /// Integration manager that leaves existing webhook registrations alone
    pub fn integration_manager_no_register(&self) -> ManagerOptions {
        self.integration_manager()
            .with_register_webhook(TriState::Disabled)
    }

    /// Manager configured to run behind a cluster service
    pub fn simple_manager_service(&self) -> ManagerOptions {
        ManagerOptions::new("eirini", "0.0.0.0", 0)
            .with_service_name("extension")
            .with_webhook_namespace("cf")
    }

    fn integration_base(&self, namespace: &str) -> ManagerOptions {
        ManagerOptions::new(namespace, self.config.kind_host.clone(), self.service_port)
            .with_kube_config(self.config.kubeconfig.clone())
            .with_service_name(EIRINIX_SERVICE_NAME)
            .with_webhook_namespace(namespace)
    }

    // Manifests

    /// Service + Endpoints routing cluster traffic to the manager on the host
    pub fn service_yaml(&self) -> ManifestPayload {
        let name = EIRINIX_SERVICE_NAME;
        let port = self.service_port;
        let host = &self.config.kind_host;
        format!(
            r#"
apiVersion: v1
kind: Service
metadata:
  name: {name}
spec:
  ports:
  - protocol: TCP
    port: 443
    targetPort: {port}
---
apiVersion: v1
kind: Endpoints
metadata:
  name: {name}
subsets:
  - addresses:
      - ip: {host}
    ports:
      - port: {port}
"#
        )
        .into()
    }

    /// Pod labelled as an Eirini app
    pub fn eirini_app_yaml(&self) -> ManifestPayload {
        format!(
            r#"
apiVersion: v1
kind: Pod
metadata:
  name: {name}
  labels:
    {label}: APP
spec:
  containers:
  - image: {image}
    command:
      - sleep
      - "3600"
    name: {name}
    env:
    - name: FAKE_APP
      value: "fake content"
  restartPolicy: Always
"#,
            name = EIRINI_APP_NAME,
            label = LABEL_SOURCE_TYPE,
            image = FIXTURE_IMAGE,
        )
        .into()
    }

    /// Unlabelled pod shaped like an Eirini staging task
    pub fn eirini_staging_app_yaml(&self) -> ManifestPayload {
        format!(
            r#"
apiVersion: v1
kind: Pod
metadata:
  name: {name}
spec:
  containers:
  - image: {image}
    command:
      - sleep
      - "3600"
    name: {name}
  restartPolicy: Always
"#,
            name = EIRINI_STAGING_APP_NAME,
            image = FIXTURE_IMAGE,
        )
        .into()
    }

    pub fn eirini_app(&self) -> WorkloadFixture {
        WorkloadFixture::new(EIRINI_APP_NAME, self.eirini_app_yaml())
    }

    pub fn eirini_staging_app(&self) -> WorkloadFixture {
        WorkloadFixture::new(EIRINI_STAGING_APP_NAME, self.eirini_staging_app_yaml())
    }

    // Watchers

    pub fn simple_watcher(&self) -> SimpleWatcher {
        SimpleWatcher::accumulator()
    }

    pub fn simple_watcher_with_channel(&self, tx: mpsc::Sender<Event>) -> SimpleWatcher {
        SimpleWatcher::relay(tx)
    }

    pub fn simple_watcher_with_unbounded_channel(
        &self,
        tx: mpsc::UnboundedSender<Event>,
    ) -> SimpleWatcher {
        SimpleWatcher::relay(tx)
    }

    // Cluster shortcuts

    /// Apply the EiriniX service/endpoint pair
    pub async fn register_eirinix_service<G>(&self, gateway: &G) -> HarnessResult<()>
    where
        G: ClusterGateway + ?Sized,
    {
        gateway.apply(&self.service_yaml()).await
    }

    pub async fn start_eirini_app(&self, gateway: SharedGateway) -> HarnessResult<ManagedWorkload> {
        ManagedWorkload::start(gateway, &self.eirini_app(), None).await
    }

    pub async fn start_eirini_staging_app(&self, gateway: SharedGateway) -> HarnessResult<ManagedWorkload> {
        ManagedWorkload::start(gateway, &self.eirini_staging_app(), None).await
    }

    pub async fn start_eirini_app_in_namespace(
        &self,
        gateway: SharedGateway,
        namespace: &str,
    ) -> HarnessResult<ManagedWorkload> {
        ManagedWorkload::start(gateway, &self.eirini_app(), Some(namespace)).await
    }

    pub async fn start_eirini_staging_app_in_namespace(
        &self,
        gateway: SharedGateway,
        namespace: &str,
    ) -> HarnessResult<ManagedWorkload> {
        ManagedWorkload::start(gateway, &self.eirini_staging_app(), Some(namespace)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::fixed_port;

    fn catalog() -> Catalog {
        Catalog::new(HarnessConfig::default(), fixed_port(34567)).unwrap()
    }

    #[test]
    fn test_failed_allocation_aborts_construction() {
        let err = Catalog::new(HarnessConfig::default(), || {
            Err(io::Error::new(io::ErrorKind::AddrInUse, "no ports left"))
        })
        .unwrap_err();
        assert!(matches!(err, HarnessError::Construction(_)));
    }

    #[test]
    fn test_zero_port_rejected() {
        assert!(Catalog::new(HarnessConfig::default(), fixed_port(0)).is_err());
    }

    #[test]
    fn test_simple_manager() {
        let opts = catalog().simple_manager();
        assert_eq!(opts.namespace, "namespace");
        assert_eq!(opts.host, "127.0.0.1");
        assert_eq!(opts.port, 90);
        assert!(opts.kube_config.is_none());
        assert!(opts.service_name.is_none());
    }

    #[test]
    fn test_filtered_and_no_register_presets() {
        let c = catalog();
        let filtered = c.integration_manager_filtered(false, "eirini-apps");
        assert_eq!(filtered.namespace, "eirini-apps");
        assert_eq!(filtered.webhook_namespace.as_deref(), Some("eirini-apps"));
        assert_eq!(filtered.filter_eirini_apps, TriState::Disabled);
        assert_eq!(filtered.register_webhook, TriState::Unset);

        let no_register = c.integration_manager_no_register();
        assert_eq!(no_register.register_webhook, TriState::Disabled);
        assert_eq!(no_register.filter_eirini_apps, TriState::Unset);
        assert_eq!(no_register.port, 34567);
    }

    #[test]
    fn test_service_preset() {
        let opts = catalog().simple_manager_service();
        assert_eq!(opts.namespace, "eirini");
        assert_eq!(opts.host, "0.0.0.0");
        assert_eq!(opts.port, 0);
        assert_eq!(opts.service_name.as_deref(), Some("extension"));
        assert_eq!(opts.webhook_namespace.as_deref(), Some("cf"));
    }

    #[test]
    fn test_integration_preset_ignores_config_beyond_host_and_port() {
        let config = HarnessConfig::default()
            .with_kind_host("10.0.0.7")
            .with_kubeconfig("/tmp/kind.yaml");
        let c = Catalog::new(config, fixed_port(40000)).unwrap();

        let opts = c.integration_manager();
        assert_eq!(opts.namespace, DEFAULT_NAMESPACE);
        assert_eq!(opts.webhook_namespace.as_deref(), Some(DEFAULT_NAMESPACE));
        assert_eq!(opts.service_name.as_deref(), Some(EIRINIX_SERVICE_NAME));
        assert_eq!(opts.host, "10.0.0.7");
        assert_eq!(opts.port, 40000);

        let docs = c.service_yaml().documents().unwrap();
        assert_eq!(docs.len(), 2);
        for doc in &docs {
            assert_eq!(doc["metadata"]["name"].as_str(), Some(EIRINIX_SERVICE_NAME));
        }
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!("simple".parse::<Preset>().unwrap(), Preset::Simple);
        assert_eq!(
            "integration-no-register".parse::<Preset>().unwrap(),
            Preset::IntegrationNoRegister
        );
        assert!("filtered".parse::<Preset>().is_err());
    }

    #[test]
    fn test_app_manifests_parse() {
        let c = catalog();
        let docs = c.eirini_app_yaml().documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["metadata"]["name"].as_str(), Some(EIRINI_APP_NAME));
        assert_eq!(
            docs[0]["metadata"]["labels"][LABEL_SOURCE_TYPE].as_str(),
            Some("APP")
        );

        let staging = c.eirini_staging_app_yaml().documents().unwrap();
        assert!(staging[0]["metadata"]["labels"].is_null());
        assert_eq!(c.eirini_staging_app().name, EIRINI_STAGING_APP_NAME);
    }
}
