//! Tests for the fixture catalog
//!
//! Presets and manifests must be fully determined by the catalog's port and
//! kind host.

use eirinix_testing::catalog::{EIRINI_APP_NAME, LABEL_SOURCE_TYPE};
use eirinix_testing::port::fixed_port;
use eirinix_testing::{Catalog, HarnessConfig, Preset, TriState};

fn catalog(port: u16) -> Catalog {
    let config = HarnessConfig::default().with_kind_host("172.17.0.1");
    Catalog::new(config, fixed_port(port)).unwrap()
}

fn all_presets() -> Vec<Preset> {
    vec![
        Preset::Simple,
        Preset::Integration,
        Preset::IntegrationFiltered {
            filter: true,
            namespace: "eirini".to_string(),
        },
        Preset::IntegrationNoRegister,
        Preset::Service,
    ]
}

#[test]
fn test_presets_are_deterministic() {
    let a = catalog(34567);
    let b = catalog(34567);

    for preset in all_presets() {
        assert_eq!(a.manager(&preset), b.manager(&preset), "preset {:?}", preset);
        assert_eq!(a.manager(&preset), a.manager(&preset), "preset {:?}", preset);
    }
}

#[test]
fn test_manifests_are_byte_identical() {
    let a = catalog(34567);
    let b = catalog(34567);

    assert_eq!(a.service_yaml().as_bytes(), b.service_yaml().as_bytes());
    assert_eq!(a.eirini_app_yaml().as_bytes(), b.eirini_app_yaml().as_bytes());
    assert_eq!(
        a.eirini_staging_app_yaml().as_bytes(),
        b.eirini_staging_app_yaml().as_bytes()
    );
}

#[test]
fn test_service_yaml_depends_on_port() {
    assert_ne!(catalog(34567).service_yaml(), catalog(34568).service_yaml());
}

#[test]
fn test_integration_preset_scenario() {
    let opts = catalog(34567).manager(&Preset::Integration);

    assert_eq!(opts.namespace, "default");
    assert_eq!(opts.host, "172.17.0.1");
    assert_eq!(opts.port, 34567);
    assert_eq!(opts.service_name.as_deref(), Some("eirinix"));
    assert_eq!(opts.webhook_namespace.as_deref(), Some("default"));
    assert_eq!(opts.filter_eirini_apps, TriState::Unset);
    assert_eq!(opts.register_webhook, TriState::Unset);
    assert!(opts.registers_webhook());
}

#[test]
fn test_kubeconfig_flows_into_integration_presets() {
    let config = HarnessConfig::default().with_kubeconfig("/home/ci/.kube/kind");
    let catalog = Catalog::new(config, fixed_port(40000)).unwrap();

    let integration = catalog.integration_manager();
    assert_eq!(
        integration.kube_config.as_deref(),
        Some(std::path::Path::new("/home/ci/.kube/kind"))
    );
    assert!(catalog.simple_manager().kube_config.is_none());
}

#[test]
fn test_service_yaml_scenario() {
    let yaml = catalog(34567).service_yaml();
    let text = yaml.as_str();

    assert!(text.contains("targetPort: 34567"));
    assert!(text.contains("ip: 172.17.0.1"));
    assert!(text.contains("- port: 34567"));

    let docs = yaml.documents().unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["kind"].as_str(), Some("Service"));
    assert_eq!(docs[0]["spec"]["ports"][0]["port"].as_u64(), Some(443));
    assert_eq!(docs[1]["kind"].as_str(), Some("Endpoints"));
    assert_eq!(docs[1]["metadata"]["name"].as_str(), Some("eirinix"));
}

#[test]
fn test_eirini_app_fixture() {
    let fixture = catalog(34567).eirini_app();
    assert_eq!(fixture.name, EIRINI_APP_NAME);

    let text = fixture.manifest.as_str();
    assert!(text.contains(&format!("{}: APP", LABEL_SOURCE_TYPE)));
    assert!(text.contains("image: busybox:1.28.4"));
    assert!(text.contains("value: \"fake content\""));
}

#[test]
fn test_free_port_catalog() {
    let catalog = Catalog::with_free_port(HarnessConfig::default()).unwrap();
    assert_ne!(catalog.service_port(), 0);
    assert_eq!(catalog.integration_manager().port, catalog.service_port());
}
