//! Live-cluster tests
//!
//! Require a reachable cluster (e.g. kind) and `EIRINIX_CLUSTER_TEST=1`.
//!
//! Run: EIRINIX_CLUSTER_TEST=1 cargo test --test cluster_test -- --ignored --nocapture

use std::sync::Arc;
use std::time::Duration;

use eirinix_testing::catalog::{EIRINI_APP_NAME, LABEL_SOURCE_TYPE};
use eirinix_testing::telemetry::init_test_tracing;
use eirinix_testing::{
    dispatch, Catalog, HarnessResult, KubeGateway, KubectlGateway, ManagedWorkload,
    SharedGateway,
};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

fn should_run_cluster_tests() -> bool {
    std::env::var("EIRINIX_CLUSTER_TEST").unwrap_or_default() == "1"
}

/// Poll until the workload reports running or `deadline` passes
async fn wait_until_running(app: &mut ManagedWorkload, deadline: Duration) -> HarnessResult<bool> {
    let poll = async {
        loop {
            match app.is_running().await {
                Ok(true) => return Ok(true),
                Ok(false) => sleep(Duration::from_secs(1)).await,
                Err(e) => return Err(e),
            }
        }
    };
    match timeout(deadline, poll).await {
        Ok(result) => result,
        Err(_) => Ok(false),
    }
}

async fn lifecycle_round_trip(catalog: &Catalog, gateway: SharedGateway) {
    let mut app = catalog.start_eirini_app(gateway).await.unwrap();
    assert!(wait_until_running(&mut app, Duration::from_secs(120)).await.unwrap());

    app.delete().await.unwrap();

    // delete returns only once the pod is gone
    let err = app.sync().await.unwrap_err();
    assert!(err.is_not_found(), "expected NotFound right after delete, got {}", err);
}

#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn test_kube_gateway_lifecycle() {
    if !should_run_cluster_tests() {
        return;
    }
    init_test_tracing();

    let catalog = Catalog::from_env().unwrap();
    let gateway = KubeGateway::from_config(catalog.config()).await.unwrap();
    assert!(gateway.health_check().await.unwrap());

    lifecycle_round_trip(&catalog, Arc::new(gateway)).await;
}

#[tokio::test]
#[ignore = "requires kubectl and a Kubernetes cluster"]
async fn test_kubectl_gateway_lifecycle() {
    if !should_run_cluster_tests() {
        return;
    }
    init_test_tracing();

    let catalog = Catalog::from_env().unwrap();
    let gateway = KubectlGateway::from_config(catalog.config());

    lifecycle_round_trip(&catalog, Arc::new(gateway)).await;
}

#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn test_pod_watch_relays_fixture_events() {
    if !should_run_cluster_tests() {
        return;
    }
    init_test_tracing();

    let catalog = Catalog::from_env().unwrap();
    let gateway = KubeGateway::from_config(catalog.config()).await.unwrap();
    let manager = catalog.integration_manager();

    let selector = format!("{}=APP", LABEL_SOURCE_TYPE);
    let stream = gateway
        .watch_pods(&manager.namespace, Some(&selector))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    let watcher = catalog.simple_watcher_with_channel(tx);
    let relay_manager = manager.clone();
    let relay = tokio::spawn(async move { dispatch(&watcher, &relay_manager, stream).await });

    let gateway: SharedGateway = Arc::new(gateway);
    let app = catalog.start_eirini_app(gateway.clone()).await.unwrap();

    let event = timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("no watch event for the fixture")
        .unwrap();
    assert_eq!(eirinix_testing::watcher::describe(&event).1, EIRINI_APP_NAME);

    app.delete().await.unwrap();
    relay.abort();
}
