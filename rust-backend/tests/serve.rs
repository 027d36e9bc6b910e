use std::sync::Arc;
use std::time::Duration;

use boxtest_backend::{Backend, BackendConfig, HealthResponse};
use tokio_util::sync::CancellationToken;

async fn wait_for_addr(backend: &Backend) -> std::net::SocketAddr {
    for _ in 0..100 {
        if let Some(addr) = backend.local_addr().await {
            return addr;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("backend never bound");
}

#[tokio::test]
async fn health_route_reports_bootstrap_and_stops_on_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("pb_data");
    let backend = Arc::new(Backend::new(BackendConfig::new(&data_dir)));
    backend.bootstrap().await.unwrap();

    let token = CancellationToken::new();
    let server = {
        let backend = backend.clone();
        let token = token.clone();
        tokio::spawn(async move { backend.serve("127.0.0.1:0".parse().unwrap(), token).await })
    };

    let addr = wait_for_addr(&backend).await;
    let health: HealthResponse = reqwest::get(format!("http://{addr}/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(health.status, "ok");
    assert!(health.bootstrapped);
    assert_eq!(health.data_dir, data_dir.display().to_string());
    assert!(health.bootstrapped_at.is_some());

    token.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("serve did not stop")
        .unwrap();
    assert!(result.is_ok());
    assert!(backend.local_addr().await.is_none());
}
