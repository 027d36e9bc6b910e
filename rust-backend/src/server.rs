use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::types::{BootstrapState, HealthResponse};

/// The embedded backend: a data directory plus a small local HTTP server.
pub struct Backend {
    config: BackendConfig,
    state: Arc<RwLock<Option<BootstrapState>>>,
    local_addr: RwLock<Option<SocketAddr>>,
}

#[derive(Clone)]
struct RouterState {
    config: BackendConfig,
    bootstrap: Arc<RwLock<Option<BootstrapState>>>,
}

impl Backend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(None)),
            local_addr: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Prepares the data directory and storage lock. Calling it again on a
    /// bootstrapped backend is a no-op.
    pub async fn bootstrap(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.is_some() {
            return Ok(());
        }

        let storage_dir = self.config.storage_dir();
        tokio::fs::create_dir_all(&storage_dir)
            .await
            .map_err(|e| BackendError::io(&storage_dir, e))?;

        let bootstrapped_at = Utc::now();
        let lock_path = self.config.lock_path();
        tokio::fs::write(&lock_path, bootstrapped_at.to_rfc3339())
            .await
            .map_err(|e| BackendError::io(&lock_path, e))?;

        tracing::info!(data_dir = %self.config.data_dir.display(), "backend bootstrapped");

        *state = Some(BootstrapState {
            data_dir: self.config.data_dir.clone(),
            storage_dir,
            bootstrapped_at,
        });
        Ok(())
    }

    pub async fn is_bootstrapped(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Address the server is listening on, once `serve` has bound.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().await
    }

    /// Binds `addr` and serves until `shutdown` is cancelled.
    ///
    /// Returns `Ok(())` after a graceful stop and
    /// [`BackendError::ServerClosed`] when the shutdown was already requested
    /// before the listener was bound.
    pub async fn serve(&self, addr: SocketAddr, shutdown: CancellationToken) -> Result<()> {
        if shutdown.is_cancelled() {
            return Err(BackendError::ServerClosed);
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BackendError::Bind { addr, source })?;
        let bound = listener.local_addr().map_err(BackendError::Serve)?;
        *self.local_addr.write().await = Some(bound);

        tracing::info!(addr = %bound, "backend listening");

        let router = Router::new()
            .route("/api/health", get(health))
            .with_state(RouterState {
                config: self.config.clone(),
                bootstrap: self.state.clone(),
            });

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(BackendError::Serve)?;

        *self.local_addr.write().await = None;
        tracing::info!(addr = %bound, "backend stopped");
        Ok(())
    }

    /// Drops everything `bootstrap` set up so the data directory can be
    /// reopened by a fresh instance.
    pub async fn reset_bootstrap_state(&self) -> Result<()> {
        let previous = self.state.write().await.take();
        if previous.is_none() {
            return Err(BackendError::NotBootstrapped);
        }

        let lock_path = self.config.lock_path();
        match tokio::fs::remove_file(&lock_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BackendError::io(&lock_path, e)),
        }

        tracing::info!("backend bootstrap state reset");
        Ok(())
    }
}

async fn health(State(state): State<RouterState>) -> Json<HealthResponse> {
    let bootstrap = state.bootstrap.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        bootstrapped: bootstrap.is_some(),
        data_dir: state.config.data_dir.display().to_string(),
        bootstrapped_at: bootstrap.as_ref().map(|b| b.bootstrapped_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_creates_storage_and_lock() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::new(BackendConfig::new(dir.path().join("pb_data")));

        backend.bootstrap().await.unwrap();

        assert!(backend.is_bootstrapped().await);
        assert!(backend.config().storage_dir().is_dir());
        assert!(backend.config().lock_path().is_file());
    }

    #[tokio::test]
    async fn reset_removes_lock_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::new(BackendConfig::new(dir.path().join("pb_data")));
        backend.bootstrap().await.unwrap();

        backend.reset_bootstrap_state().await.unwrap();

        assert!(!backend.is_bootstrapped().await);
        assert!(!backend.config().lock_path().exists());
        assert!(backend.config().storage_dir().is_dir());
    }

    #[tokio::test]
    async fn reset_without_bootstrap_fails() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::new(BackendConfig::new(dir.path()));

        let err = backend.reset_bootstrap_state().await.unwrap_err();
        assert!(matches!(err, BackendError::NotBootstrapped));
    }

    #[tokio::test]
    async fn serve_after_cancel_reports_server_closed() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::new(BackendConfig::new(dir.path()));
        let token = CancellationToken::new();
        token.cancel();

        let err = backend
            .serve("127.0.0.1:0".parse().unwrap(), token)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::ServerClosed));
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();
        let backend = Backend::new(BackendConfig::new(dir.path()));

        let err = backend
            .serve(addr, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Bind { .. }));
    }
}
