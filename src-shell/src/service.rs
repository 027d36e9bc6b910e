use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use boxtest_backend::{Backend, BackendConfig, BackendError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ServiceError {
  /// The serve loop stopped because shutdown was requested.
  #[error("server closed")]
  ServerClosed,

  #[error(transparent)]
  Backend(#[from] BackendError),

  #[error("cleanup did not finish within {0:?}")]
  CleanupTimeout(Duration),

  #[error("{0}")]
  Other(String),
}

impl ServiceError {
  /// True for the expected close after a requested shutdown, which is
  /// never a failure.
  pub fn is_server_closed(&self) -> bool {
    matches!(
      self,
      ServiceError::ServerClosed | ServiceError::Backend(BackendError::ServerClosed)
    )
  }
}

/// What the supervisor needs from the service it embeds.
#[async_trait]
pub trait EmbeddedService: Send + Sync + 'static {
  async fn bootstrap(&self) -> Result<(), ServiceError>;

  /// Serves on `addr` until `shutdown` is cancelled.
  async fn serve(&self, addr: SocketAddr, shutdown: CancellationToken) -> Result<(), ServiceError>;

  async fn reset_bootstrap_state(&self) -> Result<(), ServiceError>;
}

/// Builds a fresh service instance rooted at the given data directory.
pub type ServiceFactory = Box<dyn Fn(&Path) -> Arc<dyn EmbeddedService> + Send + Sync>;

pub fn backend_factory() -> ServiceFactory {
  Box::new(|data_dir: &Path| -> Arc<dyn EmbeddedService> {
    Arc::new(Backend::new(BackendConfig::new(data_dir)))
  })
}

#[async_trait]
impl EmbeddedService for Backend {
  async fn bootstrap(&self) -> Result<(), ServiceError> {
    Ok(Backend::bootstrap(self).await?)
  }

  async fn serve(&self, addr: SocketAddr, shutdown: CancellationToken) -> Result<(), ServiceError> {
    Ok(Backend::serve(self, addr, shutdown).await?)
  }

  async fn reset_bootstrap_state(&self) -> Result<(), ServiceError> {
    Ok(Backend::reset_bootstrap_state(self).await?)
  }
}
