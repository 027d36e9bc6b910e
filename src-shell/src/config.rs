use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};

/// Environment variable selecting the runtime mode.
pub const APP_ENV_VAR: &str = "APP_ENV";

/// Per-app directory under the platform data dir.
pub const APP_DIR_NAME: &str = "BoxTest";

pub const LOGS_DIR: &str = "logs";
pub const SERVICE_DATA_DIR: &str = "pb_data";

/// Fixed loopback port of the embedded service.
pub const DEFAULT_HTTP_PORT: u16 = 8090;

/// Budget for the service cleanup once shutdown was requested.
pub const CLEANUP_BUDGET: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
  Development,
  Production,
}

impl RuntimeMode {
  /// Reads `APP_ENV`. Only the exact value `development` selects
  /// development; anything else, including unset, is production.
  pub fn from_env() -> Self {
    Self::from_value(std::env::var(APP_ENV_VAR).ok().as_deref())
  }

  pub fn from_value(value: Option<&str>) -> Self {
    match value {
      Some("development") => RuntimeMode::Development,
      _ => RuntimeMode::Production,
    }
  }

  pub fn is_development(self) -> bool {
    self == RuntimeMode::Development
  }

  pub fn as_str(self) -> &'static str {
    match self {
      RuntimeMode::Development => "development",
      RuntimeMode::Production => "production",
    }
  }
}

impl fmt::Display for RuntimeMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Root of the per-user application data, e.g. `~/.local/share/BoxTest`.
pub fn app_data_root() -> PathBuf {
  // No data dir (e.g. no HOME): keep going under temp rather than fail.
  dirs::data_local_dir()
    .unwrap_or_else(std::env::temp_dir)
    .join(APP_DIR_NAME)
}

pub fn default_log_dir(mode: RuntimeMode) -> PathBuf {
  match mode {
    RuntimeMode::Development => PathBuf::from(".").join(LOGS_DIR),
    RuntimeMode::Production => app_data_root().join(LOGS_DIR),
  }
}

pub fn default_service_data_dir(mode: RuntimeMode) -> PathBuf {
  match mode {
    RuntimeMode::Development => PathBuf::from(".").join(SERVICE_DATA_DIR),
    RuntimeMode::Production => app_data_root().join(SERVICE_DATA_DIR),
  }
}

pub fn default_http_addr() -> SocketAddr {
  SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_HTTP_PORT)
}

/// Everything the shell derives from the environment at process start.
#[derive(Debug, Clone)]
pub struct AppConfig {
  pub mode: RuntimeMode,
  pub log_dir: PathBuf,
  pub service_data_dir: PathBuf,
  pub http_addr: SocketAddr,
  pub cleanup_budget: Duration,
  /// How long the host waits for the supervisor's tasks on exit.
  pub join_budget: Duration,
}

impl AppConfig {
  pub fn for_mode(mode: RuntimeMode) -> Self {
    Self {
      mode,
      log_dir: default_log_dir(mode),
      service_data_dir: default_service_data_dir(mode),
      http_addr: default_http_addr(),
      cleanup_budget: CLEANUP_BUDGET,
      join_budget: CLEANUP_BUDGET,
    }
  }

  pub fn from_env() -> Self {
    Self::for_mode(RuntimeMode::from_env())
  }
}

pub fn validate_config(config: &AppConfig) -> Result<()> {
  if !config.http_addr.ip().is_loopback() {
    return Err(anyhow!(
      "Embedded service must bind a loopback address, got {}",
      config.http_addr
    ));
  }

  if config.cleanup_budget.is_zero() {
    return Err(anyhow!("Cleanup budget must not be zero"));
  }

  if config.join_budget.is_zero() {
    return Err(anyhow!("Join budget must not be zero"));
  }

  Ok(())
}
