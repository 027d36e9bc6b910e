//! Headless stand-in for the desktop window host.
//!
//! It drives [`App`] the way a GUI shell does: `startup` once the host is
//! up, `shutdown` when the window is asked to close. Closing is any future
//! the caller supplies (Ctrl-C in the binary). A [`Fatal`] from the
//! supervisor ends the host without running `shutdown`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::app::{App, HostContext};
use crate::config::{RuntimeMode, CLEANUP_BUDGET};
use crate::logger::{Fatal, LogLevel, ShellLogger};
use crate::supervisor::FatalReceiver;

#[derive(Debug, Clone)]
pub struct HostOptions {
  pub title: String,
  pub width: u32,
  pub height: u32,
  pub mode: RuntimeMode,
  pub log_level: LogLevel,
  pub log_level_production: LogLevel,
  pub join_budget: Duration,
}

impl HostOptions {
  pub fn for_mode(mode: RuntimeMode) -> Self {
    Self {
      title: "Box Test".to_string(),
      width: 1024,
      height: 768,
      mode,
      log_level: LogLevel::Debug,
      log_level_production: LogLevel::Error,
      join_budget: CLEANUP_BUDGET,
    }
  }

  /// Threshold for the host's own messages in the current mode.
  pub fn effective_log_level(&self) -> LogLevel {
    if self.mode.is_development() {
      self.log_level
    } else {
      self.log_level_production
    }
  }
}

/// Drops records below `min`. `print` and `fatal` always pass.
pub struct FilteredLogger {
  inner: Arc<dyn ShellLogger>,
  min: LogLevel,
}

impl FilteredLogger {
  pub fn new(inner: Arc<dyn ShellLogger>, min: LogLevel) -> Self {
    Self { inner, min }
  }

  fn enabled(&self, level: LogLevel) -> bool {
    level >= self.min
  }
}

impl ShellLogger for FilteredLogger {
  fn print(&self, message: &str) {
    self.inner.print(message);
  }

  fn trace(&self, message: &str) {
    if self.enabled(LogLevel::Trace) {
      self.inner.trace(message);
    }
  }

  fn debug(&self, message: &str) {
    if self.enabled(LogLevel::Debug) {
      self.inner.debug(message);
    }
  }

  fn info(&self, message: &str) {
    if self.enabled(LogLevel::Info) {
      self.inner.info(message);
    }
  }

  fn warning(&self, message: &str) {
    if self.enabled(LogLevel::Warning) {
      self.inner.warning(message);
    }
  }

  fn error(&self, message: &str) {
    if self.enabled(LogLevel::Error) {
      self.inner.error(message);
    }
  }

  fn fatal(&self, message: &str) -> Fatal {
    self.inner.fatal(message)
  }
}

#[derive(Debug)]
pub enum HostExit {
  /// The host was closed and the supervisor joined.
  Closed,
  /// The embedded service failed; the process must end.
  Fatal(Fatal),
}

pub async fn run_host<F>(
  app: Arc<App>,
  options: HostOptions,
  logger: Arc<dyn ShellLogger>,
  mut fatal_rx: FatalReceiver,
  close_requested: F,
) -> HostExit
where
  F: Future<Output = ()>,
{
  let log = FilteredLogger::new(logger, options.effective_log_level());
  log.info(&format!(
    "Opening {} ({}x{})",
    options.title, options.width, options.height
  ));

  let ctx = HostContext::new(options.title.clone());
  app.startup(ctx.clone());

  tokio::select! {
    _ = close_requested => {
      log.info("Close requested");
      app.shutdown(ctx);
      app.supervisor().join(options.join_budget).await;
      log.info("Host closed");
      HostExit::Closed
    }
    Some(fatal) = fatal_rx.recv() => {
      log.error("Embedded service failure; closing host");
      HostExit::Fatal(fatal)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::logger::{Logger, BASE_PREFIX};
  use crate::test_support::SharedBuffer;

  fn filtered(min: LogLevel) -> (FilteredLogger, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let inner: Arc<dyn ShellLogger> = Arc::new(Logger::new(BASE_PREFIX, buffer.clone()));
    (FilteredLogger::new(inner, min), buffer)
  }

  #[test]
  fn production_uses_production_level() {
    let options = HostOptions::for_mode(RuntimeMode::Production);
    assert_eq!(options.effective_log_level(), LogLevel::Error);

    let options = HostOptions::for_mode(RuntimeMode::Development);
    assert_eq!(options.effective_log_level(), LogLevel::Debug);
  }

  #[test]
  fn filter_drops_records_below_threshold() {
    let (log, buffer) = filtered(LogLevel::Error);

    log.debug("quiet");
    log.info("quiet");
    log.warning("quiet");
    log.error("loud");
    log.print("always");
    let _ = log.fatal("always fatal");

    let output = buffer.contents();
    assert!(!output.contains("quiet"));
    assert!(output.contains("ERROR: loud"));
    assert!(output.contains(" always"));
    assert!(output.contains("FATAL: always fatal"));
  }
}
