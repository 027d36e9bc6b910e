#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::sync::Arc;

use anyhow::{Context, Result};
use boxtest::{
  backend_factory, initialize_logging, route_tracing, run_host, validate_config, App,
  AppConfig, HostExit, HostOptions, Logger, ShellLogger, Supervisor, SupervisorConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
  let config = AppConfig::from_env();
  validate_config(&config).context("Invalid configuration")?;

  let logger = match initialize_logging(config.mode) {
    Ok(logger) => logger,
    Err(err) => {
      eprintln!("Failed to set up logging: {}", err);
      Logger::console()
    }
  };
  route_tracing(&logger, config.mode);

  let (supervisor, fatal_rx) = Supervisor::new(
    logger.clone(),
    SupervisorConfig::from(&config),
    backend_factory(),
  );
  let app = Arc::new(App::new(Arc::new(supervisor)));

  let mut options = HostOptions::for_mode(config.mode);
  options.join_budget = config.join_budget;
  let shell_logger: Arc<dyn ShellLogger> = Arc::new(logger.clone());

  match run_host(app, options, shell_logger, fatal_rx, close_requested(logger.clone())).await {
    HostExit::Closed => Ok(()),
    HostExit::Fatal(fatal) => {
      eprintln!("Fatal: {}", fatal);
      std::process::exit(1);
    }
  }
}

/// Resolves when the user asks the app to close.
async fn close_requested(logger: Logger) {
  if let Err(err) = tokio::signal::ctrl_c().await {
    logger.error(&format!("Unable to listen for close requests: {}", err));
    std::future::pending::<()>().await;
  }
}
