//! Box Test desktop shell: starts the embedded backend alongside the host,
//! stops it again when the host closes, and keeps a durable log of both.

pub mod app;
pub mod config;
pub mod host;
pub mod logger;
pub mod service;
pub mod supervisor;

#[cfg(test)]
mod test_support;

pub use app::{App, HostContext};
pub use config::{validate_config, AppConfig, RuntimeMode};
pub use host::{run_host, FilteredLogger, HostExit, HostOptions};
pub use logger::{
  initialize_logging, initialize_logging_with, route_tracing, Fatal, LogLevel, Logger,
  LoggingError, LoggingOptions, ShellLogger,
};
pub use service::{backend_factory, EmbeddedService, ServiceError, ServiceFactory};
pub use supervisor::{FatalReceiver, Phase, Supervisor, SupervisorConfig};
