//! Runs the default logging entry point from the environment. Kept in its
//! own binary since it changes the process working directory and `APP_ENV`.

use std::path::Path;

use boxtest::config::APP_ENV_VAR;
use boxtest::{initialize_logging, AppConfig, RuntimeMode};

#[test]
fn development_env_logs_under_working_directory() {
  let dir = tempfile::tempdir().unwrap();
  std::env::set_current_dir(dir.path()).unwrap();
  std::env::set_var(APP_ENV_VAR, "development");

  let config = AppConfig::from_env();
  assert_eq!(config.mode, RuntimeMode::Development);

  let logger = initialize_logging(config.mode).unwrap();
  assert_eq!(logger.log_file(), Some(Path::new("./logs/app.log")));

  logger.info("ready");

  let contents = std::fs::read_to_string(dir.path().join("logs").join("app.log")).unwrap();
  let lines: Vec<&str> = contents.lines().collect();
  assert!(lines[0].ends_with("INFO: Logging initialized in development mode"));
  assert!(lines[1].ends_with("INFO: Log file: ./logs/app.log"));
  assert!(lines[2].ends_with("INFO: ready"));

  std::env::set_var(APP_ENV_VAR, "staging");
  assert_eq!(RuntimeMode::from_env(), RuntimeMode::Production);
}
