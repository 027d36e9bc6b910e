use std::collections::HashSet;
use std::path::PathBuf;

use boxtest::logger::{LogDestination, BASE_PREFIX};
use boxtest::{initialize_logging_with, Logger, LoggingOptions, RuntimeMode};

const TASKS: usize = 8;
const LINES: usize = 250;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_records_stay_intact() {
  let dir = tempfile::tempdir().unwrap();
  let logger = initialize_logging_with(
    LoggingOptions {
      mode: RuntimeMode::Production,
      log_dir: dir.path().to_path_buf(),
      fallback_dir: dir.path().join("fallback"),
    },
    &Logger::new("INIT: ", std::io::sink()),
  )
  .unwrap();

  let mut handles = Vec::new();
  for task in 0..TASKS {
    let logger = logger.clone();
    handles.push(tokio::spawn(async move {
      for line in 0..LINES {
        logger.info(&format!("task {task} line {line} {}", "x".repeat(64)));
        if line % 50 == 0 {
          tokio::task::yield_now().await;
        }
      }
    }));
  }
  for handle in handles {
    handle.await.unwrap();
  }

  let contents = std::fs::read_to_string(logger.log_file().unwrap()).unwrap();
  let records: Vec<&str> = contents.lines().skip(2).collect();
  assert_eq!(records.len(), TASKS * LINES);

  let mut seen = HashSet::new();
  for record in records {
    assert!(record.starts_with(BASE_PREFIX), "mangled record: {record}");
    let body = record
      .split_once(" INFO: ")
      .map(|(_, body)| body)
      .unwrap_or_else(|| panic!("mangled record: {record}"));
    let parts: Vec<&str> = body.split(' ').collect();
    assert_eq!(parts.len(), 5, "mangled record: {record}");
    assert_eq!(parts[4].len(), 64);
    assert!(seen.insert((parts[1].to_string(), parts[3].to_string())));
  }
  assert_eq!(seen.len(), TASKS * LINES);
}

#[test]
fn development_destination_is_relative_logs_dir() {
  let destination = LogDestination::for_mode(RuntimeMode::Development);
  assert_eq!(destination.dir, PathBuf::from("./logs"));
  assert_eq!(destination.file, PathBuf::from("./logs/app.log"));
}

#[test]
fn production_destination_is_under_app_data() {
  let destination = LogDestination::for_mode(RuntimeMode::Production);
  assert!(destination.file.ends_with("BoxTest/logs/app.log"));
}
