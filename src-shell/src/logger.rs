use std::fs::{DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::{default_log_dir, RuntimeMode};

/// Prefix of every line written by the shell logger.
pub const BASE_PREFIX: &str = "BOXTEST: ";

/// Prefix of the console logger used while the real sink is being set up.
pub const BOOTSTRAP_PREFIX: &str = "INIT: ";

pub const LOG_FILE_NAME: &str = "app.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
  Trace,
  Debug,
  Info,
  Warning,
  Error,
  Fatal,
}

impl LogLevel {
  pub fn as_str(self) -> &'static str {
    match self {
      LogLevel::Trace => "TRACE",
      LogLevel::Debug => "DEBUG",
      LogLevel::Info => "INFO",
      LogLevel::Warning => "WARNING",
      LogLevel::Error => "ERROR",
      LogLevel::Fatal => "FATAL",
    }
  }
}

#[derive(Debug, Error)]
pub enum LoggingError {
  #[error("failed to create fallback log directory {}: {source}", .path.display())]
  FallbackDirectory {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to create log file {}: {source}", .path.display())]
  OpenFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Returned by [`Logger::fatal`]. Whoever receives it must end the process;
/// the logger itself never exits.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
#[must_use = "a fatal record ends the process; hand it to the entry point"]
pub struct Fatal {
  message: String,
}

impl Fatal {
  pub fn message(&self) -> &str {
    &self.message
  }
}

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Leveled line logger over a single shared sink.
///
/// Cloning is cheap and every clone writes to the same sink. Each record is
/// formatted up front and written under the sink lock in one call, so
/// records from concurrent tasks never interleave.
#[derive(Clone)]
pub struct Logger {
  prefix: &'static str,
  sink: Sink,
  file: Option<Arc<PathBuf>>,
}

impl Logger {
  pub fn new(prefix: &'static str, output: impl Write + Send + 'static) -> Self {
    Self {
      prefix,
      sink: Arc::new(Mutex::new(Box::new(output))),
      file: None,
    }
  }

  /// Console-only logger, used when the durable sink could not be set up.
  pub fn console() -> Self {
    Self::new(BASE_PREFIX, io::stdout())
  }

  /// Minimal console logger for messages emitted during initialization.
  pub fn bootstrap() -> Self {
    Self::new(BOOTSTRAP_PREFIX, io::stdout())
  }

  fn with_file(mut self, path: PathBuf) -> Self {
    self.file = Some(Arc::new(path));
    self
  }

  /// Path of the log file backing this logger, if any.
  pub fn log_file(&self) -> Option<&Path> {
    self.file.as_deref().map(PathBuf::as_path)
  }

  /// Writes `message` without a level tag.
  pub fn print(&self, message: &str) {
    self.write_line(None, message);
  }

  pub fn trace(&self, message: &str) {
    self.write_line(Some(LogLevel::Trace), message);
  }

  pub fn debug(&self, message: &str) {
    self.write_line(Some(LogLevel::Debug), message);
  }

  pub fn info(&self, message: &str) {
    self.write_line(Some(LogLevel::Info), message);
  }

  pub fn warning(&self, message: &str) {
    self.write_line(Some(LogLevel::Warning), message);
  }

  pub fn error(&self, message: &str) {
    self.write_line(Some(LogLevel::Error), message);
  }

  /// Records `message` at FATAL and hands back a [`Fatal`].
  ///
  /// This is a process-ending record: the caller must propagate the
  /// returned value to the entry point, which terminates the process. No
  /// other level affects control flow.
  pub fn fatal(&self, message: &str) -> Fatal {
    self.write_line(Some(LogLevel::Fatal), message);
    Fatal {
      message: message.to_string(),
    }
  }

  /// Raw handle on the underlying sink.
  pub fn writer(&self) -> LogWriter {
    LogWriter {
      sink: self.sink.clone(),
    }
  }

  fn write_line(&self, level: Option<LogLevel>, message: &str) {
    let timestamp = Local::now().format("%Y/%m/%d %H:%M:%S%.6f");
    let line = match level {
      Some(level) => format!("{}{} {}: {}\n", self.prefix, timestamp, level.as_str(), message),
      None => format!("{}{} {}\n", self.prefix, timestamp, message),
    };

    let mut sink = self.sink.lock();
    let _ = sink.write_all(line.as_bytes());
    let _ = sink.flush();
  }
}

/// Logging capability the host shell consumes.
pub trait ShellLogger: Send + Sync {
  fn print(&self, message: &str);
  fn trace(&self, message: &str);
  fn debug(&self, message: &str);
  fn info(&self, message: &str);
  fn warning(&self, message: &str);
  fn error(&self, message: &str);
  fn fatal(&self, message: &str) -> Fatal;
}

impl ShellLogger for Logger {
  fn print(&self, message: &str) {
    Logger::print(self, message)
  }

  fn trace(&self, message: &str) {
    Logger::trace(self, message)
  }

  fn debug(&self, message: &str) {
    Logger::debug(self, message)
  }

  fn info(&self, message: &str) {
    Logger::info(self, message)
  }

  fn warning(&self, message: &str) {
    Logger::warning(self, message)
  }

  fn error(&self, message: &str) {
    Logger::error(self, message)
  }

  fn fatal(&self, message: &str) -> Fatal {
    Logger::fatal(self, message)
  }
}

/// `io::Write` over a logger's sink. Each `write` call goes through the sink
/// lock on its own, so callers should hand over whole records.
#[derive(Clone)]
pub struct LogWriter {
  sink: Sink,
}

impl Write for LogWriter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    let mut sink = self.sink.lock();
    sink.write_all(buf)?;
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    self.sink.lock().flush()
  }
}

/// Duplicates every write to all outputs.
pub struct FanOut {
  outputs: Vec<Box<dyn Write + Send>>,
}

impl FanOut {
  pub fn new(outputs: Vec<Box<dyn Write + Send>>) -> Self {
    Self { outputs }
  }
}

impl Write for FanOut {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    for output in &mut self.outputs {
      output.write_all(buf)?;
    }
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    for output in &mut self.outputs {
      output.flush()?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDestination {
  pub dir: PathBuf,
  pub file: PathBuf,
}

impl LogDestination {
  pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
    let dir = dir.into();
    let file = dir.join(LOG_FILE_NAME);
    Self { dir, file }
  }

  pub fn for_mode(mode: RuntimeMode) -> Self {
    Self::in_dir(default_log_dir(mode))
  }
}

#[derive(Debug, Clone)]
pub struct LoggingOptions {
  pub mode: RuntimeMode,
  pub log_dir: PathBuf,
  /// Used when `log_dir` cannot be created.
  pub fallback_dir: PathBuf,
}

impl LoggingOptions {
  pub fn for_mode(mode: RuntimeMode) -> Self {
    Self {
      mode,
      log_dir: LogDestination::for_mode(mode).dir,
      fallback_dir: std::env::temp_dir(),
    }
  }
}

/// Sets up the process logger for `mode` at its default destination.
pub fn initialize_logging(mode: RuntimeMode) -> Result<Logger, LoggingError> {
  initialize_logging_with(LoggingOptions::for_mode(mode), &Logger::bootstrap())
}

/// Creates the log directory (falling back to `options.fallback_dir`), opens
/// `app.log` for appending and returns the logger writing to it.
///
/// Problems on the way are reported through `bootstrap`. The returned
/// logger's first two records are always the mode and the log file path.
pub fn initialize_logging_with(
  options: LoggingOptions,
  bootstrap: &Logger,
) -> Result<Logger, LoggingError> {
  let mut dir = options.log_dir;
  if let Err(err) = create_log_dir(&dir) {
    bootstrap.warning(&format!(
      "Failed to create log directory {}: {}",
      dir.display(),
      err
    ));
    dir = options.fallback_dir;
    create_log_dir(&dir).map_err(|source| LoggingError::FallbackDirectory {
      path: dir.clone(),
      source,
    })?;
    bootstrap.info(&format!("Using fallback log directory: {}", dir.display()));
  }

  let destination = LogDestination::in_dir(dir);
  let file = OpenOptions::new()
    .create(true)
    .append(true)
    .open(&destination.file)
    .map_err(|source| LoggingError::OpenFile {
      path: destination.file.clone(),
      source,
    })?;

  let logger = if options.mode.is_development() {
    let outputs: Vec<Box<dyn Write + Send>> = vec![Box::new(io::stdout()), Box::new(file)];
    Logger::new(BASE_PREFIX, FanOut::new(outputs))
  } else {
    Logger::new(BASE_PREFIX, file)
  };
  let logger = logger.with_file(destination.file.clone());

  logger.info(&format!("Logging initialized in {} mode", options.mode));
  logger.info(&format!("Log file: {}", destination.file.display()));

  Ok(logger)
}

/// Sends `tracing` events (the embedded backend logs through `tracing`) to
/// the same sink as `logger`. Does nothing if a subscriber is already set.
pub fn route_tracing(logger: &Logger, mode: RuntimeMode) {
  let default_directives = if mode.is_development() {
    "info,boxtest_backend=debug"
  } else {
    "info"
  };
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(default_directives));
  let writer = logger.writer();

  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(move || writer.clone())
    .with_ansi(false)
    .with_target(true)
    .try_init();
}

fn create_log_dir(dir: &Path) -> io::Result<()> {
  let mut builder = DirBuilder::new();
  builder.recursive(true);
  #[cfg(unix)]
  {
    use std::os::unix::fs::DirBuilderExt;
    builder.mode(0o755);
  }
  builder.create(dir)
}
