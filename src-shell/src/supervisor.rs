//! Lifecycle supervision for the embedded service.
//!
//! ```text
//!            start_service                request_shutdown
//!   Idle ───────────────────► Running ─────────────────────► ShuttingDown
//!    ▲                                                             │
//!    └──────────── await task: bounded reset_bootstrap_state ◄────┘
//! ```
//!
//! `start_service` spawns two tasks and returns: the serve task (bootstrap,
//! then serve until cancelled) and the await task (wait for cancellation,
//! then clean up within the budget). Failures after startup only reach the
//! logger, except for unexpected serve failures, which are also sent as a
//! [`Fatal`] to whoever holds the [`FatalReceiver`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::logger::{Fatal, Logger};
use crate::service::{EmbeddedService, ServiceError, ServiceFactory};

pub type FatalReceiver = mpsc::UnboundedReceiver<Fatal>;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
  pub data_dir: PathBuf,
  pub http_addr: SocketAddr,
  pub cleanup_budget: Duration,
}

impl From<&AppConfig> for SupervisorConfig {
  fn from(config: &AppConfig) -> Self {
    Self {
      data_dir: config.service_data_dir.clone(),
      http_addr: config.http_addr,
      cleanup_budget: config.cleanup_budget,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Idle,
  Running,
  ShuttingDown,
}

/// The running embedded service.
#[derive(Clone)]
struct ServiceHandle {
  service: Arc<dyn EmbeddedService>,
  data_dir: PathBuf,
  addr: SocketAddr,
}

struct Live {
  handle: ServiceHandle,
  token: CancellationToken,
  generation: u64,
}

#[derive(Default)]
struct SupervisorState {
  live: Option<Live>,
  generation: u64,
}

pub struct Supervisor {
  logger: Logger,
  config: SupervisorConfig,
  factory: ServiceFactory,
  state: Arc<Mutex<SupervisorState>>,
  tasks: Mutex<Vec<JoinHandle<()>>>,
  fatal_tx: mpsc::UnboundedSender<Fatal>,
}

impl Supervisor {
  /// Creates an idle supervisor and the receiver on which unexpected
  /// service failures are reported.
  pub fn new(
    logger: Logger,
    config: SupervisorConfig,
    factory: ServiceFactory,
  ) -> (Self, FatalReceiver) {
    let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
    let supervisor = Self {
      logger,
      config,
      factory,
      state: Arc::new(Mutex::new(SupervisorState::default())),
      tasks: Mutex::new(Vec::new()),
      fatal_tx,
    };
    (supervisor, fatal_rx)
  }

  pub fn phase(&self) -> Phase {
    match &self.state.lock().live {
      None => Phase::Idle,
      Some(live) if live.token.is_cancelled() => Phase::ShuttingDown,
      Some(_) => Phase::Running,
    }
  }

  /// Launches the embedded service in the background and returns at once.
  ///
  /// Ignored with a warning while a previous instance is still live.
  /// Must be called from within a Tokio runtime.
  pub fn start_service(&self) {
    let (handle, token, generation) = {
      let mut state = self.state.lock();
      if state.live.is_some() {
        self.logger
          .warning("Embedded service already running; ignoring start request");
        return;
      }

      let data_dir = self.config.data_dir.clone();
      let handle = ServiceHandle {
        service: (self.factory)(data_dir.as_path()),
        data_dir,
        addr: self.config.http_addr,
      };
      let token = CancellationToken::new();
      state.generation += 1;
      let generation = state.generation;
      state.live = Some(Live {
        handle: handle.clone(),
        token: token.clone(),
        generation,
      });
      (handle, token, generation)
    };

    self.logger.info(&format!(
      "Starting embedded service on {} (data dir: {})",
      handle.addr,
      handle.data_dir.display()
    ));

    let (stopped_tx, stopped_rx) = oneshot::channel();

    let serve_task = tokio::spawn(run_service(
      handle.clone(),
      token.clone(),
      self.logger.clone(),
      self.fatal_tx.clone(),
      stopped_tx,
    ));

    let cleanup_task = tokio::spawn(await_and_cleanup(
      handle,
      token,
      stopped_rx,
      self.config.cleanup_budget,
      self.logger.clone(),
      self.state.clone(),
      generation,
    ));

    let mut tasks = self.tasks.lock();
    tasks.retain(|task| !task.is_finished());
    tasks.push(serve_task);
    tasks.push(cleanup_task);
  }

  /// Signals the running service to stop. Returns immediately; cleanup
  /// happens on the await task. A no-op when nothing is running.
  pub fn request_shutdown(&self) {
    let state = self.state.lock();
    match &state.live {
      Some(live) => {
        if !live.token.is_cancelled() {
          self.logger.info("Stopping embedded service");
        }
        live.token.cancel();
      }
      None => {
        self.logger
          .debug("Shutdown requested but no embedded service is running");
      }
    }
  }

  /// Waits for the serve and await tasks to finish. Tasks still running
  /// once `budget` is spent are aborted.
  pub async fn join(&self, budget: Duration) {
    let tasks = std::mem::take(&mut *self.tasks.lock());
    let deadline = tokio::time::Instant::now() + budget;

    for mut task in tasks {
      match tokio::time::timeout_at(deadline, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
          self.logger
            .error(&format!("Supervisor task ended abnormally: {err}"));
        }
        Err(_) => {
          task.abort();
          self.logger.warning(&format!(
            "Supervisor task still running after {budget:?}; aborted"
          ));
        }
      }
    }
  }
}

async fn run_service(
  handle: ServiceHandle,
  token: CancellationToken,
  logger: Logger,
  fatal_tx: mpsc::UnboundedSender<Fatal>,
  stopped_tx: oneshot::Sender<()>,
) {
  let result: Result<(), ServiceError> = async {
    handle.service.bootstrap().await?;
    logger.info(&format!(
      "Embedded service bootstrapped in {}",
      handle.data_dir.display()
    ));
    handle.service.serve(handle.addr, token).await
  }
  .await;

  match result {
    Ok(()) => logger.info("Embedded service stopped"),
    Err(err) if err.is_server_closed() => logger.info("Embedded service closed"),
    Err(err) => {
      let fatal = logger.fatal(&format!("Embedded service failed: {err}"));
      let _ = fatal_tx.send(fatal);
    }
  }

  let _ = stopped_tx.send(());
}

async fn await_and_cleanup(
  handle: ServiceHandle,
  token: CancellationToken,
  stopped_rx: oneshot::Receiver<()>,
  budget: Duration,
  logger: Logger,
  state: Arc<Mutex<SupervisorState>>,
  generation: u64,
) {
  token.cancelled().await;
  logger.info("Shutdown requested; cleaning up embedded service");

  let deadline = tokio::time::Instant::now() + budget;

  // The serve loop may use half the budget to wind down. The reset runs
  // either way.
  if tokio::time::timeout(budget / 2, stopped_rx).await.is_err() {
    logger.warning("Embedded service still serving; resetting anyway");
  }

  match tokio::time::timeout_at(deadline, handle.service.reset_bootstrap_state()).await {
    Ok(Ok(())) => logger.info("Embedded service cleanup finished"),
    Ok(Err(err)) => logger.error(&format!("Cleanup error: {err}")),
    Err(_) => logger.error(&format!(
      "Cleanup error: {}",
      ServiceError::CleanupTimeout(budget)
    )),
  }

  let mut state = state.lock();
  if state.live.as_ref().map(|live| live.generation) == Some(generation) {
    state.live = None;
  }
}
