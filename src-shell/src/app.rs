use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::supervisor::Supervisor;

/// Opaque value the host hands to every lifecycle hook. Stored, never
/// inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
  pub session: Uuid,
  pub title: String,
}

impl HostContext {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      session: Uuid::new_v4(),
      title: title.into(),
    }
  }
}

/// What the host shell binds to: two lifecycle hooks and the greeting call.
pub struct App {
  ctx: Mutex<Option<HostContext>>,
  supervisor: Arc<Supervisor>,
}

impl App {
  pub fn new(supervisor: Arc<Supervisor>) -> Self {
    Self {
      ctx: Mutex::new(None),
      supervisor,
    }
  }

  pub fn supervisor(&self) -> &Arc<Supervisor> {
    &self.supervisor
  }

  pub fn context(&self) -> Option<HostContext> {
    self.ctx.lock().clone()
  }

  /// Called by the host once it is up.
  pub fn startup(&self, ctx: HostContext) {
    *self.ctx.lock() = Some(ctx);
    self.supervisor.start_service();
  }

  /// Called by the host as it closes. Does not wait for the service
  /// cleanup.
  pub fn shutdown(&self, ctx: HostContext) {
    *self.ctx.lock() = Some(ctx);
    self.supervisor.request_shutdown();
  }

  pub fn greet(&self, name: &str) -> String {
    format!("Hello {}, It's show time again!", name)
  }
}
