//! Embedded local backend for Box Test.
//!
//! The desktop shell owns the lifecycle: it calls [`Backend::bootstrap`],
//! runs [`Backend::serve`] on a background task, and calls
//! [`Backend::reset_bootstrap_state`] once the serve loop has been told to
//! stop.

mod config;
mod error;
mod server;
mod types;

pub use config::{BackendConfig, LOCK_FILE, STORAGE_DIR};
pub use error::{BackendError, Result};
pub use server::Backend;
pub use types::{BootstrapState, HealthResponse};
