use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What `bootstrap` prepared; cleared again by `reset_bootstrap_state`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapState {
    pub data_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub bootstrapped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub bootstrapped: bool,
    pub data_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrapped_at: Option<DateTime<Utc>>,
}
