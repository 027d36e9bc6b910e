use std::path::{Path, PathBuf};

/// Name of the directory holding the backend's persisted files.
pub const STORAGE_DIR: &str = "storage";

/// Marker written on bootstrap and removed again on reset.
pub const LOCK_FILE: &str = "LOCK";

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub data_dir: PathBuf,
}

impl BackendConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join(STORAGE_DIR)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.storage_dir().join(LOCK_FILE)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
