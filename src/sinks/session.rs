use std::path::PathBuf;

use chrono::Local;

use crate::error::AppResult;

/// Timestamp fragment used for session folders, log files and result files.
#[must_use]
pub fn session_timestamp() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Directory layout of one test session:
/// `<results_root>/session-<ts>/` with a `logs/` subdirectory. Result and
/// report files land in the session directory itself.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub session_dir: PathBuf,
    pub log_dir: PathBuf,
    pub results_dir: PathBuf,
    pub timestamp: String,
}

impl SessionPaths {
    /// Creates the session folder structure under `results_root`.
    ///
    /// # Errors
    ///
    /// Returns an error when the directories cannot be created.
    pub fn create(results_root: &str) -> AppResult<Self> {
        let timestamp = session_timestamp();
        Self::create_with_timestamp(results_root, timestamp)
    }

    /// # Errors
    ///
    /// Returns an error when the directories cannot be created.
    pub fn create_with_timestamp(results_root: &str, timestamp: String) -> AppResult<Self> {
        let session_dir = PathBuf::from(results_root).join(format!("session-{timestamp}"));
        let log_dir = session_dir.join("logs");
        std::fs::create_dir_all(&log_dir)?;
        Ok(Self {
            results_dir: session_dir.clone(),
            session_dir,
            log_dir,
            timestamp,
        })
    }
}
