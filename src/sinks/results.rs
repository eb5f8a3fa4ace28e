use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::AppResult;
use crate::metrics::{DiagnosticSummary, TestResult};

/// Writes one benchmark result as a pretty-printed JSON file named
/// `<provider>-<ts>.json`.
///
/// # Errors
///
/// Returns an error when the record cannot be serialized or written.
pub fn save_test_result(results_dir: &Path, result: &TestResult) -> AppResult<PathBuf> {
    let timestamp = result.timestamp.format("%Y%m%d-%H%M%S");
    let path = results_dir.join(format!("{}-{timestamp}.json", result.provider));
    let data = serde_json::to_string_pretty(result)?;
    std::fs::write(&path, data)?;
    info!("Result saved: {}", path.display());
    Ok(path)
}

/// Writes one diagnostic summary as
/// `<provider>-diagnostic-summary-<ts>.json`.
///
/// # Errors
///
/// Returns an error when the record cannot be serialized or written.
pub fn save_diagnostic_summary(
    results_dir: &Path,
    summary: &DiagnosticSummary,
) -> AppResult<PathBuf> {
    let timestamp = summary.timestamp.format("%Y%m%d-%H%M%S");
    let path = results_dir.join(format!(
        "{}-diagnostic-summary-{timestamp}.json",
        summary.provider
    ));
    let data = serde_json::to_string_pretty(summary)?;
    std::fs::write(&path, data)?;
    info!("Diagnostic summary saved: {}", path.display());
    Ok(path)
}

/// Archives one raw response body under the session log directory.
///
/// # Errors
///
/// Returns an error when the artifact cannot be written.
pub fn save_response_artifact(log_dir: &Path, file_name: &str, content: &str) -> AppResult<PathBuf> {
    let path = log_dir.join(file_name);
    std::fs::write(&path, content)?;
    Ok(path)
}
