//! On-disk outputs: session directory layout, result records, response
//! artifacts, and per-provider log files.
mod provider_log;
mod results;
mod session;


pub use provider_log::{ProviderLog, ProviderLogHandle, setup_provider_log};
pub use results::{save_diagnostic_summary, save_response_artifact, save_test_result};
pub use session::{SessionPaths, session_timestamp};
