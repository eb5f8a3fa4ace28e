//! CLI argument types and mode resolution.
mod cli;
mod types;


pub use cli::BenchArgs;
pub use types::{RequestKind, TestMode, resolve_test_mode};
