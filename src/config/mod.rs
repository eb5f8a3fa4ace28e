//! TOML test-group configuration: loading, env resolution, defaults and
//! validation.
mod loader;
mod types;


pub use loader::{
    group_provider_config, load_config, merge_defaults, resolve_env_vars, validate_config,
};
pub use types::{
    ConfigFile, DiagnosticParams, GlobalSettings, GroupMode, GroupProvider, TestGroup, TestParams,
};
