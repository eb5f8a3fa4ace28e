use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::{AppError, AppResult, ConfigError};
use crate::providers::{ProviderConfig, default_base_url, sanitize_model_name};

use super::types::{ConfigFile, DiagnosticParams, GroupProvider, TestParams};

static BRACED_VAR: Lazy<Regex> = Lazy::new(|| {
    #[expect(clippy::unwrap_used, reason = "the pattern is a checked constant")]
    let re = Regex::new(r"\$\{([^}]+)\}").unwrap();
    re
});

static BARE_VAR: Lazy<Regex> = Lazy::new(|| {
    #[expect(clippy::unwrap_used, reason = "the pattern is a checked constant")]
    let re = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap();
    re
});

/// Replaces `${VAR}` and `$VAR` references with environment values; missing
/// variables resolve to the empty string.
#[must_use]
pub fn resolve_env_vars(value: &str) -> String {
    let resolved = BRACED_VAR.replace_all(value, |caps: &regex::Captures<'_>| {
        caps.get(1)
            .map(|name| std::env::var(name.as_str()).unwrap_or_default())
            .unwrap_or_default()
    });
    BARE_VAR
        .replace_all(&resolved, |caps: &regex::Captures<'_>| {
            caps.get(1)
                .map(|name| std::env::var(name.as_str()).unwrap_or_default())
                .unwrap_or_default()
        })
        .into_owned()
}

/// Loads, resolves, defaults and validates a TOML config file.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed, or when the
/// configuration fails validation.
pub fn load_config(path: &Path) -> AppResult<ConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        AppError::config(ConfigError::ReadConfig {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    let mut config: ConfigFile = toml::from_str(&content).map_err(|err| {
        AppError::config(ConfigError::ParseToml {
            path: path.to_path_buf(),
            source: Box::new(err),
        })
    })?;

    for value in config.api_keys.values_mut() {
        *value = resolve_env_vars(value);
    }

    merge_defaults(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Fills in the documented defaults for anything the file left unset.
pub fn merge_defaults(config: &mut ConfigFile) {
    let global = &mut config.global;
    global.timeout_seconds.get_or_insert(120);
    global
        .results_dir
        .get_or_insert_with(|| "results".to_owned());
    global.log_level.get_or_insert_with(|| "info".to_owned());
    let global_timeout = global.timeout_seconds;

    for group in &mut config.groups {
        if group.mode.is_diagnostic() {
            let params = group
                .diagnostic_params
                .get_or_insert_with(DiagnosticParams::default);
            params.duration_seconds.get_or_insert(60);
            params.workers.get_or_insert(10);
            params.interval_seconds.get_or_insert(15);
            params.timeout_per_request_seconds.get_or_insert(30);
        } else {
            let params = group.test_params.get_or_insert_with(TestParams::default);
            params.iterations.get_or_insert(3);
            if params.timeout_seconds.is_none() {
                params.timeout_seconds = global_timeout;
            }
        }

        for provider in &mut group.providers {
            if provider.base_url.is_none() {
                provider.base_url = Some(default_base_url(&provider.provider).to_owned());
            }
        }
    }
}

/// Checks structural validity after defaults were merged.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn validate_config(config: &ConfigFile) -> AppResult<()> {
    if config.groups.is_empty() {
        return Err(AppError::config(ConfigError::NoGroups));
    }

    for (index, group) in config.groups.iter().enumerate() {
        if group.name.is_empty() {
            return Err(AppError::config(ConfigError::GroupNameRequired { index }));
        }
        if group.providers.is_empty() {
            return Err(AppError::config(ConfigError::NoProvidersInGroup {
                group: group.name.clone(),
            }));
        }
        if !group.mode.is_diagnostic() && group.diagnostic_params.is_some() {
            return Err(AppError::config(ConfigError::DiagnosticParamsNotAllowed {
                group: group.name.clone(),
            }));
        }

        for (provider_index, provider) in group.providers.iter().enumerate() {
            if provider.provider.is_empty() {
                return Err(AppError::config(ConfigError::ProviderNameRequired {
                    group: group.name.clone(),
                    index: provider_index,
                }));
            }
            if provider.model.is_empty() {
                return Err(AppError::config(ConfigError::ModelRequired {
                    group: group.name.clone(),
                    index: provider_index,
                    provider: provider.provider.clone(),
                }));
            }
            if !config.api_keys.contains_key(&provider.provider) {
                return Err(AppError::config(ConfigError::MissingApiKey {
                    group: group.name.clone(),
                    index: provider_index,
                    provider: provider.provider.clone(),
                }));
            }
            if let Some(base_url) = provider.base_url.as_deref() {
                if let Err(err) = Url::parse(base_url) {
                    return Err(AppError::config(ConfigError::InvalidBaseUrl {
                        group: group.name.clone(),
                        url: base_url.to_owned(),
                        source: err,
                    }));
                }
            }
        }
    }

    Ok(())
}

/// Builds the runnable provider config for one group entry. The provider
/// name carries the sanitized model so result files from one group don't
/// collide.
///
/// # Errors
///
/// Returns an error when the API key is missing or resolves to empty.
pub fn group_provider_config(
    entry: &GroupProvider,
    api_keys: &std::collections::BTreeMap<String, String>,
) -> AppResult<ProviderConfig> {
    let api_key = api_keys
        .get(&entry.provider)
        .cloned()
        .ok_or_else(|| {
            AppError::config(ConfigError::NoApiKeyForProvider {
                provider: entry.provider.clone(),
            })
        })?;
    if api_key.is_empty() {
        return Err(AppError::config(ConfigError::EmptyApiKey {
            provider: entry.provider.clone(),
        }));
    }

    let base_url = entry
        .base_url
        .clone()
        .unwrap_or_else(|| default_base_url(&entry.provider).to_owned());

    Ok(ProviderConfig {
        name: format!(
            "{}-{}",
            entry.provider,
            sanitize_model_name(&entry.model)
        ),
        base_url,
        api_key,
        model: entry.model.clone(),
    })
}
