//! Provider registry: the fixed name -> base-URL table, environment-backed
//! credentials, and provider selection for a run.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use tracing::info;

use crate::args::BenchArgs;
use crate::error::{AppError, AppResult, ConfigError};

/// The flag-driven provider that takes `--url`/`--model` overrides.
pub const GENERIC_PROVIDER: &str = "generic";

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Built-in providers with environment-variable credentials
/// (`<NAME>_API_KEY` / `<NAME>_MODEL`).
const ENV_PROVIDERS: [&str; 5] = ["nim", "nahcrof", "novita", "nebius", "minimax"];

static DEFAULT_BASE_URLS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        (GENERIC_PROVIDER, OPENROUTER_BASE_URL),
        ("nim", "https://integrate.api.nvidia.com/v1"),
        ("nahcrof", "https://ai.nahcrof.com/v2"),
        ("novita", "https://api.novita.ai/openai"),
        ("nebius", "https://api.tokenfactory.nebius.com/v1"),
        ("minimax", "https://api.minimax.io/v1"),
    ])
});

/// Connection details for one provider. Built once, shared read-only across
/// every concurrent run against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl ProviderConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.model.is_empty()
    }
}

/// Default base URL for a provider name; unknown providers fall back to
/// OpenRouter.
#[must_use]
pub fn default_base_url(provider: &str) -> &'static str {
    DEFAULT_BASE_URLS
        .get(provider)
        .copied()
        .unwrap_or(OPENROUTER_BASE_URL)
}

/// Builds the full provider table from the environment and the generic
/// overrides.
#[must_use]
pub fn builtin_providers(args: &BenchArgs) -> BTreeMap<String, ProviderConfig> {
    let mut configs = BTreeMap::new();

    let generic_base = args
        .url
        .clone()
        .unwrap_or_else(|| default_base_url(GENERIC_PROVIDER).to_owned());
    configs.insert(
        GENERIC_PROVIDER.to_owned(),
        ProviderConfig {
            name: GENERIC_PROVIDER.to_owned(),
            base_url: generic_base,
            api_key: std::env::var("OAI_API_KEY").unwrap_or_default(),
            model: args.model.clone().unwrap_or_default(),
        },
    );

    for name in ENV_PROVIDERS {
        let upper = name.to_uppercase();
        configs.insert(
            name.to_owned(),
            ProviderConfig {
                name: name.to_owned(),
                base_url: default_base_url(name).to_owned(),
                api_key: std::env::var(format!("{upper}_API_KEY")).unwrap_or_default(),
                model: std::env::var(format!("{upper}_MODEL")).unwrap_or_default(),
            },
        );
    }

    configs
}

/// Selects the providers this invocation will test.
///
/// # Errors
///
/// Returns a configuration error when the named provider is unknown or not
/// configured, when the generic provider is missing its key or model, or
/// when `--all` finds nothing configured.
pub fn select_providers(
    args: &BenchArgs,
    configs: &BTreeMap<String, ProviderConfig>,
) -> AppResult<Vec<ProviderConfig>> {
    let mut selected = Vec::new();

    if args.all {
        info!("--- Testing all configured providers... ---");
        for (name, config) in configs {
            if name == GENERIC_PROVIDER {
                continue;
            }
            if config.is_configured() {
                selected.push(config.clone());
            } else {
                info!("... Skipping '{name}': APIKey or Model not configured in .env");
            }
        }
        if configs
            .get(GENERIC_PROVIDER)
            .is_some_and(ProviderConfig::is_configured)
        {
            info!(
                "... 'generic' provider is configured, but will be skipped. \
                 Use --provider=generic or no flags to test it."
            );
        }
        if selected.is_empty() {
            return Err(AppError::config(ConfigError::NoProvidersSelected));
        }
        return Ok(selected);
    }

    if let Some(name) = args.provider.as_deref() {
        info!("--- Testing single provider: '{name}' ---");
        let config = configs
            .get(name)
            .ok_or_else(|| {
                AppError::config(ConfigError::UnknownProvider {
                    name: name.to_owned(),
                })
            })?
            .clone();
        if !config.is_configured() {
            return Err(AppError::config(ConfigError::ProviderNotConfigured {
                name: name.to_owned(),
            }));
        }
        selected.push(config);
        return Ok(selected);
    }

    info!("--- Testing default 'generic' provider... ---");
    let config = configs
        .get(GENERIC_PROVIDER)
        .cloned()
        .unwrap_or_else(|| ProviderConfig {
            name: GENERIC_PROVIDER.to_owned(),
            base_url: OPENROUTER_BASE_URL.to_owned(),
            api_key: String::new(),
            model: String::new(),
        });
    if config.api_key.is_empty() {
        return Err(AppError::config(ConfigError::MissingGenericKey));
    }
    if config.model.is_empty() {
        return Err(AppError::config(ConfigError::MissingGenericModel));
    }
    selected.push(config);
    Ok(selected)
}

/// Collapses a model identifier into a filesystem-safe name fragment:
/// slashes, spaces and colons become dashes, dash runs collapse, edge dashes
/// are trimmed.
#[must_use]
pub fn sanitize_model_name(model: &str) -> String {
    let mut name = String::with_capacity(model.len());
    let mut last_dash = false;
    for ch in model.chars() {
        let mapped = match ch {
            '/' | ' ' | ':' => '-',
            other => other,
        };
        if mapped == '-' {
            if !last_dash {
                name.push('-');
            }
            last_dash = true;
        } else {
            name.push(mapped);
            last_dash = false;
        }
    }
    name.trim_matches('-').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_urls_cover_known_providers() {
        assert_eq!(default_base_url("nim"), "https://integrate.api.nvidia.com/v1");
        assert_eq!(default_base_url("novita"), "https://api.novita.ai/openai");
        assert_eq!(default_base_url("nebius"), "https://api.tokenfactory.nebius.com/v1");
        assert_eq!(default_base_url("minimax"), "https://api.minimax.io/v1");
        assert_eq!(default_base_url("nahcrof"), "https://ai.nahcrof.com/v2");
    }

    #[test]
    fn unknown_provider_falls_back_to_openrouter() {
        assert_eq!(default_base_url("somebody-else"), OPENROUTER_BASE_URL);
        assert_eq!(default_base_url(GENERIC_PROVIDER), OPENROUTER_BASE_URL);
    }

    #[test]
    fn sanitize_replaces_separators_with_dashes() {
        assert_eq!(
            sanitize_model_name("meta-llama/Llama-3.3-70B-Instruct"),
            "meta-llama-Llama-3.3-70B-Instruct"
        );
        assert_eq!(sanitize_model_name("gpt 4o: latest"), "gpt-4o-latest");
    }

    #[test]
    fn sanitize_collapses_and_trims_dashes() {
        assert_eq!(sanitize_model_name("/a//b: :c/"), "a-b-c");
        assert_eq!(sanitize_model_name("---"), "");
    }

    #[test]
    fn configured_requires_key_and_model() {
        let mut config = ProviderConfig {
            name: "nim".to_owned(),
            base_url: default_base_url("nim").to_owned(),
            api_key: "key".to_owned(),
            model: String::new(),
        };
        assert!(!config.is_configured());
        config.model = "some-model".to_owned();
        assert!(config.is_configured());
        config.api_key = String::new();
        assert!(!config.is_configured());
    }
}
