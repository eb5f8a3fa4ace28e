use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
    #[error("no test groups defined")]
    NoGroups,
    #[error("group {index}: name is required")]
    GroupNameRequired { index: usize },
    #[error("group '{group}': no providers defined")]
    NoProvidersInGroup { group: String },
    #[error("group '{group}', provider {index}: provider name is required")]
    ProviderNameRequired { group: String, index: usize },
    #[error("group '{group}', provider {index} ({provider}): model is required")]
    ModelRequired {
        group: String,
        index: usize,
        provider: String,
    },
    #[error("group '{group}', provider {index} ({provider}): no API key defined in [api_keys]")]
    MissingApiKey {
        group: String,
        index: usize,
        provider: String,
    },
    #[error("no API key found for provider '{provider}'")]
    NoApiKeyForProvider { provider: String },
    #[error("API key for provider '{provider}' is empty (check environment variables)")]
    EmptyApiKey { provider: String },
    #[error("group '{group}': diagnostic_params can only be used with mode='diagnostic'")]
    DiagnosticParamsNotAllowed { group: String },
    #[error("group '{group}': invalid base_url '{url}': {source}")]
    InvalidBaseUrl {
        group: String,
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("group '{name}' not found")]
    GroupNotFound { name: String },
    #[error("Provider '{name}' not recognized.")]
    UnknownProvider { name: String },
    #[error("Provider '{name}' is not configured. (Missing APIKey/Model in .env or --model flag for generic)")]
    ProviderNotConfigured { name: String },
    #[error("OAI_API_KEY not set for 'generic' provider.")]
    MissingGenericKey,
    #[error("--model flag is required for 'generic' provider.")]
    MissingGenericModel,
    #[error("No providers configured or selected to test.")]
    NoProvidersSelected,
}
