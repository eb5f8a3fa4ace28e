use thiserror::Error;

use super::{ConfigError, RunError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("Format error: {source}")]
    Fmt {
        #[from]
        source: std::fmt::Error,
    },
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("HTTP client error: {source}")]
    Reqwest {
        #[from]
        source: reqwest::Error,
    },
    #[error("Join error: {source}")]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
    #[error("Tokenizer error: {message}")]
    Tokenizer { message: String },
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Run error: {0}")]
    Run(#[from] RunError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn config<E>(error: E) -> Self
    where
        E: Into<ConfigError>,
    {
        error.into().into()
    }

    pub fn tokenizer(message: impl Into<String>) -> Self {
        AppError::Tokenizer {
            message: message.into(),
        }
    }
}
