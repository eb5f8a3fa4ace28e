//! Token counting behind a small seam so the engine can be tested without
//! loading the real encoder.

use tiktoken_rs::CoreBPE;

use crate::error::{AppError, AppResult};

/// Counts completion tokens in accumulated response text.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// `cl100k_base` encoder, the same encoding the original tooling and most
/// OpenAI-compatible providers report usage in.
pub struct Cl100kCounter {
    bpe: CoreBPE,
}

impl Cl100kCounter {
    /// # Errors
    ///
    /// Returns an error when the encoder tables cannot be initialized.
    pub fn new() -> AppResult<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|err| AppError::tokenizer(err.to_string()))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for Cl100kCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_plain_text() -> crate::error::AppResult<()> {
        let counter = Cl100kCounter::new()?;
        assert_eq!(counter.count(""), 0);
        assert!(counter.count("hello world") >= 2);
        Ok(())
    }
}
