// Fri Jan 16 2026 - Alex

use crate::config::Config;
use crate::utils::string::StringUtils;
use thiserror::Error;

/// Words that mark a short input as code rather than noise.
const CODE_HINTS: &[&str] = &["function", "print", "local"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Input is empty")]
    Empty,
    #[error("Input is {actual} bytes, limit is {limit}")]
    TooLong { actual: usize, limit: usize },
    #[error("Input is {actual} bytes and does not look like Lua (minimum {minimum})")]
    TooShort { actual: usize, minimum: usize },
}

/// Caller-side gate run before a request is submitted. The engine itself
/// accepts any text.
#[derive(Debug, Clone, Copy)]
pub struct InputValidator {
    max_length: usize,
    min_length: usize,
}

impl InputValidator {
    pub fn new(max_length: usize, min_length: usize) -> Self {
        Self { max_length, min_length }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_source_length, config.min_source_length)
    }

    pub fn validate(&self, source: &str) -> Result<(), InputError> {
        if source.trim().is_empty() {
            return Err(InputError::Empty);
        }
        if source.len() > self.max_length {
            return Err(InputError::TooLong {
                actual: source.len(),
                limit: self.max_length,
            });
        }
        if source.len() < self.min_length && !StringUtils::contains_any(source, CODE_HINTS) {
            return Err(InputError::TooShort {
                actual: source.len(),
                minimum: self.min_length,
            });
        }
        Ok(())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
