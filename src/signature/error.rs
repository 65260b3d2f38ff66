// Tue Jan 13 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Invalid signature pattern for {id}: {source}")]
    InvalidPattern {
        id: String,
        #[source]
        source: regex::Error,
    },
    #[error("Duplicate signature id: {0}")]
    DuplicateId(String),
}
