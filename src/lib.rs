// Tue Jan 15 2026 - Alex

pub mod config;
pub mod engine;
pub mod output;
pub mod phases;
pub mod signature;
pub mod ui;
pub mod utils;
pub mod validation;

pub use config::{Config, ConfigError, ScoringConfig};
pub use engine::{ChangeLogEntry, DeobfuscationRequest, DeobfuscationResult, Engine, EngineError, EngineRunner};
pub use signature::{Family, SignatureCatalog};
pub use validation::{ConfidenceScorer, InputValidator};

/// Runs the default pipeline once over `source`.
pub fn deobfuscate(source: &str, filename_hint: Option<&str>) -> DeobfuscationResult {
    let mut request = DeobfuscationRequest::new(source);
    if let Some(hint) = filename_hint {
        request = request.with_filename(hint);
    }
    Engine::default().deobfuscate(&request)
}
