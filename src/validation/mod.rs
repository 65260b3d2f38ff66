// Tue Jan 15 2026 - Alex

pub mod confidence;
pub mod input;

pub use confidence::{ConfidenceLevel, ConfidenceScorer};
pub use input::{InputError, InputValidator};
