// Tue Jan 13 2026 - Alex

pub mod catalog;
pub mod error;
pub mod signature;

pub use catalog::{Detection, SignatureCatalog};
pub use error::SignatureError;
pub use signature::{Family, Signature, SignatureMatch};

/// Detects the obfuscator family using the process-wide default catalog.
pub fn identify(text: &str) -> Family {
    SignatureCatalog::global().identify(text)
}
