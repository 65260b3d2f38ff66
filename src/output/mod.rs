// Tue Jan 13 2026 - Alex

pub mod json;
pub mod report;

pub use json::{JsonSerializer, ReportError};
pub use report::{ReportFormat, ReportGenerator};
