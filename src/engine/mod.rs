// Tue Jan 13 2026 - Alex

pub mod buffer;
pub mod core;
pub mod phase;
pub mod pipeline;
pub mod result;
pub mod runner;

pub use self::core::{Engine, EngineError};
pub use buffer::WorkingBuffer;
pub use phase::{Phase, PhaseContext, PhaseError, PhaseKind, PhaseOutcome};
pub use pipeline::{create_default_pipeline, Pipeline, PipelineBuilder, PipelineRun};
pub use result::{ChangeLogEntry, DeobfuscationRequest, DeobfuscationResult};
pub use runner::{EngineHandle, EngineRunner, RunOutcome};
