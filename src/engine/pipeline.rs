// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::engine::buffer::WorkingBuffer;
use crate::engine::phase::{Phase, PhaseContext, PhaseError};
use crate::engine::result::ChangeLogEntry;
use crate::phases::{AntiTamperPhase, CleanupPhase, ControlFlowPhase, LiteralDecodingPhase, VmReconstructionPhase};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

pub struct Pipeline {
    phases: Vec<Box<dyn Phase>>,
}

/// Buffer and log produced by running every phase once.
#[derive(Debug)]
pub struct PipelineRun {
    pub buffer: WorkingBuffer,
    pub entries: Vec<ChangeLogEntry>,
    pub changes: usize,
    pub failed_phases: usize,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { phases: Vec::new() }
    }

    pub fn add_phase(&mut self, phase: Box<dyn Phase>) {
        self.phases.push(phase);
    }

    pub fn phases(&self) -> &[Box<dyn Phase>] {
        &self.phases
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|p| p.name()).collect()
    }

    /// Runs every phase in order. A phase that errors or panics is logged and
    /// its input buffer carried forward untouched.
    pub fn run(&self, buffer: WorkingBuffer, ctx: &PhaseContext<'_>) -> PipelineRun {
        let mut buffer = buffer;
        let mut entries = Vec::new();
        let mut changes = 0;
        let mut failed_phases = 0;

        for phase in &self.phases {
            let snapshot = buffer.clone();
            log::debug!("Running phase {} on {} bytes", phase.name(), snapshot.len());

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| phase.apply(buffer, ctx)))
                .unwrap_or_else(|payload| Err(PhaseError::Panicked(panic_message(payload.as_ref()))));

            match outcome {
                Ok(outcome) => {
                    changes += outcome.changes;
                    entries.extend(outcome.entries);
                    buffer = outcome.buffer;
                }
                Err(e) => {
                    log::warn!("Phase {} failed, rolling back: {}", phase.name(), e);
                    entries.push(ChangeLogEntry::failure(
                        phase.name(),
                        format!("Phase failed ({}); buffer left unchanged", e),
                    ));
                    failed_phases += 1;
                    buffer = snapshot;
                }
            }
        }

        PipelineRun {
            buffer,
            entries,
            changes,
            failed_phases,
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct PipelineBuilder {
    pipeline: Pipeline,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            pipeline: Pipeline::new(),
        }
    }

    pub fn phase<P: Phase + 'static>(mut self, phase: P) -> Self {
        self.pipeline.add_phase(Box::new(phase));
        self
    }

    pub fn phase_if<P: Phase + 'static>(self, enabled: bool, phase: P) -> Self {
        if enabled {
            self.phase(phase)
        } else {
            self
        }
    }

    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Literal decoding, control flow, VM reconstruction, anti-tamper, cleanup.
pub fn create_default_pipeline(config: &Config) -> Pipeline {
    PipelineBuilder::new()
        .phase_if(config.enable_literal_decoding, LiteralDecodingPhase::new())
        .phase_if(config.enable_control_flow, ControlFlowPhase::new())
        .phase_if(config.enable_vm_reconstruction, VmReconstructionPhase::new())
        .phase_if(config.enable_anti_tamper, AntiTamperPhase::new())
        .phase(CleanupPhase::new())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::phase::{PhaseKind, PhaseOutcome};
    use crate::signature::Family;

    struct Append(&'static str);

    impl Phase for Append {
        fn kind(&self) -> PhaseKind {
            PhaseKind::LiteralDecoding
        }

        fn apply(&self, mut buffer: WorkingBuffer, _ctx: &PhaseContext<'_>) -> Result<PhaseOutcome, PhaseError> {
            let text = format!("{}{}", buffer.as_str(), self.0);
            buffer.set(text);
            let mut outcome = PhaseOutcome::new(self.kind(), buffer);
            outcome.record_change(format!("appended {}", self.0));
            Ok(outcome)
        }
    }

    struct Failing;

    impl Phase for Failing {
        fn kind(&self) -> PhaseKind {
            PhaseKind::ControlFlow
        }

        fn apply(&self, _buffer: WorkingBuffer, _ctx: &PhaseContext<'_>) -> Result<PhaseOutcome, PhaseError> {
            Err(PhaseError::Internal("boom".to_string()))
        }
    }

    struct Panicking;

    impl Phase for Panicking {
        fn kind(&self) -> PhaseKind {
            PhaseKind::VmReconstruction
        }

        fn apply(&self, _buffer: WorkingBuffer, _ctx: &PhaseContext<'_>) -> Result<PhaseOutcome, PhaseError> {
            panic!("handler exploded");
        }
    }

    #[test]
    fn test_phases_compose_in_order() {
        let config = Config::default();
        let ctx = PhaseContext::new(Family::Unknown, &config);
        let pipeline = PipelineBuilder::new().phase(Append("a")).phase(Append("b")).build();

        let run = pipeline.run(WorkingBuffer::from("x"), &ctx);
        assert_eq!(run.buffer.as_str(), "xab");
        assert_eq!(run.changes, 2);
        assert_eq!(run.entries.len(), 2);
        assert_eq!(run.entries[0].description, "appended a");
    }

    #[test]
    fn test_failed_phase_rolls_back() {
        let config = Config::default();
        let ctx = PhaseContext::new(Family::Unknown, &config);
        let pipeline = PipelineBuilder::new()
            .phase(Append("a"))
            .phase(Failing)
            .phase(Panicking)
            .phase(Append("b"))
            .build();

        let run = pipeline.run(WorkingBuffer::from("x"), &ctx);
        assert_eq!(run.buffer.as_str(), "xab");
        assert_eq!(run.failed_phases, 2);
        assert_eq!(run.changes, 2);

        let failures: Vec<_> = run.entries.iter().filter(|e| !e.success).collect();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].phase_label, "Control Flow");
        assert_eq!(failures[1].phase_label, "VM Reconstruction");
        assert!(failures[1].description.contains("handler exploded"));
    }

    #[test]
    fn test_default_pipeline_order() {
        let pipeline = create_default_pipeline(&Config::default());
        assert_eq!(
            pipeline.phase_names(),
            vec!["Literal Decoding", "Control Flow", "VM Reconstruction", "Anti-Tamper", "Cleanup"]
        );
    }

    #[test]
    fn test_disabled_phases_are_left_out() {
        let mut config = Config::default();
        config.enable_vm_reconstruction = false;
        let pipeline = create_default_pipeline(&config);
        assert!(!pipeline.phase_names().contains(&"VM Reconstruction"));
        assert_eq!(pipeline.phase_count(), 4);
    }
}
