// Fri Jan 16 2026 - Alex

use crate::config::Config;
use crate::engine::buffer::WorkingBuffer;
use crate::engine::result::ChangeLogEntry;
use crate::signature::Family;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Initialization,
    Detection,
    LiteralDecoding,
    ControlFlow,
    VmReconstruction,
    AntiTamper,
    Cleanup,
    Report,
}

impl PhaseKind {
    pub fn label(&self) -> &'static str {
        match self {
            PhaseKind::Initialization => "Initialization",
            PhaseKind::Detection => "Detection",
            PhaseKind::LiteralDecoding => "Literal Decoding",
            PhaseKind::ControlFlow => "Control Flow",
            PhaseKind::VmReconstruction => "VM Reconstruction",
            PhaseKind::AntiTamper => "Anti-Tamper",
            PhaseKind::Cleanup => "Cleanup",
            PhaseKind::Report => "Report",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug)]
pub enum PhaseError {
    #[error("{0}")]
    Internal(String),
    #[error("panicked: {0}")]
    Panicked(String),
}

/// Read-only state shared with every phase of one run.
#[derive(Debug, Clone, Copy)]
pub struct PhaseContext<'a> {
    pub family: Family,
    pub filename_hint: Option<&'a str>,
    pub config: &'a Config,
}

impl<'a> PhaseContext<'a> {
    pub fn new(family: Family, config: &'a Config) -> Self {
        Self {
            family,
            filename_hint: None,
            config,
        }
    }

    pub fn with_filename_hint(mut self, hint: Option<&'a str>) -> Self {
        self.filename_hint = hint;
        self
    }
}

#[derive(Debug)]
pub struct PhaseOutcome {
    kind: PhaseKind,
    pub buffer: WorkingBuffer,
    pub entries: Vec<ChangeLogEntry>,
    pub changes: usize,
}

impl PhaseOutcome {
    pub fn new(kind: PhaseKind, buffer: WorkingBuffer) -> Self {
        Self {
            kind,
            buffer,
            entries: Vec::new(),
            changes: 0,
        }
    }

    pub fn changed(&self) -> bool {
        self.changes > 0
    }

    /// Logs a successful sub-step that rewrote the buffer.
    pub fn record_change(&mut self, description: impl Into<String>) {
        self.changes += 1;
        self.entries.push(ChangeLogEntry::success(self.kind.label(), description));
    }

    pub fn record_note(&mut self, description: impl Into<String>) {
        self.entries.push(ChangeLogEntry::success(self.kind.label(), description));
    }

    pub fn record_failure(&mut self, description: impl Into<String>) {
        self.entries.push(ChangeLogEntry::failure(self.kind.label(), description));
    }

    pub fn failure_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.success).count()
    }
}

/// One ordered, isolated transformation step.
pub trait Phase: Send + Sync {
    fn kind(&self) -> PhaseKind;

    fn name(&self) -> &'static str {
        self.kind().label()
    }

    fn apply(&self, buffer: WorkingBuffer, ctx: &PhaseContext<'_>) -> Result<PhaseOutcome, PhaseError>;
}
