// Fri Jan 16 2026 - Alex

use crate::engine::buffer::WorkingBuffer;
use crate::engine::phase::{Phase, PhaseContext, PhaseError, PhaseKind, PhaseOutcome};
use crate::utils::scanner::{tokenize, TokenKind};
use std::ops::Range;

/// Normalizes line endings and blank space. Line structure is kept, and
/// lines that break inside a string literal are copied as they are.
pub fn normalize_whitespace(text: &str) -> String {
    let strings: Vec<Range<usize>> = tokenize(text)
        .into_iter()
        .filter(|t| t.kind == TokenKind::Str)
        .map(|t| t.span())
        .collect();
    let inside_string = |pos: usize| {
        let i = strings.partition_point(|r| r.end <= pos);
        strings.get(i).map_or(false, |r| r.start < pos)
    };

    let mut out = String::with_capacity(text.len());
    let mut blank_run = false;
    let mut offset = 0;

    for raw in text.split('\n') {
        let line_break = offset + raw.len();
        offset = line_break + 1;
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if inside_string(line_break) {
            blank_run = false;
            out.push_str(line);
            out.push('\n');
            continue;
        }

        let line = line.trim_end();
        if line.is_empty() {
            if blank_run {
                continue;
            }
            blank_run = true;
        } else {
            blank_run = false;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim().to_string()
}

/// Cosmetic final pass. Never counts toward the change total.
pub struct CleanupPhase;

impl CleanupPhase {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CleanupPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl Phase for CleanupPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Cleanup
    }

    fn apply(&self, buffer: WorkingBuffer, _ctx: &PhaseContext<'_>) -> Result<PhaseOutcome, PhaseError> {
        let mut outcome = PhaseOutcome::new(self.kind(), buffer);
        let text = normalize_whitespace(outcome.buffer.as_str());
        outcome.buffer.set(text);
        outcome.record_note("Cleaned up code");
        Ok(outcome)
    }
}
