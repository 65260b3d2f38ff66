// Tue Jan 13 2026 - Alex

use crate::engine::result::DeobfuscationResult;
use crate::utils::format_duration;
use crate::validation::ConfidenceLevel;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Markdown,
}

/// Human-readable summary of one run.
pub struct ReportGenerator {
    format: ReportFormat,
    max_entries: usize,
    include_header: bool,
}

impl ReportGenerator {
    pub fn new(format: ReportFormat) -> Self {
        Self {
            format,
            max_entries: 15,
            include_header: true,
        }
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }

    pub fn generate(&self, result: &DeobfuscationResult, elapsed: Duration) -> String {
        match self.format {
            ReportFormat::Text => self.generate_text(result, elapsed),
            ReportFormat::Markdown => self.generate_markdown(result, elapsed),
        }
    }

    pub fn generate_to_file<P: AsRef<Path>>(&self, result: &DeobfuscationResult, elapsed: Duration, path: P) -> std::io::Result<()> {
        let report = self.generate(result, elapsed);
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(report.as_bytes())?;
        writer.flush()
    }

    fn marker(success: bool) -> &'static str {
        if success {
            "✓"
        } else {
            "✗"
        }
    }

    fn hidden(&self, result: &DeobfuscationResult) -> usize {
        result.change_log().len().saturating_sub(self.max_entries)
    }

    fn generate_text(&self, result: &DeobfuscationResult, elapsed: Duration) -> String {
        let mut out = String::new();

        if self.include_header {
            out.push_str("Deobfuscation Report\n");
            out.push_str("====================\n");
        }
        let _ = writeln!(out, "Detected type: {}", result.detected_type());
        let _ = writeln!(
            out,
            "Confidence:    {}% ({})",
            result.confidence(),
            ConfidenceLevel::from_score(result.confidence()).as_str()
        );
        let _ = writeln!(out, "Changes made:  {}", result.changes_made());
        let _ = writeln!(out, "Elapsed:       {}", format_duration(elapsed));
        out.push('\n');

        for entry in result.change_log().iter().take(self.max_entries) {
            let _ = writeln!(out, "  {} [{}] {}", Self::marker(entry.success), entry.phase_label, entry.description);
        }
        let hidden = self.hidden(result);
        if hidden > 0 {
            let _ = writeln!(out, "  ... and {} more", hidden);
        }
        out
    }

    fn generate_markdown(&self, result: &DeobfuscationResult, elapsed: Duration) -> String {
        let mut out = String::new();

        if self.include_header {
            out.push_str("# Deobfuscation Report\n\n");
        }
        out.push_str("| Field | Value |\n|-------|-------|\n");
        let _ = writeln!(out, "| Detected type | {} |", result.detected_type());
        let _ = writeln!(out, "| Confidence | {}% |", result.confidence());
        let _ = writeln!(out, "| Changes made | {} |", result.changes_made());
        let _ = writeln!(out, "| Elapsed | {} |", format_duration(elapsed));

        out.push_str("\n## Changes\n\n");
        for entry in result.change_log().iter().take(self.max_entries) {
            let _ = writeln!(out, "- {} **{}**: {}", Self::marker(entry.success), entry.phase_label, entry.description.replace('\n', " "));
        }
        let hidden = self.hidden(result);
        if hidden > 0 {
            let _ = writeln!(out, "- _{} more entries omitted_", hidden);
        }
        out
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(ReportFormat::Text)
    }
}
