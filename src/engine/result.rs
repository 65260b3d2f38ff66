// Tue Jan 13 2026 - Alex

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeobfuscationRequest {
    pub source_text: String,
    pub filename_hint: Option<String>,
}

impl DeobfuscationRequest {
    pub fn new(source_text: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            filename_hint: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename_hint = Some(filename.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    pub phase_label: String,
    pub description: String,
    pub success: bool,
}

impl ChangeLogEntry {
    pub fn success(phase_label: &str, description: impl Into<String>) -> Self {
        Self {
            phase_label: phase_label.to_string(),
            description: description.into(),
            success: true,
        }
    }

    pub fn failure(phase_label: &str, description: impl Into<String>) -> Self {
        Self {
            phase_label: phase_label.to_string(),
            description: description.into(),
            success: false,
        }
    }
}

impl std::fmt::Display for ChangeLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.phase_label, self.description)
    }
}

/// Final snapshot of one pipeline run. Fields are fixed once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeobfuscationResult {
    deobfuscated_code: String,
    detected_type: String,
    change_log: Vec<ChangeLogEntry>,
    changes_made: usize,
    confidence: u8,
}

impl DeobfuscationResult {
    pub(crate) fn new(
        deobfuscated_code: String,
        detected_type: String,
        change_log: Vec<ChangeLogEntry>,
        changes_made: usize,
        confidence: u8,
    ) -> Self {
        Self {
            deobfuscated_code,
            detected_type,
            change_log,
            changes_made,
            confidence,
        }
    }

    pub fn deobfuscated_code(&self) -> &str {
        &self.deobfuscated_code
    }

    pub fn detected_type(&self) -> &str {
        &self.detected_type
    }

    pub fn change_log(&self) -> &[ChangeLogEntry] {
        &self.change_log
    }

    pub fn changes_made(&self) -> usize {
        self.changes_made
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    pub fn into_code(self) -> String {
        self.deobfuscated_code
    }

    pub fn failures(&self) -> impl Iterator<Item = &ChangeLogEntry> {
        self.change_log.iter().filter(|e| !e.success)
    }

    pub fn entries_for(&self, phase_label: &str) -> Vec<&ChangeLogEntry> {
        self.change_log.iter().filter(|e| e.phase_label == phase_label).collect()
    }

    /// Name for the file the caller writes the recovered code to.
    pub fn output_filename(filename_hint: Option<&str>, prefix: &str, default_name: &str) -> String {
        let base = filename_hint
            .map(|hint| hint.rsplit(['/', '\\']).next().unwrap_or(hint))
            .filter(|name| !name.is_empty())
            .unwrap_or(default_name);
        format!("{}{}", prefix, base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_filename() {
        assert_eq!(
            DeobfuscationResult::output_filename(Some("dir/hub.lua"), "deobfuscated_", "script.lua"),
            "deobfuscated_hub.lua"
        );
        assert_eq!(
            DeobfuscationResult::output_filename(None, "deobfuscated_", "script.lua"),
            "deobfuscated_script.lua"
        );
        assert_eq!(
            DeobfuscationResult::output_filename(Some("dir/"), "deobfuscated_", "script.lua"),
            "deobfuscated_script.lua"
        );
    }

    #[test]
    fn test_json_keys_are_camel_case() {
        let result = DeobfuscationResult::new(
            "print(1)".to_string(),
            "Unknown".to_string(),
            vec![ChangeLogEntry::failure("Cleanup", "nothing")],
            0,
            50,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["deobfuscatedCode"], "print(1)");
        assert_eq!(json["detectedType"], "Unknown");
        assert_eq!(json["changesMade"], 0);
        assert_eq!(json["changeLog"][0]["phaseLabel"], "Cleanup");
        assert_eq!(json["changeLog"][0]["success"], false);
    }
}
