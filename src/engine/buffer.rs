// Fri Jan 16 2026 - Alex

use std::fmt;

/// Text threaded through the pipeline. Owned by exactly one phase at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingBuffer {
    text: String,
}

impl WorkingBuffer {
    pub fn new(text: String) -> Self {
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    /// Replaces the text, returning whether it actually differed.
    pub fn set(&mut self, text: String) -> bool {
        if text == self.text {
            return false;
        }
        self.text = text;
        true
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl From<&str> for WorkingBuffer {
    fn from(text: &str) -> Self {
        Self::new(text.to_string())
    }
}

impl From<String> for WorkingBuffer {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for WorkingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_reports_change() {
        let mut buffer = WorkingBuffer::from("a");
        assert!(!buffer.set("a".to_string()));
        assert!(buffer.set("b".to_string()));
        assert_eq!(buffer.as_str(), "b");
    }
}
