// Tue Jan 13 2026 - Alex

use crate::engine::result::DeobfuscationResult;
use serde_json::{to_string, to_string_pretty};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes result records with the camelCase keys callers consume.
pub struct JsonSerializer {
    pretty_print: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self { pretty_print: true }
    }

    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    pub fn serialize(&self, result: &DeobfuscationResult) -> Result<String, ReportError> {
        let json = if self.pretty_print {
            to_string_pretty(result)?
        } else {
            to_string(result)?
        };
        Ok(json)
    }

    pub fn serialize_to_file<P: AsRef<Path>>(&self, result: &DeobfuscationResult, path: P) -> Result<(), ReportError> {
        let json = self.serialize(result)?;
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        writer.write_all(json.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn deserialize(&self, json: &str) -> Result<DeobfuscationResult, ReportError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn deserialize_from_file<P: AsRef<Path>>(&self, path: P) -> Result<DeobfuscationResult, ReportError> {
        let mut contents = String::new();
        File::open(path.as_ref())?.read_to_string(&mut contents)?;
        self.deserialize(&contents)
    }
}

impl Default for JsonSerializer {
    fn default() -> Self {
        Self::new()
    }
}
