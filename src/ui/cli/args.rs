// Wed Jan 15 2026 - Alex

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lua-deobfuscator")]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Recovers readable Lua from obfuscator output", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true, default_value = "warn")]
    pub log_level: String,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the recovery pipeline over one or more files
    Deobfuscate(DeobfuscateArgs),
    /// Report which obfuscator each file appears to come from
    Detect(DetectArgs),
    /// List the signature catalog
    Signatures,
}

#[derive(Parser, Debug)]
pub struct DeobfuscateArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Directory for recovered files (defaults to each input's directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Write a JSON result record next to each output
    #[arg(long)]
    pub json: bool,

    /// Write a Markdown report next to each output
    #[arg(long)]
    pub markdown: bool,

    /// Print recovered code to stdout instead of writing files
    #[arg(long)]
    pub stdout: bool,

    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(long)]
    pub threads: Option<usize>,

    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl DeobfuscateArgs {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(missing) = self.files.iter().find(|f| !f.is_file()) {
            return Err(format!("Input file does not exist: {}", missing.display()));
        }
        if let Some(dir) = &self.output_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(format!("Output path is not a directory: {}", dir.display()));
            }
        }
        if self.timeout == Some(0) {
            return Err("Timeout must be at least one second".to_string());
        }
        if self.threads == Some(0) {
            return Err("Thread count must be at least 1".to_string());
        }
        if self.stdout && (self.json || self.markdown) {
            return Err("--stdout cannot be combined with --json or --markdown".to_string());
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct DetectArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl DetectArgs {
    pub fn validate(&self) -> Result<(), String> {
        match self.files.iter().find(|f| !f.is_file()) {
            Some(missing) => Err(format!("Input file does not exist: {}", missing.display())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deobfuscate() {
        let args = Args::try_parse_from([
            "lua-deobfuscator",
            "--log-level",
            "debug",
            "deobfuscate",
            "a.lua",
            "b.lua",
            "-o",
            "out",
            "--json",
            "--threads",
            "2",
        ])
        .unwrap();
        assert_eq!(args.log_level, "debug");
        match args.command {
            Command::Deobfuscate(d) => {
                assert_eq!(d.files.len(), 2);
                assert_eq!(d.output_dir, Some(PathBuf::from("out")));
                assert!(d.json);
                assert_eq!(d.threads, Some(2));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_deobfuscate_requires_files() {
        assert!(Args::try_parse_from(["lua-deobfuscator", "deobfuscate"]).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_file() {
        let args = DeobfuscateArgs {
            files: vec![PathBuf::from("definitely/not/here.lua")],
            output_dir: None,
            json: false,
            markdown: false,
            stdout: false,
            timeout: None,
            threads: None,
            config: None,
        };
        assert!(args.validate().is_err());
    }
}
