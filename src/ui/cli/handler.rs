// Wed Jan 15 2026 - Alex

use super::args::{Args, Command, DeobfuscateArgs, DetectArgs};
use crate::config::Config;
use crate::engine::{DeobfuscationRequest, DeobfuscationResult, EngineRunner};
use crate::output::{JsonSerializer, ReportFormat, ReportGenerator};
use crate::signature::SignatureCatalog;
use crate::ui::{print_banner, print_error, print_info, print_success, print_warning};
use crate::utils::{format_bytes, format_duration, measure_time, LoggingUtils};
use crate::validation::{ConfidenceLevel, InputValidator};
use anyhow::Context;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

struct PreparedInput {
    path: PathBuf,
    request: DeobfuscationRequest,
}

pub struct CommandHandler {
    quiet: bool,
}

impl CommandHandler {
    pub fn new() -> Self {
        Self { quiet: false }
    }

    pub fn execute(mut self, args: Args) -> anyhow::Result<()> {
        self.quiet = args.quiet;
        if args.no_color {
            colored::control::set_override(false);
        }
        LoggingUtils::init_logger(LoggingUtils::level_from_str(&args.log_level));

        if !self.quiet {
            print_banner();
        }

        match args.command {
            Command::Deobfuscate(deobf_args) => self.handle_deobfuscate(deobf_args),
            Command::Detect(detect_args) => self.handle_detect(detect_args),
            Command::Signatures => self.handle_signatures(),
        }
    }

    fn load_config(&self, args: &DeobfuscateArgs) -> anyhow::Result<Config> {
        let mut config = match &args.config {
            Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(timeout) = args.timeout {
            config = config.with_timeout_seconds(timeout);
        }
        if let Some(threads) = args.threads {
            config = config.with_worker_threads(threads);
        }
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }

    fn read_source(path: &Path) -> anyhow::Result<String> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn prepare_inputs(&self, files: &[PathBuf], validator: &InputValidator) -> (Vec<PreparedInput>, usize) {
        let mut prepared = Vec::new();
        let mut rejected = 0;

        for path in files {
            let source = match Self::read_source(path) {
                Ok(source) => source,
                Err(e) => {
                    print_error(&format!("{:#}", e));
                    rejected += 1;
                    continue;
                }
            };
            if let Err(e) = validator.validate(&source) {
                print_error(&format!("{}: {}", path.display(), e));
                rejected += 1;
                continue;
            }

            let mut request = DeobfuscationRequest::new(source);
            if let Some(name) = path.file_name() {
                request = request.with_filename(name.to_string_lossy());
            }
            prepared.push(PreparedInput {
                path: path.clone(),
                request,
            });
        }
        (prepared, rejected)
    }

    fn create_spinner(&self, count: usize) -> Option<ProgressBar> {
        if self.quiet {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Deobfuscating {} file(s)...", count));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }

    fn handle_deobfuscate(&self, args: DeobfuscateArgs) -> anyhow::Result<()> {
        args.validate().map_err(|e| anyhow::anyhow!(e))?;
        let config = self.load_config(&args)?;
        let validator = InputValidator::from_config(&config);

        let (inputs, mut failed) = self.prepare_inputs(&args.files, &validator);
        let total = args.files.len();

        let runner = EngineRunner::new(config.clone());
        let spinner = self.create_spinner(inputs.len());
        let (paths, requests): (Vec<PathBuf>, Vec<DeobfuscationRequest>) =
            inputs.into_iter().map(|i| (i.path, i.request)).unzip();
        let (outcomes, elapsed) = measure_time(|| runner.run_batch(requests));
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        for (path, outcome) in paths.iter().zip(outcomes) {
            match outcome {
                Ok(result) => {
                    if let Err(e) = self.emit_result(&args, &config, path, &result, elapsed) {
                        print_error(&format!("{}: {:#}", path.display(), e));
                        failed += 1;
                    }
                }
                Err(e) => {
                    print_error(&format!("{}: {}", path.display(), e));
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            anyhow::bail!("{} of {} file(s) could not be processed", failed, total);
        }
        Ok(())
    }

    fn emit_result(
        &self,
        args: &DeobfuscateArgs,
        config: &Config,
        input: &Path,
        result: &DeobfuscationResult,
        elapsed: Duration,
    ) -> anyhow::Result<()> {
        if args.stdout {
            println!("{}", result.deobfuscated_code());
            return Ok(());
        }

        let hint = input.file_name().map(|n| n.to_string_lossy().into_owned());
        let file_name = DeobfuscationResult::output_filename(hint.as_deref(), &config.output_prefix, &config.default_filename);
        let dir = match &args.output_dir {
            Some(dir) => {
                fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
                dir.clone()
            }
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let out_path = dir.join(&file_name);
        fs::write(&out_path, result.deobfuscated_code()).with_context(|| format!("writing {}", out_path.display()))?;

        if args.json {
            let json_path = dir.join(format!("{}.json", file_name));
            JsonSerializer::new().serialize_to_file(result, &json_path)?;
        }
        if args.markdown {
            let md_path = dir.join(format!("{}.md", file_name));
            ReportGenerator::new(ReportFormat::Markdown)
                .with_max_entries(config.summary_entries)
                .generate_to_file(result, elapsed, &md_path)
                .with_context(|| format!("writing {}", md_path.display()))?;
        }

        if !self.quiet {
            self.print_summary(result, &out_path, config.summary_entries, elapsed);
        }
        Ok(())
    }

    fn print_summary(&self, result: &DeobfuscationResult, out_path: &Path, max_entries: usize, elapsed: Duration) {
        let confidence = format!("{}%", result.confidence());
        let confidence = match ConfidenceLevel::from_score(result.confidence()) {
            ConfidenceLevel::High => confidence.green(),
            ConfidenceLevel::Medium => confidence.yellow(),
            ConfidenceLevel::Low => confidence.red(),
        };
        print_success(&format!(
            "{} -> {} ({}, confidence {}, {})",
            result.detected_type().cyan(),
            out_path.display(),
            format_bytes(result.deobfuscated_code().len() as u64),
            confidence,
            format_duration(elapsed)
        ));

        let report = ReportGenerator::new(ReportFormat::Text)
            .with_header(false)
            .with_max_entries(max_entries)
            .generate(result, elapsed);
        println!("{}", report);
    }

    fn handle_detect(&self, args: DetectArgs) -> anyhow::Result<()> {
        args.validate().map_err(|e| anyhow::anyhow!(e))?;
        let catalog = SignatureCatalog::global();

        for path in &args.files {
            let source = Self::read_source(path)?;
            let detection = catalog.detect(&source);
            if detection.is_detected() {
                print_success(&format!("{}: {}", path.display(), detection.family.to_string().cyan()));
                for found in &detection.matches {
                    println!("    {} ({})", found.id, found.family);
                }
            } else {
                print_warning(&format!("{}: no known obfuscator signature", path.display()));
            }
        }
        Ok(())
    }

    fn handle_signatures(&self) -> anyhow::Result<()> {
        let catalog = SignatureCatalog::global();
        print_info(&format!("{} signatures, {} families", catalog.len(), catalog.families().len()));
        for sig in catalog.signatures() {
            println!("  {:<22} {:<16} {}", sig.id().cyan(), sig.family().name(), sig.pattern());
        }
        Ok(())
    }
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lua_deobfuscator_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_deobfuscate_writes_prefixed_file() {
        let dir = scratch_dir("cli");
        let input = dir.join("hub.lua");
        fs::write(&input, "print(string.char(72,105))").unwrap();

        let args = DeobfuscateArgs {
            files: vec![input],
            output_dir: Some(dir.join("out")),
            json: true,
            markdown: true,
            stdout: false,
            timeout: Some(10),
            threads: Some(1),
            config: None,
        };
        let handler = CommandHandler { quiet: true };
        handler.handle_deobfuscate(args).unwrap();

        let out = dir.join("out");
        assert_eq!(fs::read_to_string(out.join("deobfuscated_hub.lua")).unwrap(), "print(\"Hi\")");
        assert!(out.join("deobfuscated_hub.lua.json").is_file());
        assert!(out.join("deobfuscated_hub.lua.md").is_file());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rejected_input_is_an_error() {
        let dir = scratch_dir("cli_reject");
        let input = dir.join("tiny.lua");
        fs::write(&input, "x=1").unwrap();

        let args = DeobfuscateArgs {
            files: vec![input],
            output_dir: None,
            json: false,
            markdown: false,
            stdout: false,
            timeout: None,
            threads: None,
            config: None,
        };
        assert!(CommandHandler { quiet: true }.handle_deobfuscate(args).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
