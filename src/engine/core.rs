// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::engine::buffer::WorkingBuffer;
use crate::engine::phase::{PhaseContext, PhaseKind};
use crate::engine::pipeline::{create_default_pipeline, Pipeline};
use crate::engine::result::{ChangeLogEntry, DeobfuscationRequest, DeobfuscationResult};
use crate::signature::SignatureCatalog;
use crate::utils::logging::ScopedTimer;
use crate::validation::ConfidenceScorer;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The recovery engine. Stateless between calls; safe to share across threads.
pub struct Engine {
    config: Config,
    catalog: Arc<SignatureCatalog>,
    pipeline: Pipeline,
    scorer: ConfidenceScorer,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let pipeline = create_default_pipeline(&config);
        Self::with_pipeline(config, pipeline)
    }

    pub fn with_pipeline(config: Config, pipeline: Pipeline) -> Self {
        let scorer = ConfidenceScorer::from_config(&config.scoring);
        Self {
            config,
            catalog: SignatureCatalog::shared(),
            pipeline,
            scorer,
        }
    }

    pub fn deobfuscate(&self, request: &DeobfuscationRequest) -> DeobfuscationResult {
        let _timer = ScopedTimer::new("deobfuscate");
        let mut change_log = vec![ChangeLogEntry::success(
            PhaseKind::Initialization.label(),
            "Initializing deobfuscation engine",
        )];

        let detection = self.catalog.detect(&request.source_text);
        for found in &detection.matches {
            change_log.push(ChangeLogEntry::success(
                PhaseKind::Detection.label(),
                format!("Detected {}", found.family),
            ));
        }

        let ctx = PhaseContext::new(detection.family, &self.config)
            .with_filename_hint(request.filename_hint.as_deref());
        let run = self.pipeline.run(WorkingBuffer::new(request.source_text.clone()), &ctx);
        change_log.extend(run.entries);

        let confidence = self.scorer.score(&detection.matches, run.changes);
        change_log.push(ChangeLogEntry::success(
            PhaseKind::Report.label(),
            format!("Final confidence: {}%", confidence),
        ));

        log::info!(
            "Deobfuscated {} ({}): {} changes, confidence {}%",
            request.filename_hint.as_deref().unwrap_or("<input>"),
            detection.family,
            run.changes,
            confidence
        );

        DeobfuscationResult::new(
            run.buffer.into_string(),
            detection.family.name().to_string(),
            change_log,
            run.changes,
            confidence,
        )
    }

    /// Processes independent requests in parallel, preserving input order.
    pub fn deobfuscate_batch(&self, requests: &[DeobfuscationRequest]) -> Vec<DeobfuscationResult> {
        requests.par_iter().map(|r| self.deobfuscate(r)).collect()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &SignatureCatalog {
        &self.catalog
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Deobfuscation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Deobfuscation worker crashed: {0}")]
    WorkerCrashed(String),
    #[error("Deobfuscation worker exited without a result")]
    Disconnected,
    #[error("Failed to spawn deobfuscation worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Failed to build worker pool: {0}")]
    Pool(String),
}
