use crate::chunker::{chunk_pages, join_pages};
use crate::classifier::DocumentClassifier;
use crate::config::{ExtractionStrategy, PipelineConfig};
use crate::error::PipelineError;
use crate::extraction::FieldExtractor;
use crate::mapper::map_record;
use crate::merge::{fill_gaps, merge_fragments};
use crate::preprocessors::{PlainTextPreprocessor, Preprocessor};
use crate::raw::RawFragment;
use crate::report::ExtractionReport;
use crate::rules::RuleEngine;
use crate::transcription::{ChunkOrchestrator, ChunkOutcome, ChunkStatus, Transcriber};
use crate::types::ChunkGap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Simple profiler that collects timings for pipeline steps
pub struct StepProfiler {
    enabled: bool,
    timings: Vec<(String, Duration)>,
}

impl StepProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    pub fn time_step<F, R>(&mut self, step_name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if !self.enabled {
            return f();
        }

        let start = Instant::now();
        let result = f();
        self.record(step_name, start.elapsed());
        result
    }

    /// Record a step timed by the caller (async steps cannot go through `time_step`).
    pub fn record(&mut self, step_name: &str, elapsed: Duration) {
        if !self.enabled {
            return;
        }
        info!(step = step_name, elapsed_ms = elapsed.as_millis() as u64, "step finished");
        self.timings.push((step_name.to_string(), elapsed));
    }

    pub fn timings(&self) -> &[(String, Duration)] {
        &self.timings
    }

    pub fn log_summary(&self) {
        if !self.enabled || self.timings.is_empty() {
            return;
        }

        let total: Duration = self.timings.iter().map(|(_, d)| *d).sum();
        for (step, duration) in &self.timings {
            let percentage = if total.is_zero() {
                0.0
            } else {
                duration.as_secs_f64() / total.as_secs_f64() * 100.0
            };
            info!(
                step = step.as_str(),
                elapsed_ms = duration.as_millis() as u64,
                share_pct = (percentage * 10.0).round() / 10.0,
                "profile"
            );
        }
        info!(total_ms = total.as_millis() as u64, "profile total");
    }
}

pub struct DocumentProcessor {
    preprocessor: Box<dyn Preprocessor>,
    transcriber: Option<Arc<dyn Transcriber>>,
    config: PipelineConfig,
    extractor: FieldExtractor,
    classifier: DocumentClassifier,
    rule_engine: RuleEngine,
    profiling: bool,
}

impl DocumentProcessor {
    /// Processor for form-feed separated page text.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        Self::new_with_dependencies(Box::new(PlainTextPreprocessor::new()), config)
    }

    /// Create DocumentProcessor with full dependency injection
    pub fn new_with_dependencies(
        preprocessor: Box<dyn Preprocessor>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        Ok(Self {
            preprocessor,
            transcriber: None,
            extractor: FieldExtractor::new(&config.extraction)?,
            classifier: DocumentClassifier::new(&config.validation.policy),
            rule_engine: RuleEngine::new(config.validation.clone()),
            config,
            profiling: false,
        })
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiling = enabled;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// For registering additional compliance rules.
    pub fn rule_engine_mut(&mut self) -> &mut RuleEngine {
        &mut self.rule_engine
    }

    /// Read a document through the preprocessor and run the pipeline on its pages.
    pub async fn process_document(
        &self,
        input_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExtractionReport, PipelineError> {
        if !input_path.exists() {
            return Err(PipelineError::Source(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", input_path.display()),
            )));
        }
        if !self.preprocessor.supports_file_type(input_path) {
            warn!(
                path = %input_path.display(),
                preprocessor = self.preprocessor.name(),
                "file type not recognized, reading anyway"
            );
        }

        let pages = self
            .preprocessor
            .process_file(input_path)
            .map_err(|e| PipelineError::Preprocess(format!("{e:#}")))?;
        info!(path = %input_path.display(), pages = pages.len(), "document loaded");
        self.process_pages(&pages, cancel).await
    }

    /// Extract, normalize, classify and validate one document's pages.
    pub async fn process_pages(
        &self,
        pages: &[String],
        cancel: &CancellationToken,
    ) -> Result<ExtractionReport, PipelineError> {
        let strategy = self.config.strategy;
        if strategy.needs_transcriber() && self.transcriber.is_none() {
            return Err(PipelineError::MissingTranscriber(strategy.as_str()));
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let mut profiler = StepProfiler::new(self.profiling);
        let full_text = join_pages(pages, &self.config.chunking.page_separator);
        info!(strategy = strategy.as_str(), pages = pages.len(), "processing pedimento");

        let (mut raw, outcomes) = match strategy {
            ExtractionStrategy::Deterministic => {
                let raw = profiler.time_step("Deterministic extraction", || {
                    self.extractor.extract(&full_text)
                });
                (raw, Vec::new())
            }
            ExtractionStrategy::Transcription => {
                self.transcribe(pages, cancel, &mut profiler).await?
            }
            ExtractionStrategy::Hybrid => {
                let (transcribed, outcomes) = self.transcribe(pages, cancel, &mut profiler).await?;
                let deterministic = profiler.time_step("Deterministic extraction", || {
                    self.extractor.extract(&full_text)
                });
                (fill_gaps(transcribed, &deterministic), outcomes)
            }
        };
        raw.raw_text.get_or_insert_with(|| full_text.clone());

        let mut record = profiler.time_step("Mapping", || map_record(&raw));
        record.kind = self.classifier.classify(&record);
        record.unreadable_chunks = unreadable(&outcomes);

        profiler.time_step("Compliance rules", || self.rule_engine.validate(&mut record));
        profiler.log_summary();

        info!(
            items = record.items.len(),
            findings = record.findings.len(),
            unreadable_chunks = record.unreadable_chunks.len(),
            "pedimento processed"
        );
        ExtractionReport::new(&self.config, &full_text, outcomes, record)
            .map_err(|e| PipelineError::Config(e.to_string()))
    }

    async fn transcribe(
        &self,
        pages: &[String],
        cancel: &CancellationToken,
        profiler: &mut StepProfiler,
    ) -> Result<(RawFragment, Vec<ChunkOutcome>), PipelineError> {
        let transcriber = self
            .transcriber
            .clone()
            .ok_or(PipelineError::MissingTranscriber(self.config.strategy.as_str()))?;

        let chunks = profiler.time_step("Chunking", || {
            chunk_pages(
                pages,
                self.config.chunking.pages_per_chunk,
                &self.config.chunking.page_separator,
            )
        });

        let start = Instant::now();
        let outcomes = ChunkOrchestrator::new(transcriber, &self.config.transcription)
            .run_until_cancelled(&chunks, cancel)
            .await?;
        profiler.record("Transcription", start.elapsed());

        let merged = profiler.time_step("Merge", || merge_fragments(&outcomes));
        Ok((merged, outcomes))
    }
}

fn unreadable(outcomes: &[ChunkOutcome]) -> Vec<ChunkGap> {
    outcomes
        .iter()
        .filter_map(|outcome| match &outcome.status {
            ChunkStatus::Failed { reason } => Some(ChunkGap {
                chunk: outcome.index,
                start_page: outcome.start_page,
                end_page: outcome.end_page,
                reason: reason.clone(),
            }),
            _ => None,
        })
        .collect()
}
