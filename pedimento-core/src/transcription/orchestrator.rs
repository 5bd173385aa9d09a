use super::client::Transcriber;
use super::parser::parse_fragment;
use super::retry::retry_with_backoff;
use super::schema::ExtractionSchema;
use crate::chunker::PageChunk;
use crate::config::{RetryPolicy, TranscriptionConfig};
use crate::error::PipelineError;
use crate::raw::RawFragment;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkStatus {
    /// Fragment parsed and carried data
    Parsed,
    /// Fragment parsed but was empty
    Empty,
    /// No usable fragment; the chunk contributes nothing
    Failed { reason: String },
}

/// What one chunk produced. Failures are data, not errors.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkOutcome {
    pub index: usize,
    pub start_page: usize,
    pub end_page: usize,
    pub attempts: u32,
    pub status: ChunkStatus,
    #[serde(skip)]
    pub fragment: Option<RawFragment>,
}

impl ChunkOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, ChunkStatus::Failed { .. })
    }
}

/// Fans chunks out to the transcriber with bounded concurrency.
pub struct ChunkOrchestrator {
    transcriber: Arc<dyn Transcriber>,
    schema: ExtractionSchema,
    retry: RetryPolicy,
    max_concurrency: usize,
}

impl ChunkOrchestrator {
    pub fn new(transcriber: Arc<dyn Transcriber>, config: &TranscriptionConfig) -> Self {
        Self {
            transcriber,
            schema: ExtractionSchema::pedimento(),
            retry: config.retry.clone(),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    pub fn with_schema(mut self, schema: ExtractionSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Transcribe every chunk. Outcomes come back in chunk order no matter
    /// which call finishes first.
    pub async fn run(&self, chunks: &[PageChunk]) -> Vec<ChunkOutcome> {
        info!(
            transcriber = self.transcriber.name(),
            chunks = chunks.len(),
            max_concurrency = self.max_concurrency,
            "starting chunk transcription"
        );

        let mut slots: Vec<Option<ChunkOutcome>> = (0..chunks.len()).map(|_| None).collect();
        let mut completions = stream::iter(chunks.iter().enumerate())
            .map(|(slot, chunk)| async move { (slot, self.transcribe_chunk(chunk).await) })
            .buffer_unordered(self.max_concurrency);

        while let Some((slot, outcome)) = completions.next().await {
            slots[slot] = Some(outcome);
        }

        let mut outcomes: Vec<ChunkOutcome> = slots.into_iter().flatten().collect();
        outcomes.sort_by_key(|o| o.index);

        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        info!(chunks = outcomes.len(), failed, "chunk transcription finished");
        outcomes
    }

    /// Like [`run`](Self::run), but abandons in-flight calls when `cancel` fires.
    pub async fn run_until_cancelled(
        &self,
        chunks: &[PageChunk],
        cancel: &CancellationToken,
    ) -> Result<Vec<ChunkOutcome>, PipelineError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("chunk transcription cancelled");
                Err(PipelineError::Cancelled)
            }
            outcomes = self.run(chunks) => Ok(outcomes),
        }
    }

    async fn transcribe_chunk(&self, chunk: &PageChunk) -> ChunkOutcome {
        let label = format!("chunk {}", chunk.index);
        let retried = retry_with_backoff(&self.retry, &label, || {
            self.transcriber.transcribe(chunk, &self.schema)
        })
        .await;

        let (status, fragment) = match retried.result {
            Ok(response) => match parse_fragment(&response) {
                Ok(fragment) if fragment.is_empty() => (ChunkStatus::Empty, Some(fragment)),
                Ok(fragment) => (ChunkStatus::Parsed, Some(fragment)),
                Err(e) => {
                    warn!(chunk = chunk.index, error = %e, "unparseable chunk response");
                    (ChunkStatus::Failed { reason: e.to_string() }, None)
                }
            },
            Err(e) => {
                warn!(
                    chunk = chunk.index,
                    attempts = retried.attempts,
                    error = %e,
                    "chunk transcription failed"
                );
                (ChunkStatus::Failed { reason: e.to_string() }, None)
            }
        };

        debug!(chunk = chunk.index, attempts = retried.attempts, ?status, "chunk done");
        ChunkOutcome {
            index: chunk.index,
            start_page: chunk.start_page,
            end_page: chunk.end_page,
            attempts: retried.attempts,
            status,
            fragment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk_pages;
    use crate::error::TranscriptionError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers with the chunk index as the item sequence, slower for early chunks.
    struct EchoTranscriber {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Transcriber for EchoTranscriber {
        async fn transcribe(
            &self,
            chunk: &PageChunk,
            _schema: &ExtractionSchema,
        ) -> Result<String, TranscriptionError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20 - 4 * chunk.index as u64)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if chunk.index == 2 {
                return Err(TranscriptionError::Failed("service error".into()));
            }
            Ok(format!("{{\"partidas\": [{{\"secuencia\": {}}}]}}", chunk.index + 1))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn config(max_concurrency: usize) -> TranscriptionConfig {
        TranscriptionConfig {
            max_concurrency,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 2,
                jitter_ratio: 0.0,
            },
        }
    }

    fn pages(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("page {i}")).collect()
    }

    #[tokio::test]
    async fn outcomes_follow_chunk_order_and_concurrency_is_capped() {
        let transcriber = Arc::new(EchoTranscriber {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let orchestrator = ChunkOrchestrator::new(transcriber.clone(), &config(2));
        let chunks = chunk_pages(&pages(4), 1, "\n");

        let outcomes = orchestrator.run(&chunks).await;

        let indices: Vec<usize> = outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(transcriber.peak.load(Ordering::SeqCst) <= 2);

        assert_eq!(outcomes[0].status, ChunkStatus::Parsed);
        assert!(outcomes[2].is_failed(), "non rate-limit failure isolates the chunk");
        assert!(outcomes[2].fragment.is_none());
        assert_eq!(outcomes[2].attempts, 1);
        assert_eq!(outcomes[3].status, ChunkStatus::Parsed);
    }

    struct NeverAnswers;

    #[async_trait]
    impl Transcriber for NeverAnswers {
        async fn transcribe(
            &self,
            _chunk: &PageChunk,
            _schema: &ExtractionSchema,
        ) -> Result<String, TranscriptionError> {
            futures::future::pending::<()>().await;
            Err(TranscriptionError::Failed("unreachable".into()))
        }

        fn name(&self) -> &str {
            "never"
        }
    }

    #[tokio::test]
    async fn cancellation_abandons_in_flight_calls() {
        let orchestrator = ChunkOrchestrator::new(Arc::new(NeverAnswers), &config(4));
        let chunks = chunk_pages(&pages(3), 1, "\n");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = orchestrator.run_until_cancelled(&chunks, &cancel).await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[tokio::test]
    async fn empty_response_object_is_marked_empty() {
        struct Blank;

        #[async_trait]
        impl Transcriber for Blank {
            async fn transcribe(
                &self,
                _chunk: &PageChunk,
                _schema: &ExtractionSchema,
            ) -> Result<String, TranscriptionError> {
                Ok("{}".to_string())
            }

            fn name(&self) -> &str {
                "blank"
            }
        }

        let orchestrator = ChunkOrchestrator::new(Arc::new(Blank), &config(1));
        let outcomes = orchestrator.run(&chunk_pages(&pages(1), 1, "\n")).await;
        assert_eq!(outcomes[0].status, ChunkStatus::Empty);
        assert!(outcomes[0].fragment.is_some());
    }
}
