//! Transcriber trait for the structured transcription collaborator.
//!
//! The network client lives outside this crate. Implementations receive one
//! page chunk and the schema contract, and return the collaborator's raw
//! text response. Parsing happens on our side.

use async_trait::async_trait;

use super::schema::ExtractionSchema;
use crate::chunker::PageChunk;
use crate::error::TranscriptionError;

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one chunk into text expected to contain a JSON fragment.
    ///
    /// Return `TranscriptionError::RateLimited` when the service throttles;
    /// it is the only error the orchestrator retries.
    async fn transcribe(
        &self,
        chunk: &PageChunk,
        schema: &ExtractionSchema,
    ) -> Result<String, TranscriptionError>;

    /// Name for logs and reports
    fn name(&self) -> &str;
}
