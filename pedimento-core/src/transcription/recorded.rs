use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::client::Transcriber;
use super::schema::ExtractionSchema;
use crate::chunker::PageChunk;
use crate::error::TranscriptionError;

/// Replays previously captured responses from `chunk_000.json`, `chunk_001.json`, ...
///
/// Lets the transcription path run offline and reproducibly. A missing
/// file is reported as a failed chunk.
pub struct RecordedTranscriber {
    dir: PathBuf,
}

impl RecordedTranscriber {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn response_path(&self, chunk_index: usize) -> PathBuf {
        self.dir.join(format!("chunk_{chunk_index:03}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Transcriber for RecordedTranscriber {
    async fn transcribe(
        &self,
        chunk: &PageChunk,
        _schema: &ExtractionSchema,
    ) -> Result<String, TranscriptionError> {
        let path = self.response_path(chunk.index);
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            TranscriptionError::Failed(format!("no recorded response at {}: {e}", path.display()))
        })
    }

    fn name(&self) -> &str {
        "recorded"
    }
}
