pub mod client;
pub mod orchestrator;
pub mod parser;
pub mod recorded;
pub mod retry;
pub mod schema;

pub use client::Transcriber;
pub use orchestrator::{ChunkOrchestrator, ChunkOutcome, ChunkStatus};
pub use parser::parse_fragment;
pub use recorded::RecordedTranscriber;
pub use retry::{retry_with_backoff, RetryOutcome};
pub use schema::ExtractionSchema;
