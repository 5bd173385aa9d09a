// Pedimento Core Library
//
// Extracts Mexican customs declarations (pedimentos) from page text, either
// with pattern tables or through a chunked transcription service, maps them
// into a typed record and runs compliance checks over it.

pub mod chunker;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extraction;
pub mod mapper;
pub mod merge;
pub mod normalize;
pub mod preprocessors;
pub mod processor;
pub mod raw;
pub mod report;
pub mod rules;
pub mod transcription;
pub mod types;

// Re-export main types and functions for easy use
pub use config::{ExtractionStrategy, PipelineConfig};
pub use error::{PipelineError, TranscriptionError};
pub use preprocessors::{PlainTextPreprocessor, Preprocessor};
pub use processor::DocumentProcessor;
pub use report::ExtractionReport;
pub use rules::{ComplianceRule, RuleEngine};
pub use transcription::{RecordedTranscriber, Transcriber};
pub use types::*;
