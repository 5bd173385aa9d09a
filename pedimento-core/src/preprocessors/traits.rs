// Boundary between reading a document and extracting a pedimento from it.
// Everything after a preprocessor works on page text only.

use anyhow::Result;
use std::path::Path;

/// Preprocessor trait - converts documents to ordered page texts
pub trait Preprocessor: Send + Sync {
    /// Decode document bytes into page texts, first page first.
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>>;

    /// Convenience method: Process from file path
    fn process_file(&self, input: &Path) -> Result<Vec<String>> {
        let bytes = std::fs::read(input)?;
        self.extract_pages(&bytes)
    }

    /// Get preprocessor name for debugging/logging
    fn name(&self) -> &str;

    /// Check if preprocessor supports the given file type
    fn supports_file_type(&self, path: &Path) -> bool;
}
