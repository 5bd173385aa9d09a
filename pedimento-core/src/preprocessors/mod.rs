//! Document Preprocessors
//!
//! Turns a source document into the ordered page texts the extraction
//! pipeline works on.
//!
//! ```text
//! Document (pdftotext output, ...)
//!     ↓
//! [Format-specific Preprocessor]
//!     ↓
//! Vec<String> (one entry per page)
//!     ↓
//! [DocumentProcessor]
//!     ↓
//! ExtractionReport
//! ```
//!
//! ## Available Preprocessors
//!
//! - `PlainTextPreprocessor` - page text with form-feed page breaks

pub mod text;
pub mod traits;

pub use text::PlainTextPreprocessor;
pub use traits::Preprocessor;
