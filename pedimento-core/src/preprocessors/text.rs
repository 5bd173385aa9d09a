use super::traits::Preprocessor;
use anyhow::{anyhow, Result};
use std::path::Path;

const FORM_FEED: char = '\u{c}';

/// Reads text-layer output (as written by `pdftotext`) where pages are
/// separated by form feeds.
#[derive(Debug, Default, Clone)]
pub struct PlainTextPreprocessor;

impl PlainTextPreprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn split_pages(text: &str) -> Vec<String> {
        let normalized = text.replace("\r\n", "\n");
        let mut pages: Vec<String> = normalized.split(FORM_FEED).map(str::to_string).collect();
        // pdftotext terminates the last page with a form feed too
        while pages.last().is_some_and(|p| p.trim().is_empty()) {
            pages.pop();
        }
        pages
    }
}

impl Preprocessor for PlainTextPreprocessor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| anyhow!("Source text is not valid UTF-8: {}", e))?;
        Ok(Self::split_pages(text))
    }

    fn name(&self) -> &str {
        "plain-text"
    }

    fn supports_file_type(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_form_feed_and_drops_trailing_page() {
        let pages = PlainTextPreprocessor::split_pages("one\r\n\u{c}two\n\u{c}\n");
        assert_eq!(pages, vec!["one\n".to_string(), "two\n".to_string()]);
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert!(PlainTextPreprocessor::new()
            .extract_pages(&[0xff, 0xfe, 0x00])
            .is_err());
    }

    #[test]
    fn supports_txt_only() {
        let preprocessor = PlainTextPreprocessor::new();
        assert!(preprocessor.supports_file_type(Path::new("pedimento.TXT")));
        assert!(!preprocessor.supports_file_type(Path::new("pedimento.pdf")));
    }
}
