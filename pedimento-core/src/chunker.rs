use serde::{Deserialize, Serialize};

/// A contiguous range of pages handed to the transcription service as one unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageChunk {
    /// Position in the document; merge sort key
    pub index: usize,
    /// First page, 0-indexed
    pub start_page: usize,
    /// One past the last page
    pub end_page: usize,
    /// The chunk's pages joined with the page separator
    pub payload: String,
}

impl PageChunk {
    pub fn page_count(&self) -> usize {
        self.end_page - self.start_page
    }

    /// Human-facing 1-indexed range, e.g. `3-4`
    pub fn page_label(&self) -> String {
        if self.page_count() <= 1 {
            format!("{}", self.start_page + 1)
        } else {
            format!("{}-{}", self.start_page + 1, self.end_page)
        }
    }
}

/// Split pages into chunks of `pages_per_chunk` whole pages.
///
/// The last chunk may be shorter. A chunk size of zero is treated as one.
pub fn chunk_pages(pages: &[String], pages_per_chunk: usize, separator: &str) -> Vec<PageChunk> {
    let size = pages_per_chunk.max(1);
    pages
        .chunks(size)
        .enumerate()
        .map(|(index, group)| {
            let start_page = index * size;
            PageChunk {
                index,
                start_page,
                end_page: start_page + group.len(),
                payload: group.join(separator),
            }
        })
        .collect()
}

/// Full document text with a stable page separator.
pub fn join_pages(pages: &[String], separator: &str) -> String {
    pages.join(separator)
}
