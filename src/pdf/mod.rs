//! PDF extraction backends
//!
//! The cache only needs page text and embedded images from a document. Any
//! backend implementing [`PdfExtractor`] can feed the orchestrator; the MuPDF
//! one is compiled in with the `pdf` feature.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ExtractError;

#[cfg(feature = "pdf")]
mod mupdf_extractor;

#[cfg(feature = "pdf")]
pub use mupdf_extractor::MupdfExtractor;

/// Zoom applied when rasterising image blocks (1.0 = 72 dpi)
pub const DEFAULT_IMAGE_SCALE: f32 = 2.0;

/// Document metadata as reported by the backend (title, author, ...)
pub type Metadata = BTreeMap<String, String>;

/// Text and images of a single page
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageContent {
    pub text: String,
    /// Encoded image blobs in the order the backend reported them
    pub images: Vec<Vec<u8>>,
}

/// A line of page text matching a search query
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    /// 1-based page number
    pub page: usize,
    pub text: String,
}

/// A stateful PDF reader: open one document, then query it by page.
pub trait PdfExtractor {
    /// Open `path`, closing any previously open document first
    fn open(&mut self, path: &Path) -> Result<(), ExtractError>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Number of pages, 0 when nothing is open
    fn page_count(&self) -> usize;

    /// Text and images of the page at 0-based `index`
    fn page(&mut self, index: usize) -> Result<PageContent, ExtractError>;

    fn metadata(&self) -> Metadata;

    /// Lines containing `query`, compared case-insensitively, in page order
    fn search_text(&mut self, query: &str) -> Result<Vec<SearchHit>, ExtractError> {
        if !self.is_open() {
            return Err(ExtractError::NotOpen);
        }

        let needle = query.to_lowercase();
        if needle.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        for index in 0..self.page_count() {
            let page = self.page(index)?;
            hits.extend(
                page.text
                    .lines()
                    .filter(|line| line.to_lowercase().contains(&needle))
                    .map(|line| SearchHit {
                        page: index + 1,
                        text: line.trim().to_string(),
                    }),
            );
        }
        Ok(hits)
    }
}
