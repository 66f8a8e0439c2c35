//! In-memory extractor for exercising the cache without a PDF backend

use std::path::{Path, PathBuf};

use crate::error::ExtractError;
use crate::pdf::{Metadata, PageContent, PdfExtractor};

/// Contents served by a [`FakeExtractor`]. `None` pages fail to extract.
#[derive(Clone, Debug, Default)]
pub struct FakeDocument {
    pages: Vec<Option<PageContent>>,
    metadata: Metadata,
    unopenable: bool,
    refused: Vec<PathBuf>,
}

impl FakeDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, text: &str, images: Vec<Vec<u8>>) -> Self {
        self.pages.push(Some(PageContent {
            text: text.to_string(),
            images,
        }));
        self
    }

    /// Add a page whose extraction always fails
    pub fn with_broken_page(mut self) -> Self {
        self.pages.push(None);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Make every `open` call fail
    pub fn unopenable(mut self) -> Self {
        self.unopenable = true;
        self
    }

    /// Make `open` fail for `path` only
    pub fn refusing(mut self, path: impl Into<PathBuf>) -> Self {
        self.refused.push(path.into());
        self
    }
}

/// Serves the same [`FakeDocument`] for whatever path is opened and counts
/// how often it is asked for pages.
#[derive(Debug)]
pub struct FakeExtractor {
    doc: FakeDocument,
    opened: Option<PathBuf>,
    open_calls: usize,
    pages_read: usize,
}

impl FakeExtractor {
    pub fn new(doc: FakeDocument) -> Self {
        Self {
            doc,
            opened: None,
            open_calls: 0,
            pages_read: 0,
        }
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls
    }

    /// Number of `page` calls answered while a document was open
    pub fn pages_read(&self) -> usize {
        self.pages_read
    }
}

impl PdfExtractor for FakeExtractor {
    fn open(&mut self, path: &Path) -> Result<(), ExtractError> {
        self.close();
        self.open_calls += 1;
        if self.doc.unopenable || self.doc.refused.iter().any(|refused| refused == path) {
            return Err(ExtractError::open(path, "fake document refuses to open"));
        }
        self.opened = Some(path.to_path_buf());
        Ok(())
    }

    fn close(&mut self) {
        self.opened = None;
    }

    fn is_open(&self) -> bool {
        self.opened.is_some()
    }

    fn page_count(&self) -> usize {
        if self.is_open() { self.doc.pages.len() } else { 0 }
    }

    fn page(&mut self, index: usize) -> Result<PageContent, ExtractError> {
        if !self.is_open() {
            return Err(ExtractError::NotOpen);
        }
        self.pages_read += 1;
        match self.doc.pages.get(index) {
            Some(Some(page)) => Ok(page.clone()),
            Some(None) => Err(ExtractError::page(index, "fake page is broken")),
            None => Err(ExtractError::page(index, "out of range")),
        }
    }

    fn metadata(&self) -> Metadata {
        if self.is_open() {
            self.doc.metadata.clone()
        } else {
            Metadata::new()
        }
    }
}
