//! Cache-or-extract decision for opened documents
//!
//! ```text
//! path ──▶ fingerprint ──▶ CacheStore::exists ──yes──▶ CacheStore::read ─┐
//!                               │                          (error = miss) │
//!                               no                                        ▼
//!                               └──▶ extractor: walk pages ──▶ create ──▶ LoadOutcome
//! ```
//!
//! The orchestrator owns the extractor and the state of the one document
//! that is currently open. The cache store is shared and may serve several
//! orchestrators.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flume::Receiver;
use log::{debug, error, info, warn};

use crate::cache::{CacheStore, ExtractionBundle};
use crate::error::LoadError;
use crate::events::{EventBus, ReaderEvent};
use crate::fingerprint::{DEFAULT_CHUNK_SIZE, Fingerprint, fingerprint_with_chunk_size};
use crate::pdf::{Metadata, PageContent, PdfExtractor, SearchHit};

/// Marker written ahead of each page's text; `page_number` is 1-based
#[must_use]
pub fn page_marker(page_number: usize) -> String {
    format!("\n--- Page {page_number} ---\n\n")
}

/// Result of loading a document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadOutcome {
    pub bundle: ExtractionBundle,
    pub was_cached: bool,
    pub fingerprint: Fingerprint,
    pub total_pages: usize,
    pub metadata: Metadata,
}

/// The document currently open in an orchestrator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveDocument {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    pub total_pages: usize,
    pub metadata: Metadata,
    pub cached: bool,
}

pub struct ExtractionOrchestrator<E: PdfExtractor> {
    store: Arc<CacheStore>,
    extractor: E,
    active: Option<ActiveDocument>,
    events: EventBus,
    chunk_size: usize,
}

impl<E: PdfExtractor> ExtractionOrchestrator<E> {
    pub fn new(store: Arc<CacheStore>, extractor: E) -> Self {
        Self {
            store,
            extractor,
            active: None,
            events: EventBus::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Bytes read per step while fingerprinting
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Receive [`ReaderEvent`]s published by this orchestrator
    pub fn subscribe(&mut self) -> Receiver<ReaderEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    #[must_use]
    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    #[must_use]
    pub fn active(&self) -> Option<&ActiveDocument> {
        self.active.as_ref()
    }

    /// Load `path`, serving its content from the cache when the same bytes
    /// were extracted before.
    ///
    /// The document is opened through the extractor either way so page count
    /// and metadata are live; pages are only walked on a miss.
    pub fn get_or_extract(&mut self, path: &Path) -> Result<LoadOutcome, LoadError> {
        info!("Loading {path:?}");
        // A failed load leaves no session behind
        self.active = None;
        self.extractor.close();

        let fingerprint = fingerprint_with_chunk_size(path, self.chunk_size).inspect_err(|e| {
            error!("{e}");
        })?;

        let cached = if self.store.exists(&fingerprint) {
            match self.store.read(&fingerprint) {
                Ok(bundle) => Some(bundle),
                Err(e) => {
                    warn!("Cache entry for {path:?} unusable, extracting again: {e}");
                    None
                }
            }
        } else {
            None
        };

        self.extractor.open(path).map_err(|e| {
            error!("Failed to open {path:?}: {e}");
            LoadError::Open(e)
        })?;
        let total_pages = self.extractor.page_count();
        let metadata = self.extractor.metadata();

        let (bundle, was_cached) = match cached {
            Some(bundle) => {
                info!("Loaded {path:?} from cache ({total_pages} pages)");
                (bundle, true)
            }
            None => {
                let bundle = self.walk_pages();
                if !self
                    .store
                    .create(&fingerprint, &bundle.raw_text, &bundle.images)
                {
                    warn!("Serving {path:?} without caching it");
                }
                info!("Extracted {path:?} ({total_pages} pages)");
                (bundle, false)
            }
        };

        self.activate(path, &fingerprint, total_pages, &metadata, was_cached);

        Ok(LoadOutcome {
            bundle,
            was_cached,
            fingerprint,
            total_pages,
            metadata,
        })
    }

    /// Re-extract the active document and replace its cache entry wholesale,
    /// then reload it so the caller sees what was persisted.
    pub fn rebuild_cache(&mut self) -> Result<LoadOutcome, LoadError> {
        let Some(active) = self.active.clone() else {
            warn!("Cache rebuild requested with no document loaded");
            return Err(LoadError::NoActiveDocument);
        };

        info!("Rebuilding cache for {:?}", active.path);
        if !self.extractor.is_open() {
            self.extractor.open(&active.path).map_err(LoadError::Open)?;
        }

        let bundle = self.walk_pages();
        if !self
            .store
            .rebuild(&active.fingerprint, &bundle.raw_text, &bundle.images)
        {
            error!("Cache rebuild failed for {:?}", active.path);
            return Err(LoadError::RebuildFailed(active.fingerprint.to_string()));
        }

        self.events.publish(ReaderEvent::CacheRebuilt {
            fingerprint: active.fingerprint.clone(),
        });

        self.get_or_extract(&active.path)
    }

    /// Live content of one page of the active document
    pub fn page(&mut self, index: usize) -> Result<PageContent, LoadError> {
        if self.active.is_none() {
            return Err(LoadError::NoActiveDocument);
        }
        self.extractor.page(index).map_err(LoadError::Extract)
    }

    pub fn search(&mut self, query: &str) -> Result<Vec<SearchHit>, LoadError> {
        if self.active.is_none() {
            return Err(LoadError::NoActiveDocument);
        }
        info!("Searching for {query:?}");
        let hits = self
            .extractor
            .search_text(query)
            .map_err(LoadError::Extract)?;
        info!("{} matches for {query:?}", hits.len());
        Ok(hits)
    }

    #[must_use]
    pub fn total_pages(&self) -> usize {
        self.active.as_ref().map_or(0, |doc| doc.total_pages)
    }

    #[must_use]
    pub fn metadata(&self) -> Metadata {
        self.active
            .as_ref()
            .map(|doc| doc.metadata.clone())
            .unwrap_or_default()
    }

    /// Close the active document, if any
    pub fn close(&mut self) {
        self.extractor.close();
        if let Some(doc) = self.active.take() {
            info!("Closed {:?}", doc.path);
            self.events.publish(ReaderEvent::DocumentClosed);
        }
    }

    fn walk_pages(&mut self) -> ExtractionBundle {
        let total_pages = self.extractor.page_count();
        let mut raw_text = String::new();
        let mut images = Vec::new();

        for index in 0..total_pages {
            match self.extractor.page(index) {
                Ok(page) => {
                    raw_text.push_str(&page_marker(index + 1));
                    raw_text.push_str(&page.text);
                    images.extend(page.images);
                }
                Err(e) => warn!("Skipping page {}: {e}", index + 1),
            }
        }

        let bundle = ExtractionBundle::new(raw_text, images);
        debug!(
            "Walked {total_pages} pages: {} text bytes, {} images ({} bytes)",
            bundle.raw_text.len(),
            bundle.images.len(),
            bundle.image_bytes()
        );
        bundle
    }

    fn activate(
        &mut self,
        path: &Path,
        fingerprint: &Fingerprint,
        total_pages: usize,
        metadata: &Metadata,
        cached: bool,
    ) {
        self.active = Some(ActiveDocument {
            path: path.to_path_buf(),
            fingerprint: fingerprint.clone(),
            total_pages,
            metadata: metadata.clone(),
            cached,
        });
        self.events.publish(ReaderEvent::DocumentLoaded {
            path: path.to_path_buf(),
            fingerprint: fingerprint.clone(),
            total_pages,
            metadata: metadata.clone(),
            cached,
        });
    }
}
