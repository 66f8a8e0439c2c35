//! Extraction bundle and the manifest that commits it on disk

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bumped whenever the on-disk entry layout changes; older entries read as misses
pub const FORMAT_VERSION: u32 = 1;

/// Text and images extracted from one document.
///
/// `raw_text` holds every page's text in page order, each preceded by a
/// page-boundary marker. `images` is the flat list of embedded image blobs in
/// discovery order; no page association survives persistence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractionBundle {
    pub raw_text: String,
    pub images: Vec<Vec<u8>>,
}

impl ExtractionBundle {
    #[must_use]
    pub fn new(raw_text: String, images: Vec<Vec<u8>>) -> Self {
        Self { raw_text, images }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw_text.is_empty() && self.images.is_empty()
    }

    /// Total size of all image blobs in bytes
    #[must_use]
    pub fn image_bytes(&self) -> usize {
        self.images.iter().map(Vec::len).sum()
    }
}

/// Written last into every entry; its presence and agreement with the
/// artifacts is what makes an entry valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub text_bytes: u64,
    pub image_count: usize,
    pub created_at: DateTime<Utc>,
}

impl Manifest {
    #[must_use]
    pub fn describe(text: &str, images: &[Vec<u8>]) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            text_bytes: text.len() as u64,
            image_count: images.len(),
            created_at: Utc::now(),
        }
    }
}
