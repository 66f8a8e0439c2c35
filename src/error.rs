//! Error types for fingerprinting, cache access, extraction and loading

use std::io;
use std::path::PathBuf;

/// The file could not be read to completion while hashing it
#[derive(Debug, thiserror::Error)]
#[error("cannot fingerprint {path:?}: {source}")]
pub struct FingerprintError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Failures reading a cache entry back from disk
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no cache entry for {0}")]
    NotFound(String),

    #[error("cache I/O on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache entry {fingerprint} is inconsistent: {detail}")]
    Corrupt { fingerprint: String, detail: String },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(fingerprint: &str, detail: impl Into<String>) -> Self {
        Self::Corrupt {
            fingerprint: fingerprint.to_string(),
            detail: detail.into(),
        }
    }
}

/// Errors raised by a PDF extractor backend
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("cannot open {path:?}: {detail}")]
    Open { path: PathBuf, detail: String },

    #[error("page {index}: {detail}")]
    Page { index: usize, detail: String },

    #[error("no document is open")]
    NotOpen,
}

impl ExtractError {
    pub fn open(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Open {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn page(index: usize, detail: impl Into<String>) -> Self {
        Self::Page {
            index,
            detail: detail.into(),
        }
    }
}

/// Errors surfaced by the orchestrator to its callers
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    #[error("failed to open document: {0}")]
    Open(#[source] ExtractError),

    #[error(transparent)]
    Extract(ExtractError),

    #[error("no document is currently loaded")]
    NoActiveDocument,

    #[error("rebuilding cache entry {0} failed")]
    RebuildFailed(String),
}
