//! Durable fingerprint -> bundle store
//!
//! Layout of one entry under the cache root:
//!
//! ```text
//! <root>/<fingerprint>/content.txt
//! <root>/<fingerprint>/images/image_000000.png
//! <root>/<fingerprint>/images/image_000001.png
//! <root>/<fingerprint>/manifest.json
//! ```
//!
//! Entries are assembled in a staging directory under the root and swapped
//! into place whole, so a reader never sees a half-written bundle.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, info, warn};

use super::bundle::{ExtractionBundle, FORMAT_VERSION, Manifest};
use crate::error::CacheError;
use crate::fingerprint::Fingerprint;

pub const CONTENT_FILE: &str = "content.txt";
pub const IMAGES_DIR: &str = "images";
pub const MANIFEST_FILE: &str = "manifest.json";

const STAGING_PREFIX: &str = ".staging-";
const IMAGE_PREFIX: &str = "image_";
const IMAGE_SUFFIX: &str = ".png";

/// File name for the image at `ordinal`; zero-padded so a lexicographic
/// listing matches extraction order.
#[must_use]
pub fn image_file_name(ordinal: usize) -> String {
    format!("{IMAGE_PREFIX}{ordinal:06}{IMAGE_SUFFIX}")
}

fn parse_image_ordinal(name: &str) -> Option<usize> {
    let digits = name.strip_prefix(IMAGE_PREFIX)?.strip_suffix(IMAGE_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// On-disk cache of extraction bundles keyed by content fingerprint.
///
/// Operations on the same fingerprint are serialized through an in-process
/// lock. There is no eviction.
pub struct CacheStore {
    root: PathBuf,
    locks: Mutex<HashMap<Fingerprint, Arc<Mutex<()>>>>,
}

impl CacheStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CacheError::io(&root, e))?;
        info!("Cache store rooted at {root:?}");

        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the entry for `fp` (whether or not it exists)
    #[must_use]
    pub fn entry_dir(&self, fp: &Fingerprint) -> PathBuf {
        self.root.join(fp.as_str())
    }

    /// True iff a complete, non-corrupt entry exists for `fp`.
    ///
    /// A zero-byte text artifact only counts when the manifest says the text
    /// really was empty.
    #[must_use]
    pub fn exists(&self, fp: &Fingerprint) -> bool {
        self.with_entry_lock(fp, || self.entry_is_valid(fp))
    }

    /// Load the bundle for `fp`, reconstructing image order from file names
    pub fn read(&self, fp: &Fingerprint) -> Result<ExtractionBundle, CacheError> {
        self.with_entry_lock(fp, || self.read_entry(fp))
    }

    /// Write a fresh entry for `fp`, replacing whatever was there.
    ///
    /// Returns `false` on any I/O failure; the cause is logged. Callers can
    /// keep serving the uncached extraction.
    pub fn create(&self, fp: &Fingerprint, text: &str, images: &[Vec<u8>]) -> bool {
        self.with_entry_lock(fp, || match self.write_entry(fp, text, images) {
            Ok(()) => {
                info!(
                    "Created cache entry {fp} ({} text bytes, {} images)",
                    text.len(),
                    images.len()
                );
                true
            }
            Err(e) => {
                error!("Failed to create cache entry {fp}: {e}");
                false
            }
        })
    }

    /// Delete any existing entry for `fp` wholesale, then write it again.
    pub fn rebuild(&self, fp: &Fingerprint, text: &str, images: &[Vec<u8>]) -> bool {
        self.with_entry_lock(fp, || self.rebuild_entry(fp, text, images))
    }

    /// Run `f` holding the lock for `fp`. The lock is dropped from the map
    /// once nobody else holds or waits on it.
    fn with_entry_lock<T>(&self, fp: &Fingerprint, f: impl FnOnce() -> T) -> T {
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(fp.clone())
            .or_default()
            .clone();

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        drop(lock);

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(fp).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(fp);
        }
        result
    }

    fn read_entry(&self, fp: &Fingerprint) -> Result<ExtractionBundle, CacheError> {
        if !self.entry_is_valid(fp) {
            return Err(CacheError::NotFound(fp.to_string()));
        }

        let dir = self.entry_dir(fp);
        let content_path = dir.join(CONTENT_FILE);
        let raw_text =
            fs::read_to_string(&content_path).map_err(|e| CacheError::io(&content_path, e))?;
        let images = read_images(fp, &dir.join(IMAGES_DIR))?;

        if let Some(manifest) = read_manifest(&dir)? {
            if manifest.image_count != images.len() {
                return Err(CacheError::corrupt(
                    fp.as_str(),
                    format!(
                        "manifest lists {} images, found {}",
                        manifest.image_count,
                        images.len()
                    ),
                ));
            }
        }

        debug!(
            "Read cache entry {fp}: {} text bytes, {} images",
            raw_text.len(),
            images.len()
        );
        Ok(ExtractionBundle::new(raw_text, images))
    }

    fn rebuild_entry(&self, fp: &Fingerprint, text: &str, images: &[Vec<u8>]) -> bool {
        let dir = self.entry_dir(fp);
        if dir.exists() {
            if let Err(e) = fs::remove_dir_all(&dir) {
                error!("Failed to remove cache entry {dir:?} for rebuild: {e}");
                return false;
            }
            debug!("Removed cache entry {fp} for rebuild");
        }

        match self.write_entry(fp, text, images) {
            Ok(()) => {
                info!(
                    "Rebuilt cache entry {fp} ({} text bytes, {} images)",
                    text.len(),
                    images.len()
                );
                true
            }
            Err(e) => {
                error!("Failed to rebuild cache entry {fp}: {e}");
                false
            }
        }
    }

    fn entry_is_valid(&self, fp: &Fingerprint) -> bool {
        let dir = self.entry_dir(fp);
        if !dir.is_dir() {
            return false;
        }

        let content_len = match fs::metadata(dir.join(CONTENT_FILE)) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => return false,
        };

        match read_manifest(&dir) {
            Ok(Some(manifest)) => {
                if manifest.format_version != FORMAT_VERSION {
                    debug!(
                        "Cache entry {fp} has format v{}, expected v{FORMAT_VERSION}",
                        manifest.format_version
                    );
                    return false;
                }
                if manifest.text_bytes != content_len {
                    warn!(
                        "Cache entry {fp} text is {content_len} bytes, manifest says {}",
                        manifest.text_bytes
                    );
                    return false;
                }
                true
            }
            // Entries without a manifest: an empty text file means a crashed write
            Ok(None) => content_len > 0,
            Err(e) => {
                warn!("Ignoring cache entry {fp}: {e}");
                false
            }
        }
    }

    fn write_entry(&self, fp: &Fingerprint, text: &str, images: &[Vec<u8>]) -> io::Result<()> {
        fs::create_dir_all(&self.root)?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)?;
        let staged = staging.path();

        fs::write(staged.join(CONTENT_FILE), text)?;

        let images_dir = staged.join(IMAGES_DIR);
        fs::create_dir(&images_dir)?;
        for (ordinal, blob) in images.iter().enumerate() {
            fs::write(images_dir.join(image_file_name(ordinal)), blob)?;
        }

        let manifest = serde_json::to_vec_pretty(&Manifest::describe(text, images))?;
        fs::write(staged.join(MANIFEST_FILE), manifest)?;

        let dir = self.entry_dir(fp);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::rename(staged, &dir)?;

        // `staging` now points at a moved path; dropping it is a no-op
        Ok(())
    }
}

fn read_manifest(dir: &Path) -> Result<Option<Manifest>, CacheError> {
    let path = dir.join(MANIFEST_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CacheError::io(&path, e)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| CacheError::Corrupt {
            fingerprint: dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            detail: format!("unreadable manifest: {e}"),
        })
}

fn read_images(fp: &Fingerprint, images_dir: &Path) -> Result<Vec<Vec<u8>>, CacheError> {
    let listing = match fs::read_dir(images_dir) {
        Ok(listing) => listing,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CacheError::io(images_dir, e)),
    };

    let mut numbered = Vec::new();
    for entry in listing {
        let entry = entry.map_err(|e| CacheError::io(images_dir, e))?;
        let name = entry.file_name();
        match parse_image_ordinal(&name.to_string_lossy()) {
            Some(ordinal) => numbered.push((ordinal, entry.path())),
            None => debug!("Skipping stray file {name:?} in cache entry {fp}"),
        }
    }
    numbered.sort_by_key(|(ordinal, _)| *ordinal);

    let mut images = Vec::with_capacity(numbered.len());
    for (expected, (ordinal, path)) in numbered.into_iter().enumerate() {
        if ordinal != expected {
            return Err(CacheError::corrupt(
                fp.as_str(),
                format!("image ordinal {expected} is missing"),
            ));
        }
        images.push(fs::read(&path).map_err(|e| CacheError::io(&path, e))?);
    }

    Ok(images)
}
