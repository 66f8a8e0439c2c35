//! Persistent cache of extracted document content

mod bundle;
mod store;

pub use bundle::{ExtractionBundle, FORMAT_VERSION, Manifest};
pub use store::{CONTENT_FILE, CacheStore, IMAGES_DIR, MANIFEST_FILE, image_file_name};
