pub mod cache;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod orchestrator;
pub mod paths;
pub mod pdf;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::{CacheStore, ExtractionBundle};
pub use error::{CacheError, ExtractError, FingerprintError, LoadError};
pub use events::ReaderEvent;
pub use fingerprint::{Fingerprint, fingerprint};
pub use orchestrator::{ActiveDocument, ExtractionOrchestrator, LoadOutcome, page_marker};
pub use pdf::{Metadata, PageContent, PdfExtractor, SearchHit};
pub use settings::Settings;
