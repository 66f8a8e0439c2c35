use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use litcache::cache::{CONTENT_FILE, CacheStore};
use litcache::test_utils::{FakeDocument, FakeExtractor};
use litcache::{ExtractionOrchestrator, LoadError, ReaderEvent, fingerprint, page_marker};
use tempfile::TempDir;

fn hello_world() -> FakeDocument {
    FakeDocument::new()
        .with_page("Hello", vec![])
        .with_page("World", vec![vec![0x01; 10]])
        .with_metadata("title", "Greeting")
}

fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn orchestrator(
    store: &Arc<CacheStore>,
    doc: FakeDocument,
) -> ExtractionOrchestrator<FakeExtractor> {
    ExtractionOrchestrator::new(Arc::clone(store), FakeExtractor::new(doc))
}

fn new_store(dir: &TempDir) -> Arc<CacheStore> {
    Arc::new(CacheStore::new(dir.path().join("storage")).unwrap())
}

#[test]
fn two_page_document_extracts_then_hits() {
    let dir = TempDir::new().unwrap();
    let store = new_store(&dir);
    let pdf = write_fixture(dir.path(), "hello.pdf", b"%PDF hello world");
    let mut orchestrator = orchestrator(&store, hello_world());

    let first = orchestrator.get_or_extract(&pdf).unwrap();
    assert!(!first.was_cached);
    let text = &first.bundle.raw_text;
    let positions: Vec<usize> = [
        page_marker(1).as_str(),
        "Hello",
        page_marker(2).as_str(),
        "World",
    ]
    .iter()
    .map(|needle| text.find(needle).unwrap())
    .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(first.bundle.images, vec![vec![0x01; 10]]);
    assert_eq!(first.total_pages, 2);

    let second = orchestrator.get_or_extract(&pdf).unwrap();
    assert!(second.was_cached);
    assert_eq!(second.bundle, first.bundle);
    assert_eq!(second.total_pages, 2);
    assert_eq!(
        second.metadata.get("title").map(String::as_str),
        Some("Greeting")
    );
}

#[test]
fn copied_file_is_a_hit() {
    let dir = TempDir::new().unwrap();
    let store = new_store(&dir);
    let original = write_fixture(dir.path(), "original.pdf", b"%PDF same bytes");
    fs::create_dir(dir.path().join("elsewhere")).unwrap();
    let copy = dir.path().join("elsewhere").join("renamed.pdf");
    fs::copy(&original, &copy).unwrap();

    let mut first = orchestrator(&store, hello_world());
    assert!(!first.get_or_extract(&original).unwrap().was_cached);

    let mut second = orchestrator(&store, hello_world());
    let outcome = second.get_or_extract(&copy).unwrap();
    assert!(outcome.was_cached);
    assert_eq!(second.extractor().pages_read(), 0);
    assert_eq!(second.active().unwrap().path, copy);
}

#[test]
fn zero_page_document_is_still_cached() {
    let dir = TempDir::new().unwrap();
    let store = new_store(&dir);
    let pdf = write_fixture(dir.path(), "empty.pdf", b"%PDF no pages");
    let mut orchestrator = orchestrator(&store, FakeDocument::new());

    let outcome = orchestrator.get_or_extract(&pdf).unwrap();

    assert!(!outcome.was_cached);
    assert_eq!(outcome.bundle.raw_text, "");
    assert!(outcome.bundle.images.is_empty());
    assert!(store.exists(&fingerprint(&pdf).unwrap()));
    assert!(orchestrator.get_or_extract(&pdf).unwrap().was_cached);
}

#[test]
fn truncated_text_heals_on_next_load() {
    let dir = TempDir::new().unwrap();
    let store = new_store(&dir);
    let pdf = write_fixture(dir.path(), "hello.pdf", b"%PDF hello world");
    let mut orchestrator = orchestrator(&store, hello_world());

    let first = orchestrator.get_or_extract(&pdf).unwrap();
    fs::write(store.entry_dir(&first.fingerprint).join(CONTENT_FILE), b"").unwrap();
    assert!(!store.exists(&first.fingerprint));

    let healed = orchestrator.get_or_extract(&pdf).unwrap();
    assert!(!healed.was_cached);
    assert_eq!(healed.bundle, first.bundle);
    assert!(store.exists(&first.fingerprint));
}

#[test]
fn unwritable_cache_still_serves_extraction() {
    let dir = TempDir::new().unwrap();
    let store = new_store(&dir);
    let pdf = write_fixture(dir.path(), "hello.pdf", b"%PDF hello world");
    let fp = fingerprint(&pdf).unwrap();
    // A plain file where the entry directory should go blocks every write
    fs::write(store.entry_dir(&fp), b"in the way").unwrap();
    let mut orchestrator = orchestrator(&store, hello_world());

    let outcome = orchestrator.get_or_extract(&pdf).unwrap();

    assert!(!outcome.was_cached);
    assert!(outcome.bundle.raw_text.contains("Hello"));
}

#[test]
fn rebuild_reports_through_events() {
    let dir = TempDir::new().unwrap();
    let store = new_store(&dir);
    let pdf = write_fixture(dir.path(), "hello.pdf", b"%PDF hello world");
    let mut orchestrator = orchestrator(&store, hello_world());
    let first_listener = orchestrator.subscribe();
    let second_listener = orchestrator.subscribe();

    assert!(matches!(
        orchestrator.rebuild_cache(),
        Err(LoadError::NoActiveDocument)
    ));

    let loaded = orchestrator.get_or_extract(&pdf).unwrap();
    let rebuilt = orchestrator.rebuild_cache().unwrap();
    assert!(rebuilt.was_cached);
    assert_eq!(rebuilt.bundle, loaded.bundle);

    for listener in [&first_listener, &second_listener] {
        let events: Vec<ReaderEvent> = listener.try_iter().collect();
        assert_eq!(events.len(), 3);
        match &events[0] {
            ReaderEvent::DocumentLoaded {
                path,
                total_pages,
                cached,
                ..
            } => {
                assert_eq!(path, &pdf);
                assert_eq!(*total_pages, 2);
                assert!(!cached);
            }
            other => panic!("unexpected first event {other:?}"),
        }
        assert_eq!(
            events[1],
            ReaderEvent::CacheRebuilt {
                fingerprint: loaded.fingerprint.clone()
            }
        );
        assert!(matches!(
            events[2],
            ReaderEvent::DocumentLoaded { cached: true, .. }
        ));
    }
}
