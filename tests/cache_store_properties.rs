use std::fs;

use litcache::cache::{CONTENT_FILE, CacheStore, IMAGES_DIR, MANIFEST_FILE, image_file_name};
use litcache::{CacheError, Fingerprint, fingerprint};
use tempfile::TempDir;

fn store() -> (TempDir, CacheStore) {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::new(dir.path().join("storage")).unwrap();
    (dir, store)
}

#[test]
fn distinct_fixture_files_do_not_collide() {
    let dir = TempDir::new().unwrap();
    let bodies: [&[u8]; 4] = [b"", b"a", b"b", b"ab"];
    let mut seen = Vec::new();
    for (i, body) in bodies.iter().enumerate() {
        let path = dir.path().join(format!("f{i}.pdf"));
        fs::write(&path, body).unwrap();
        let fp = fingerprint(&path).unwrap();
        assert_eq!(fp, fingerprint(&path).unwrap());
        assert!(!seen.contains(&fp), "collision for {body:?}");
        seen.push(fp);
    }
}

#[test]
fn round_trip_preserves_text_and_image_order() {
    let (_dir, store) = store();
    let fp = Fingerprint::of_bytes(b"round trip");
    let text = "\n--- Page 1 ---\n\nünïcödé text\r\nwith CRLF";
    let images: Vec<Vec<u8>> = (0..12u8).map(|i| vec![i; usize::from(i) + 1]).collect();

    assert!(store.create(&fp, text, &images));
    let bundle = store.read(&fp).unwrap();

    assert_eq!(bundle.raw_text, text);
    assert_eq!(bundle.images, images);
}

#[test]
fn second_create_overwrites_first() {
    let (_dir, store) = store();
    let fp = Fingerprint::of_bytes(b"overwrite");

    assert!(store.create(&fp, "first", &[vec![1], vec![2]]));
    assert!(store.create(&fp, "second", &[vec![3]]));

    let bundle = store.read(&fp).unwrap();
    assert_eq!(bundle.raw_text, "second");
    assert_eq!(bundle.images, vec![vec![3]]);
    assert!(!store.entry_dir(&fp).join(IMAGES_DIR).join(image_file_name(1)).exists());
}

#[test]
fn miss_then_hit() {
    let (_dir, store) = store();
    let created = Fingerprint::of_bytes(b"created");
    let rebuilt = Fingerprint::of_bytes(b"rebuilt");

    assert!(!store.exists(&created));
    assert!(!store.exists(&rebuilt));
    assert!(matches!(store.read(&created), Err(CacheError::NotFound(_))));

    assert!(store.create(&created, "x", &[]));
    assert!(store.rebuild(&rebuilt, "y", &[]));

    assert!(store.exists(&created));
    assert!(store.exists(&rebuilt));
}

#[test]
fn zero_byte_text_is_not_a_hit() {
    let (_dir, store) = store();
    let fp = Fingerprint::of_bytes(b"truncated");
    assert!(store.create(&fp, "some text", &[]));

    fs::write(store.entry_dir(&fp).join(CONTENT_FILE), b"").unwrap();

    assert!(!store.exists(&fp));
    assert!(store.read(&fp).is_err());
}

#[test]
fn zero_byte_text_without_manifest_is_not_a_hit() {
    let (_dir, store) = store();
    let fp = Fingerprint::of_bytes(b"legacy");
    let entry = store.entry_dir(&fp);
    fs::create_dir_all(entry.join(IMAGES_DIR)).unwrap();
    fs::write(entry.join(CONTENT_FILE), b"").unwrap();

    assert!(!store.exists(&fp));
}

#[test]
fn entry_without_manifest_but_with_text_is_readable() {
    let (_dir, store) = store();
    let fp = Fingerprint::of_bytes(b"handmade");
    let entry = store.entry_dir(&fp);
    fs::create_dir_all(entry.join(IMAGES_DIR)).unwrap();
    fs::write(entry.join(CONTENT_FILE), "hand written").unwrap();
    fs::write(entry.join(IMAGES_DIR).join(image_file_name(0)), [7u8; 4]).unwrap();

    assert!(store.exists(&fp));
    let bundle = store.read(&fp).unwrap();
    assert_eq!(bundle.raw_text, "hand written");
    assert_eq!(bundle.images, vec![vec![7u8; 4]]);
}

#[test]
fn rebuild_leaves_no_residue() {
    let (_dir, store) = store();
    let fp = Fingerprint::of_bytes(b"rebuild");

    assert!(store.create(&fp, "textA", &[vec![1; 5], vec![2; 5], vec![3; 5]]));
    assert!(store.rebuild(&fp, "textB", &[vec![9; 2]]));

    let bundle = store.read(&fp).unwrap();
    assert_eq!(bundle.raw_text, "textB");
    assert_eq!(bundle.images, vec![vec![9; 2]]);

    let on_disk = fs::read_dir(store.entry_dir(&fp).join(IMAGES_DIR))
        .unwrap()
        .count();
    assert_eq!(on_disk, 1);
}

#[test]
fn empty_bundle_is_a_valid_entry() {
    let (_dir, store) = store();
    let fp = Fingerprint::of_bytes(b"no pages");

    assert!(store.create(&fp, "", &[]));

    assert!(store.exists(&fp));
    assert!(store.entry_dir(&fp).join(MANIFEST_FILE).exists());
    let bundle = store.read(&fp).unwrap();
    assert!(bundle.is_empty());
}

#[test]
fn entries_persist_across_store_instances() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("storage");
    let fp = Fingerprint::of_bytes(b"persisted");

    assert!(CacheStore::new(&root).unwrap().create(&fp, "kept", &[vec![1]]));

    let reopened = CacheStore::new(&root).unwrap();
    assert!(reopened.exists(&fp));
    assert_eq!(reopened.read(&fp).unwrap().raw_text, "kept");
}
