//! Tests for Storage element management
//!
//! These tests verify:
//! - Naming rules and case-insensitive uniqueness
//! - Create / open / destroy / rename of storages and streams
//! - Move and copy between storages, recursively
//! - Metadata: class ids, state bits, timestamps, statistics
//! - Read-only handles refusing writes

use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use strata::{
    AccessMode, CommitConditions, Config, Creation, ElementKind, ElementTimes, ErrorKind,
    RootFile, Storage, StrataError, MAX_NAME_LEN,
};
use tempfile::TempDir;
use uuid::Uuid;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_root() -> (TempDir, RootFile, PathBuf, Storage) {
    let temp_dir = TempDir::new().unwrap();
    let files = RootFile::new(
        Config::builder()
            .temp_dir(temp_dir.path())
            .sync_on_commit(false)
            .build(),
    );
    let path = temp_dir.path().join("test.stg");
    let root = files.create(Some(&path), AccessMode::create(), 512).unwrap();
    (temp_dir, files, path, root)
}

fn child_names(storage: &Storage) -> Vec<String> {
    storage
        .elements()
        .map(|stats| stats.unwrap().name().to_string())
        .collect()
}

fn write_stream(storage: &Storage, name: &str, content: &[u8]) {
    let mut stream = storage.create_stream(name, AccessMode::create()).unwrap();
    stream.write_all(content).unwrap();
}

fn read_stream(storage: &Storage, name: &str) -> Vec<u8> {
    let mut stream = storage.open_stream(name, AccessMode::read()).unwrap();
    let mut content = Vec::new();
    stream.read_to_end(&mut content).unwrap();
    content
}

// =============================================================================
// Naming Tests
// =============================================================================

#[test]
fn test_invalid_names_leave_directory_unchanged() {
    let (_temp, _files, _path, root) = setup_root();
    let too_long = "x".repeat(MAX_NAME_LEN + 1);
    let bad_names = ["", too_long.as_str(), "\u{1}Ole", "a/b", "a\\b", "a:b", "a!b"];

    for name in bad_names {
        let err = root.create_storage(name, AccessMode::create()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidName, "storage {:?}", name);
        let err = root.create_stream(name, AccessMode::create()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidName, "stream {:?}", name);
    }

    assert!(child_names(&root).is_empty());
}

#[test]
fn test_longest_legal_name() {
    let (_temp, _files, _path, root) = setup_root();
    let name = "n".repeat(MAX_NAME_LEN);

    root.create_stream(&name, AccessMode::create()).unwrap();

    assert!(root.exists(&name).unwrap());
}

#[test]
fn test_duplicate_name_differing_only_in_case() {
    let (_temp, _files, _path, root) = setup_root();
    root.create_storage("Orders", AccessMode::create()).unwrap();

    let err = root.create_stream("ORDERS", AccessMode::create()).unwrap_err();
    assert!(matches!(err, StrataError::DuplicateName(_)));

    let err = root.create_storage("orders", AccessMode::create()).unwrap_err();
    assert!(matches!(err, StrataError::DuplicateName(_)));

    assert_eq!(child_names(&root), vec!["Orders"]);
}

#[test]
fn test_lookup_is_case_insensitive_and_keeps_stored_case() {
    let (_temp, _files, _path, root) = setup_root();
    root.create_storage("Orders", AccessMode::create()).unwrap();

    let orders = root.open_storage("oRdErS", AccessMode::read_write()).unwrap();

    assert_eq!(orders.name().unwrap(), "Orders");
    assert_eq!(root.element_kind("ORDERS").unwrap(), Some(ElementKind::Storage));
}

// =============================================================================
// Create / Open Tests
// =============================================================================

#[test]
fn test_create_new_replaces_element() {
    let (_temp, _files, _path, root) = setup_root();
    write_stream(&root, "Data", b"old content");

    let mode = AccessMode::create().with_creation(Creation::CreateNew);
    root.create_stream("Data", mode).unwrap();

    assert!(read_stream(&root, "Data").is_empty());
}

#[test]
fn test_create_or_open_keeps_element() {
    let (_temp, _files, _path, root) = setup_root();
    write_stream(&root, "Data", b"kept");

    let mode = AccessMode::create().with_creation(Creation::CreateOrOpen);
    let stream = root.create_stream("Data", mode).unwrap();

    assert_eq!(stream.len().unwrap(), 4);
}

#[test]
fn test_create_or_open_wrong_kind() {
    let (_temp, _files, _path, root) = setup_root();
    root.create_storage("Thing", AccessMode::create()).unwrap();

    let mode = AccessMode::create().with_creation(Creation::CreateOrOpen);
    let err = root.create_stream("Thing", mode).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WrongElementKind);
}

#[test]
fn test_open_missing_and_wrong_kind() {
    let (_temp, _files, _path, root) = setup_root();
    root.create_stream("Notes", AccessMode::create()).unwrap();

    let err = root.open_storage("Missing", AccessMode::read()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = root.open_storage("Notes", AccessMode::read()).unwrap_err();
    assert!(matches!(
        err,
        StrataError::WrongElementKind {
            expected: ElementKind::Storage,
            found: ElementKind::Stream,
            ..
        }
    ));

    root.create_storage("Box", AccessMode::create()).unwrap();
    let err = root.open_stream("Box", AccessMode::read()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WrongElementKind);
}

#[test]
fn test_open_storage_inherit_uses_parent_mode() {
    let (_temp, _files, _path, root) = setup_root();
    root.create_storage("Orders", AccessMode::create()).unwrap();

    let orders = root.open_storage_inherit("Orders").unwrap();

    assert_eq!(orders.mode().intent(), root.mode().intent());
    assert_eq!(orders.mode().creation(), Creation::OpenExisting);
    orders.create_stream("Writable", AccessMode::create()).unwrap();
}

#[test]
fn test_transacted_stream_is_rejected() {
    let (_temp, _files, _path, root) = setup_root();

    let err = root
        .create_stream("S", AccessMode::create().transacted())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(!root.exists("S").unwrap());
}

// =============================================================================
// Destroy / Rename Tests
// =============================================================================

#[test]
fn test_destroy_removes_subtree() {
    let (_temp, _files, _path, root) = setup_root();
    let orders = root.create_storage("Orders", AccessMode::create()).unwrap();
    write_stream(&orders, "Invoice-1", b"abc");

    root.destroy_element("orders").unwrap();

    assert!(!root.exists("Orders").unwrap());
    assert_eq!(orders.stat().unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        root.destroy_element("Orders").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_rename_element() {
    let (_temp, _files, _path, root) = setup_root();
    write_stream(&root, "Draft", b"text");
    root.create_storage("Final", AccessMode::create()).unwrap();

    let err = root.rename_element("Draft", "FINAL").unwrap_err();
    assert!(matches!(err, StrataError::DuplicateName(_)));

    root.rename_element("Draft", "Published").unwrap();
    assert!(!root.exists("Draft").unwrap());
    assert_eq!(read_stream(&root, "published"), b"text");

    let err = root.rename_element("Draft", "Other").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_rename_changes_case_only() {
    let (_temp, _files, _path, root) = setup_root();
    root.create_storage("orders", AccessMode::create()).unwrap();

    root.rename_element("orders", "Orders").unwrap();

    assert_eq!(child_names(&root), vec!["Orders"]);
}

#[test]
fn test_handle_fails_after_ancestor_rename() {
    let (_temp, _files, _path, root) = setup_root();
    let orders = root.create_storage("Orders", AccessMode::create()).unwrap();
    let mut stream = orders.create_stream("Invoice", AccessMode::create()).unwrap();

    root.rename_element("Orders", "Archive").unwrap();

    assert_eq!(stream.write(b"x").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(orders.name().unwrap_err().kind(), ErrorKind::NotFound);
}

// =============================================================================
// Move / Copy Tests
// =============================================================================

#[test]
fn test_move_between_storages() {
    let (_temp, _files, _path, root) = setup_root();
    let s1 = root.create_storage("S1", AccessMode::create()).unwrap();
    let s2 = root.create_storage("S2", AccessMode::create()).unwrap();
    write_stream(&s1, "A", b"payload");

    s1.move_element_to("A", &s2, "A", false).unwrap();

    assert!(child_names(&s1).is_empty());
    assert_eq!(child_names(&s2), vec!["A"]);
    assert_eq!(read_stream(&s2, "A"), b"payload");
}

#[test]
fn test_copy_storage_recursively() {
    let (_temp, _files, _path, root) = setup_root();
    let s1 = root.create_storage("S1", AccessMode::create()).unwrap();
    let s2 = root.create_storage("S2", AccessMode::create()).unwrap();
    let a = s1.create_storage("A", AccessMode::create()).unwrap();
    let nested = a.create_storage("Nested", AccessMode::create()).unwrap();
    write_stream(&nested, "Leaf", b"deep");

    s1.move_element_to("A", &s2, "CopyOfA", true).unwrap();

    assert_eq!(child_names(&s1), vec!["A"]);
    assert_eq!(child_names(&s2), vec!["CopyOfA"]);
    let copy = s2.open_storage("CopyOfA", AccessMode::read()).unwrap();
    let copied_nested = copy.open_storage("Nested", AccessMode::read()).unwrap();
    assert_eq!(read_stream(&copied_nested, "Leaf"), b"deep");
    assert_eq!(read_stream(&nested, "Leaf"), b"deep");
}

#[test]
fn test_move_within_storage_renames() {
    let (_temp, _files, _path, root) = setup_root();
    write_stream(&root, "Old", b"1");

    root.move_element_to("Old", &root, "New", false).unwrap();

    assert_eq!(child_names(&root), vec!["New"]);
}

#[test]
fn test_move_onto_existing_name_fails() {
    let (_temp, _files, _path, root) = setup_root();
    let s1 = root.create_storage("S1", AccessMode::create()).unwrap();
    let s2 = root.create_storage("S2", AccessMode::create()).unwrap();
    write_stream(&s1, "A", b"1");
    write_stream(&s2, "a", b"2");

    let err = s1.move_element_to("A", &s2, "A", false).unwrap_err();

    assert!(matches!(err, StrataError::DuplicateName(_)));
    assert_eq!(read_stream(&s1, "A"), b"1");
    assert_eq!(read_stream(&s2, "A"), b"2");
}

#[test]
fn test_move_into_own_subtree_fails() {
    let (_temp, _files, _path, root) = setup_root();
    let outer = root.create_storage("Outer", AccessMode::create()).unwrap();
    let inner = outer.create_storage("Inner", AccessMode::create()).unwrap();

    let err = root.move_element_to("Outer", &inner, "Loop", false).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert!(root.exists("Outer").unwrap());
}

#[test]
fn test_move_into_own_transacted_handle_fails() {
    let (_temp, _files, _path, root) = setup_root();
    let outer = root.create_storage("Outer", AccessMode::create()).unwrap();
    write_stream(&outer, "Data", b"keep");
    let open_tx = AccessMode::create()
        .transacted()
        .with_creation(Creation::OpenExisting);
    let outer_tx = root.open_storage("Outer", open_tx).unwrap();
    let inner_tx = outer_tx
        .create_storage("Inner", AccessMode::create().transacted())
        .unwrap();

    for destination in [&outer_tx, &inner_tx] {
        let err = root
            .move_element_to("Outer", destination, "Loop", false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    assert_eq!(read_stream(&outer, "Data"), b"keep");
    assert!(!outer_tx.exists("Loop").unwrap());
    assert!(!inner_tx.exists("Loop").unwrap());
}

#[test]
fn test_copy_into_own_transacted_handle() {
    let (_temp, _files, _path, root) = setup_root();
    let outer = root.create_storage("Outer", AccessMode::create()).unwrap();
    write_stream(&outer, "Data", b"keep");
    let open_tx = AccessMode::create()
        .transacted()
        .with_creation(Creation::OpenExisting);
    let outer_tx = root.open_storage("Outer", open_tx).unwrap();

    root.move_element_to("Outer", &outer_tx, "Snapshot", true)
        .unwrap();
    outer_tx.commit(CommitConditions::Default).unwrap();

    let snapshot = outer.open_storage("Snapshot", AccessMode::read()).unwrap();
    assert_eq!(read_stream(&snapshot, "Data"), b"keep");
    assert_eq!(read_stream(&outer, "Data"), b"keep");
}

#[test]
fn test_move_missing_element() {
    let (_temp, _files, _path, root) = setup_root();
    let dest = root.create_storage("Dest", AccessMode::create()).unwrap();

    let err = root.move_element_to("Ghost", &dest, "Ghost", false).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_copy_to_merges_into_destination() {
    let (_temp, _files, _path, root) = setup_root();
    let source = root.create_storage("Source", AccessMode::create()).unwrap();
    let dest = root.create_storage("Dest", AccessMode::create()).unwrap();
    let class_id = Uuid::new_v4();
    source.set_class_id(class_id).unwrap();
    write_stream(&source, "Shared", b"from source");
    write_stream(&dest, "Shared", b"from dest");
    write_stream(&dest, "OnlyDest", b"kept");

    source.copy_to(&dest).unwrap();

    assert_eq!(read_stream(&dest, "Shared"), b"from source");
    assert_eq!(read_stream(&dest, "OnlyDest"), b"kept");
    assert_eq!(dest.class_id().unwrap(), class_id);
    assert_eq!(read_stream(&source, "Shared"), b"from source");
}

// =============================================================================
// Metadata Tests
// =============================================================================

#[test]
fn test_class_id_and_state_bits() {
    let (_temp, _files, _path, root) = setup_root();
    let class_id = Uuid::new_v4();

    root.set_class_id(class_id).unwrap();
    root.set_state_bits(0b1010, 0b1111).unwrap();
    root.set_state_bits(0b0001, 0b0011).unwrap();

    assert_eq!(root.class_id().unwrap(), class_id);
    assert_eq!(root.state_bits().unwrap(), 0b1001);
    let stat = root.stat().unwrap();
    assert_eq!(stat.class_id(), class_id);
    assert_eq!(stat.state_bits(), 0b1001);
    assert!(stat.is_storage());
    assert_eq!(stat.mode(), Some(root.mode()));
}

#[test]
fn test_set_element_times() {
    let (_temp, _files, _path, root) = setup_root();
    write_stream(&root, "Doc", b"x");
    let created = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
    let modified = created + Duration::from_secs(60);

    root.set_element_times(
        Some("doc"),
        ElementTimes {
            created: Some(created),
            modified: Some(modified),
            accessed: None,
        },
    )
    .unwrap();

    let stat = root.open_stream("Doc", AccessMode::read()).unwrap().stat().unwrap();
    assert_eq!(stat.created(), Some(created));
    assert_eq!(stat.modified(), Some(modified));
    assert_eq!(stat.accessed(), None);

    root.set_element_times(
        None,
        ElementTimes {
            accessed: Some(modified),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(root.stat().unwrap().accessed(), Some(modified));

    let err = root
        .set_element_times(Some("Missing"), ElementTimes::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_times_before_epoch_survive_reopen() {
    let (_temp, files, path, root) = setup_root();
    write_stream(&root, "Old", b"x");
    let created = SystemTime::UNIX_EPOCH - Duration::from_secs(2_208_988_800);
    let modified = SystemTime::UNIX_EPOCH - Duration::from_millis(1_500);

    root.set_element_times(
        Some("Old"),
        ElementTimes {
            created: Some(created),
            modified: Some(modified),
            accessed: None,
        },
    )
    .unwrap();
    // The root keeps accepting writes afterwards
    root.create_storage("Later", AccessMode::create()).unwrap();
    drop(root);

    let root = files.open(&path, AccessMode::read()).unwrap();
    let stat = root.open_stream("Old", AccessMode::read()).unwrap().stat().unwrap();
    assert_eq!(stat.created(), Some(created));
    assert_eq!(stat.modified(), Some(modified));
    assert_eq!(stat.accessed(), None);
    assert!(root.exists("Later").unwrap());
}

#[test]
fn test_element_times_survive_reopen() {
    let (_temp, files, path, root) = setup_root();
    let accessed = SystemTime::UNIX_EPOCH + Duration::new(1_600_000_000, 42);
    root.set_element_times(
        None,
        ElementTimes {
            accessed: Some(accessed),
            ..Default::default()
        },
    )
    .unwrap();
    drop(root);

    let root = files.open(&path, AccessMode::read()).unwrap();
    assert_eq!(root.stat().unwrap().accessed(), Some(accessed));
}

#[test]
fn test_stream_statistics() {
    let (_temp, _files, _path, root) = setup_root();
    write_stream(&root, "Doc", &[9u8; 300]);

    let stat = root
        .elements()
        .next()
        .unwrap()
        .unwrap();

    assert_eq!(stat.name(), "Doc");
    assert!(stat.is_stream());
    assert_eq!(stat.size(), 300);
    assert_eq!(stat.mode(), None);
}

// =============================================================================
// Access Tests
// =============================================================================

#[test]
fn test_read_only_root_refuses_writes() {
    let (_temp, files, path, root) = setup_root();
    root.create_storage("Orders", AccessMode::create()).unwrap();
    drop(root);

    let root = files.open(&path, AccessMode::read()).unwrap();

    assert_eq!(
        root.create_stream("New", AccessMode::create()).unwrap_err().kind(),
        ErrorKind::AccessDenied
    );
    assert_eq!(
        root.open_storage("Orders", AccessMode::read_write()).unwrap_err().kind(),
        ErrorKind::AccessDenied
    );
    assert_eq!(
        root.destroy_element("Orders").unwrap_err().kind(),
        ErrorKind::AccessDenied
    );
    let orders = root.open_storage("Orders", AccessMode::read()).unwrap();
    assert_eq!(
        orders.set_state_bits(1, 1).unwrap_err().kind(),
        ErrorKind::AccessDenied
    );
}

#[test]
fn test_read_only_stream_refuses_writes() {
    let (_temp, _files, _path, root) = setup_root();
    write_stream(&root, "Doc", b"x");

    let mut stream = root.open_stream("Doc", AccessMode::read()).unwrap();

    assert_eq!(stream.write(b"y").unwrap_err().kind(), ErrorKind::AccessDenied);
    assert_eq!(stream.set_length(0).unwrap_err().kind(), ErrorKind::AccessDenied);
}

#[test]
fn test_direct_root_writes_through() {
    let (_temp, files, path, root) = setup_root();
    let orders = root.create_storage("Orders", AccessMode::create()).unwrap();
    write_stream(&orders, "Invoice-1", b"direct");
    drop(orders);
    drop(root);

    let root = files.open(&path, AccessMode::read()).unwrap();
    let orders = root.open_storage("Orders", AccessMode::read()).unwrap();
    assert_eq!(read_stream(&orders, "Invoice-1"), b"direct");
}
