//! Tests for RootFile
//!
//! These tests verify:
//! - Creating containers with both sector sizes and every creation policy
//! - Opening, probing and rejecting foreign files
//! - Sharing admission between roots of one file
//! - Switching a root to a new backing file

use std::fs;
use std::path::PathBuf;

use strata::{
    AccessMode, CommitConditions, Config, Creation, ErrorKind, Intent, RootFile, SectorSize,
    Sharing, StrataError, Transaction, ROOT_NAME,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_files() -> (TempDir, RootFile) {
    let temp_dir = TempDir::new().unwrap();
    let files = RootFile::new(
        Config::builder()
            .temp_dir(temp_dir.path())
            .sync_on_commit(false)
            .build(),
    );
    (temp_dir, files)
}

fn file_path(temp_dir: &TempDir, name: &str) -> PathBuf {
    temp_dir.path().join(name)
}

fn transacted_writer() -> AccessMode {
    AccessMode::create()
        .transacted()
        .with_sharing(Sharing::DenyWrite)
}

// =============================================================================
// Create Tests
// =============================================================================

#[test]
fn test_create_writes_sector_aligned_file() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "small.stg");

    let root = files.create(Some(&path), AccessMode::create(), 512).unwrap();

    assert!(root.is_root());
    assert_eq!(root.name().unwrap(), ROOT_NAME);
    assert_eq!(root.sector_size(), Some(SectorSize::Small));
    assert_eq!(root.file_path().unwrap(), path);

    let len = fs::metadata(&path).unwrap().len();
    assert!(len >= 1024);
    assert_eq!(len % 512, 0);
}

#[test]
fn test_create_large_sectors() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "large.stg");

    let root = files.create(Some(&path), AccessMode::create(), 4096).unwrap();

    assert_eq!(root.sector_size(), Some(SectorSize::Large));
    assert_eq!(fs::metadata(&path).unwrap().len() % 4096, 0);
}

#[test]
fn test_create_rejects_other_sector_sizes() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "odd.stg");

    let err = files
        .create(Some(&path), AccessMode::create(), 1024)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(!path.exists());
}

#[test]
fn test_create_default_uses_configured_sector_size() {
    let temp = TempDir::new().unwrap();
    let files = RootFile::new(
        Config::builder()
            .temp_dir(temp.path())
            .default_sector_size(SectorSize::Small)
            .sync_on_commit(false)
            .build(),
    );

    let root = files.create_default(None, AccessMode::create()).unwrap();

    assert_eq!(root.sector_size(), Some(SectorSize::Small));
}

#[test]
fn test_create_without_path_uses_temp_dir() {
    let (temp, files) = setup_files();

    let root = files.create(None, AccessMode::create(), 4096).unwrap();

    let path = root.file_path().unwrap();
    assert!(path.starts_with(temp.path()));
    assert!(RootFile::is_structured_file(&path).unwrap());
}

#[test]
fn test_create_fail_if_exists() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "a.stg");
    drop(files.create(Some(&path), AccessMode::create(), 512).unwrap());

    let err = files
        .create(Some(&path), AccessMode::create(), 512)
        .unwrap_err();

    assert!(matches!(err, StrataError::AlreadyExists(_)));
}

#[test]
fn test_create_new_replaces_existing_file() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "a.stg");
    {
        let root = files.create(Some(&path), AccessMode::create(), 512).unwrap();
        root.create_stream("Old", AccessMode::create()).unwrap();
    }

    let mode = AccessMode::create().with_creation(Creation::CreateNew);
    let root = files.create(Some(&path), mode, 512).unwrap();

    assert!(!root.exists("Old").unwrap());
}

#[test]
fn test_create_or_open_keeps_existing_content() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "a.stg");
    {
        let root = files.create(Some(&path), AccessMode::create(), 512).unwrap();
        root.create_stream("Kept", AccessMode::create()).unwrap();
    }

    let mode = AccessMode::create().with_creation(Creation::CreateOrOpen);
    let root = files.create(Some(&path), mode, 512).unwrap();

    assert!(root.exists("Kept").unwrap());
}

#[test]
fn test_create_rejects_open_existing_creation() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "a.stg");

    let err = files
        .create(Some(&path), AccessMode::read_write(), 512)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_missing_file() {
    let (temp, files) = setup_files();

    let err = files
        .open(&file_path(&temp, "missing.stg"), AccessMode::read())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_open_foreign_file() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "notes.txt");
    fs::write(&path, b"definitely not a container, just plain text").unwrap();

    let err = files.open(&path, AccessMode::read()).unwrap_err();

    assert!(matches!(err, StrataError::NotAStructuredFile(_)));
}

#[test]
fn test_open_corrupted_payload() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "a.stg");
    {
        let root = files.create(Some(&path), AccessMode::create(), 512).unwrap();
        root.create_storage("Orders", AccessMode::create()).unwrap();
    }
    let mut bytes = fs::read(&path).unwrap();
    bytes[520] ^= 0x5a;
    fs::write(&path, &bytes).unwrap();

    let err = files.open(&path, AccessMode::read()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Corrupted);
}

#[test]
fn test_open_rejects_creation_policies() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "a.stg");
    drop(files.create(Some(&path), AccessMode::create(), 512).unwrap());

    let err = files.open(&path, AccessMode::create()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_is_structured_file() {
    let (temp, files) = setup_files();
    let container = file_path(&temp, "a.stg");
    drop(files.create(Some(&container), AccessMode::create(), 512).unwrap());
    let text = file_path(&temp, "b.txt");
    fs::write(&text, b"hello").unwrap();

    assert!(RootFile::is_structured_file(&container).unwrap());
    assert!(!RootFile::is_structured_file(&text).unwrap());
    assert_eq!(
        RootFile::is_structured_file(&file_path(&temp, "none"))
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}

// =============================================================================
// Mode Compatibility Tests
// =============================================================================

#[test]
fn test_exclusive_transacted_writer_rejected() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "a.stg");
    let mode = AccessMode::create().with_transaction(Transaction::Transacted);

    let err = files.create(Some(&path), mode, 512).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(!path.exists());
}

#[test]
fn test_direct_shared_writer_rejected() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "a.stg");
    let mode = AccessMode::create().with_sharing(Sharing::DenyNone);

    let err = files.create(Some(&path), mode, 512).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

// =============================================================================
// Sharing Tests
// =============================================================================

#[test]
fn test_exclusive_root_blocks_second_open() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "a.stg");
    let _root = files.create(Some(&path), AccessMode::create(), 512).unwrap();

    let err = files.open(&path, AccessMode::read()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SharingViolation);
}

#[test]
fn test_dropping_root_releases_file() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "a.stg");
    let root = files.create(Some(&path), AccessMode::create(), 512).unwrap();
    drop(root);

    files.open(&path, AccessMode::read_write()).unwrap();
}

#[test]
fn test_deny_write_admits_readers_but_one_writer() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "a.stg");
    let _writer = files.create(Some(&path), transacted_writer(), 512).unwrap();

    let _reader_a = files.open(&path, AccessMode::read()).unwrap();
    let _reader_b = files.open(&path, AccessMode::read()).unwrap();

    let second_writer = AccessMode::read_write()
        .transacted()
        .with_sharing(Sharing::DenyWrite);
    let err = files.open(&path, second_writer).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SharingViolation);
}

#[test]
fn test_deny_none_cap() {
    let temp = TempDir::new().unwrap();
    let files = RootFile::new(
        Config::builder()
            .temp_dir(temp.path())
            .max_shared_roots(2)
            .sync_on_commit(false)
            .build(),
    );
    let path = file_path(&temp, "a.stg");
    drop(files.create(Some(&path), AccessMode::create(), 512).unwrap());

    let shared = AccessMode::read()
        .with_sharing(Sharing::DenyNone)
        .with_intent(Intent::Read);
    let _a = files.open(&path, shared).unwrap();
    let _b = files.open(&path, shared).unwrap();

    let err = files.open(&path, shared).unwrap_err();
    assert!(matches!(err, StrataError::TooManyOpenRoots { limit: 2, .. }));
}

#[test]
fn test_shared_transacted_writers_detect_conflict() {
    let (temp, files) = setup_files();
    let path = file_path(&temp, "a.stg");
    drop(files.create(Some(&path), AccessMode::create(), 512).unwrap());

    let shared = AccessMode::read_write()
        .transacted()
        .with_sharing(Sharing::DenyNone);
    let first = files.open(&path, shared).unwrap();
    let second = files.open(&path, shared).unwrap();

    first.create_stream("A", AccessMode::create()).unwrap();
    first.commit(CommitConditions::OnlyIfCurrent).unwrap();

    second.create_stream("B", AccessMode::create()).unwrap();
    let err = second.commit(CommitConditions::OnlyIfCurrent).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommitConflict);

    // An unconditional commit wins
    second.commit(CommitConditions::Default).unwrap();
    drop((first, second));
    let root = files.open(&path, AccessMode::read()).unwrap();
    assert!(root.exists("B").unwrap());
    assert!(!root.exists("A").unwrap());
}

// =============================================================================
// Switch-To-File Tests
// =============================================================================

#[test]
fn test_switch_to_file_redirects_commits() {
    let (temp, files) = setup_files();
    let old_path = file_path(&temp, "old.stg");
    let new_path = file_path(&temp, "new.stg");

    let root = files.create(Some(&old_path), transacted_writer(), 512).unwrap();
    root.create_storage("Committed", AccessMode::create()).unwrap();
    root.commit(CommitConditions::Default).unwrap();
    root.create_storage("Pending", AccessMode::create()).unwrap();

    let switched = files.switch_to_file(&root, Some(&new_path)).unwrap();
    assert_eq!(switched, new_path);
    assert_eq!(root.file_path().unwrap(), new_path);

    root.commit(CommitConditions::Default).unwrap();
    drop(root);

    let old = files.open(&old_path, AccessMode::read()).unwrap();
    assert!(old.exists("Committed").unwrap());
    assert!(!old.exists("Pending").unwrap());

    let new = files.open(&new_path, AccessMode::read()).unwrap();
    assert!(new.exists("Committed").unwrap());
    assert!(new.exists("Pending").unwrap());
}

#[test]
fn test_switch_to_auto_named_file() {
    let (temp, files) = setup_files();
    let root = files
        .create(Some(&file_path(&temp, "a.stg")), AccessMode::create(), 512)
        .unwrap();
    root.create_stream("S", AccessMode::create()).unwrap();

    let switched = root.switch_to_file(None).unwrap();

    assert!(switched.starts_with(temp.path()));
    assert!(RootFile::is_structured_file(&switched).unwrap());
}

#[test]
fn test_switch_to_file_requires_root() {
    let (temp, files) = setup_files();
    let root = files
        .create(Some(&file_path(&temp, "a.stg")), AccessMode::create(), 512)
        .unwrap();
    let child = root.create_storage("Child", AccessMode::create()).unwrap();

    let err = child
        .switch_to_file(Some(&file_path(&temp, "b.stg")))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}
