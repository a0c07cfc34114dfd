//! FileHash Tests
//!
//! Tests verify:
//! - Records survive close and reopen
//! - Deletes and overwrites are replayed in order
//! - A damaged log tail is discarded (and cut off when writable)
//! - Read-only tables refuse writes
//! - Compaction keeps contents and shrinks the file
//! - Open flag handling (create, truncate, bad combinations)

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use kvhash::config::{Config, OpenFlags, SyncStrategy};
use kvhash::filehash::{FileHash, HEADER_SIZE, MAGIC};
use kvhash::{HashError, Table, TableExt, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_table() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.kvh");
    (temp_dir, path)
}

fn config() -> Config {
    Config::builder()
        .sync_strategy(SyncStrategy::EveryWrite)
        .build()
}

fn open_rw(path: &Path) -> FileHash {
    FileHash::open(path, &OpenFlags::create(), &config()).unwrap()
}

fn fill(table: &mut FileHash, count: usize) {
    for i in 0..count {
        table
            .store(
                format!("key{}\0", i).as_bytes(),
                Value::Bytes(format!("value{}\0", i).as_bytes()),
            )
            .unwrap();
    }
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_new_file_has_header_only() {
    let (_dir, path) = setup_temp_table();
    let table = open_rw(&path);
    drop(table);

    let data = fs::read(&path).unwrap();
    assert_eq!(data.len(), HEADER_SIZE);
    assert_eq!(&data[..4], MAGIC);
}

#[test]
fn test_reopen_sees_records() {
    let (_dir, path) = setup_temp_table();
    {
        let mut table = open_rw(&path);
        fill(&mut table, 50);
        Box::new(table).close().unwrap();
    }

    let mut table = open_rw(&path);
    assert_eq!(Table::count(&mut table), 50);
    for i in 0..50 {
        assert_eq!(
            table.fetch(format!("key{}\0", i).as_bytes()).unwrap(),
            format!("value{}\0", i).as_bytes()
        );
    }
    assert_eq!(table.recovery().records_applied, 50);
    assert_eq!(table.recovery().bytes_discarded, 0);
}

#[test]
fn test_reopen_replays_deletes_and_overwrites() {
    let (_dir, path) = setup_temp_table();
    {
        let mut table = open_rw(&path);
        table.store(b"a\0", Value::Bytes(b"1\0")).unwrap();
        table.store(b"b\0", Value::Bytes(b"2\0")).unwrap();
        table.store(b"a\0", Value::Bytes(b"3\0")).unwrap();
        table.delete(b"b\0").unwrap();
        table.sync().unwrap();
    }

    let mut table = open_rw(&path);
    assert_eq!(table.fetch(b"a\0").unwrap(), b"3\0");
    assert!(table.fetch(b"b\0").unwrap_err().is_not_found());
    assert_eq!(table.recovery().records_applied, 4);
}

#[test]
fn test_failed_operations_are_not_logged() {
    let (_dir, path) = setup_temp_table();
    {
        let mut table = open_rw(&path);
        table.insert(b"k\0", Value::Bytes(b"first\0")).unwrap();
        assert!(table.insert(b"k\0", Value::Bytes(b"second\0")).unwrap_err().is_already_exists());
        assert!(table.delete(b"missing\0").unwrap_err().is_not_found());
        table.sync().unwrap();
    }

    let table = open_rw(&path);
    assert_eq!(table.recovery().records_applied, 1);
}

#[test]
fn test_typed_helpers_persist() {
    let (_dir, path) = setup_temp_table();
    {
        let mut table = open_rw(&path);
        table.store_int("n", 99).unwrap();
        table.bump("c").unwrap();
        table.bump("c").unwrap();
        table.sync().unwrap();
    }

    let mut table = open_rw(&path);
    assert_eq!(table.fetch_int("n").unwrap(), 99);
    assert_eq!(table.bump("c").unwrap(), 3);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_damaged_tail_is_truncated() {
    let (_dir, path) = setup_temp_table();
    {
        let mut table = open_rw(&path);
        fill(&mut table, 10);
        table.sync().unwrap();
    }
    let intact = fs::metadata(&path).unwrap().len();

    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xde, 0xad, 0xbe, 0xef, 0x10, 0x00]).unwrap();
    }

    let mut table = open_rw(&path);
    assert_eq!(table.recovery().records_applied, 10);
    assert_eq!(table.recovery().valid_len, intact);
    assert_eq!(table.recovery().bytes_discarded, 6);
    assert!(table.recovery().was_truncated);
    assert_eq!(fs::metadata(&path).unwrap().len(), intact);

    // appends after recovery land on the intact prefix
    table.store(b"after\0", Value::Bytes(b"x\0")).unwrap();
    table.sync().unwrap();
    drop(table);

    let mut table = open_rw(&path);
    assert_eq!(table.recovery().records_applied, 11);
    assert_eq!(table.fetch(b"after\0").unwrap(), b"x\0");
}

#[test]
fn test_read_only_leaves_damaged_tail() {
    let (_dir, path) = setup_temp_table();
    {
        let mut table = open_rw(&path);
        fill(&mut table, 3);
        table.sync().unwrap();
    }
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"junk").unwrap();
    }
    let damaged = fs::metadata(&path).unwrap().len();

    let table = FileHash::open(&path, &OpenFlags::read_only(), &config()).unwrap();
    assert_eq!(table.recovery().bytes_discarded, 4);
    assert!(!table.recovery().was_truncated);
    assert_eq!(fs::metadata(&path).unwrap().len(), damaged);
}

#[test]
fn test_bad_magic_is_corrupt() {
    let (_dir, path) = setup_temp_table();
    fs::write(&path, b"not a log file").unwrap();

    let result = FileHash::open(&path, &OpenFlags::read_write(), &config());
    assert!(matches!(result, Err(HashError::Corrupt(_))));
}

#[test]
fn test_partial_header_is_rewritten() {
    let (_dir, path) = setup_temp_table();
    fs::write(&path, &MAGIC[..3]).unwrap();

    let mut table = open_rw(&path);
    assert_eq!(table.count(), 0);
    assert_eq!(table.recovery().bytes_discarded, 3);
    assert!(table.recovery().was_truncated);
    assert_eq!(fs::metadata(&path).unwrap().len(), HEADER_SIZE as u64);

    table.store(b"after\0", Value::Bytes(b"crash\0")).unwrap();
    drop(table);

    let mut table = open_rw(&path);
    assert_eq!(table.fetch(b"after\0").unwrap(), b"crash\0");
}

#[test]
fn test_read_only_partial_header_is_empty() {
    let (_dir, path) = setup_temp_table();
    fs::write(&path, &MAGIC[..2]).unwrap();

    let mut table = FileHash::open(&path, &OpenFlags::read_only(), &config()).unwrap();
    assert_eq!(table.count(), 0);
    assert!(!table.recovery().was_truncated);
    assert_eq!(fs::read(&path).unwrap(), &MAGIC[..2]);
}

#[test]
fn test_short_file_with_wrong_bytes_is_corrupt() {
    let (_dir, path) = setup_temp_table();
    fs::write(&path, b"KVX").unwrap();

    let result = FileHash::open(&path, &OpenFlags::read_write(), &config());
    assert!(matches!(result, Err(HashError::Corrupt(_))));
}

// =============================================================================
// Open Flag Tests
// =============================================================================

#[test]
fn test_open_missing_without_create() {
    let (_dir, path) = setup_temp_table();
    let result = FileHash::open(&path, &OpenFlags::read_write(), &config());
    assert!(matches!(result, Err(HashError::Io(_))));
}

#[test]
fn test_truncate_discards_contents() {
    let (_dir, path) = setup_temp_table();
    {
        let mut table = open_rw(&path);
        fill(&mut table, 5);
    }

    let mut table =
        FileHash::open(&path, &OpenFlags::read_write().truncate(true), &config()).unwrap();
    assert_eq!(Table::count(&mut table), 0);
    drop(table);
    assert_eq!(fs::metadata(&path).unwrap().len(), HEADER_SIZE as u64);
}

#[test]
fn test_read_only_rejects_create_and_truncate() {
    let (_dir, path) = setup_temp_table();
    let flags = OpenFlags::read_only().truncate(true);
    assert!(matches!(
        FileHash::open(&path, &flags, &config()),
        Err(HashError::Config(_))
    ));
}

#[test]
fn test_read_only_refuses_writes() {
    let (_dir, path) = setup_temp_table();
    {
        let mut table = open_rw(&path);
        fill(&mut table, 2);
    }

    let mut table = FileHash::open(&path, &OpenFlags::read_only(), &config()).unwrap();
    assert!(table.is_read_only());
    assert!(matches!(
        table.store(b"k\0", Value::Bytes(b"v\0")),
        Err(HashError::ReadOnly)
    ));
    assert!(matches!(table.delete(b"key0\0"), Err(HashError::ReadOnly)));
    assert!(matches!(table.compact(), Err(HashError::ReadOnly)));
    assert_eq!(table.fetch(b"key0\0").unwrap(), b"value0\0");
}

#[cfg(unix)]
#[test]
fn test_create_applies_mode() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, path) = setup_temp_table();
    let table = FileHash::open(&path, &OpenFlags::create().mode(0o600), &config()).unwrap();
    drop(table);

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

// =============================================================================
// Compaction Tests
// =============================================================================

#[test]
fn test_compact_shrinks_log() {
    let (_dir, path) = setup_temp_table();
    let mut table = open_rw(&path);
    for round in 0..20 {
        table
            .store(b"hot\0", Value::Bytes(format!("{}\0", round).as_bytes()))
            .unwrap();
    }
    fill(&mut table, 5);
    table.delete(b"key4\0").unwrap();
    table.sync().unwrap();
    let before = fs::metadata(&path).unwrap().len();

    table.compact().unwrap();
    let after = fs::metadata(&path).unwrap().len();
    assert!(after < before);

    // the compacted log keeps accepting appends
    table.store(b"late\0", Value::Bytes(b"1\0")).unwrap();
    table.sync().unwrap();
    drop(table);

    let mut table = open_rw(&path);
    assert_eq!(table.recovery().records_applied, 6);
    assert_eq!(table.fetch(b"hot\0").unwrap(), b"19\0");
    assert_eq!(table.fetch(b"late\0").unwrap(), b"1\0");
    assert!(table.fetch(b"key4\0").is_err());
}

#[test]
fn test_compact_table_named_like_temp_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.compact");
    let mut table = open_rw(&path);
    fill(&mut table, 4);
    table.compact().unwrap();
    table.store(b"late\0", Value::Bytes(b"1\0")).unwrap();
    drop(table);

    let mut table = open_rw(&path);
    assert_eq!(table.count(), 5);
    assert_eq!(table.fetch(b"key3\0").unwrap(), b"value3\0");
    assert_eq!(table.fetch(b"late\0").unwrap(), b"1\0");

    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("data.compact")]);
}

#[test]
fn test_anonymous_table_has_no_file() {
    let mut table = FileHash::new();
    assert!(table.path().is_none());
    table.store(b"k", Value::Bytes(b"v")).unwrap();
    table.compact().unwrap();
    table.sync().unwrap();
    assert_eq!(table.fetch(b"k").unwrap(), b"v");
}
