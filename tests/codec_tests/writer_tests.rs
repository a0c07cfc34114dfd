//! Dump Writer Tests
//!
//! Tests verify:
//! - Exact output for text, empty and binary values
//! - Records come out sorted by key, after the leading blob
//! - Malformed keys abort the write
//! - File output and set terminators

use kvhash::codec::{self, to_bytes, to_file, write_set_terminator};
use kvhash::{HashError, MemHash, TableExt, Value};
use tempfile::TempDir;

fn dump(table: &mut MemHash) -> String {
    String::from_utf8(to_bytes(table).unwrap()).unwrap()
}

// =============================================================================
// Record Layout Tests
// =============================================================================

#[test]
fn test_text_records_sorted() {
    let mut table = MemHash::new();
    table.store_str("zebra", Some("last")).unwrap();
    table.store_str("apple", Some("first\nsecond")).unwrap();
    table.store_str("mango", None).unwrap();

    assert_eq!(
        dump(&mut table),
        "@apple\nfirst\nsecond\n@mango\n@zebra\nlast\n"
    );
}

#[test]
fn test_empty_string_value() {
    let mut table = MemHash::new();
    table.store_str("k", Some("")).unwrap();
    assert_eq!(dump(&mut table), "@k\n\n");
}

#[test]
fn test_key_escaping_in_header() {
    let mut table = MemHash::new();
    table.store_str("two words", Some("v")).unwrap();
    table.store_str("a=b&c", Some("v")).unwrap();
    table.store_str("100%", Some("v")).unwrap();

    assert_eq!(
        dump(&mut table),
        "@100%25\nv\n@a%3db%26c\nv\n@two+words\nv\n"
    );
}

#[test]
fn test_at_lines_are_doubled() {
    let mut table = MemHash::new();
    table.store_str("mail", Some("@home\nnot@start\n@@twice")).unwrap();
    assert_eq!(dump(&mut table), "@mail\n@@home\nnot@start\n@@@twice\n");
}

#[test]
fn test_binary_value_is_base64() {
    let mut table = MemHash::new();
    table.store(b"bin\0", Value::Bytes(&[0, 1, 2, 3])).unwrap();
    assert_eq!(dump(&mut table), "@bin base64\nAAECAw==\n\n");
}

#[test]
fn test_unterminated_text_is_base64() {
    let mut table = MemHash::new();
    table.store(b"raw\0", Value::Bytes(b"abc")).unwrap();
    assert_eq!(dump(&mut table), "@raw base64\nYWJj\n\n");
}

#[test]
fn test_leading_blob_comes_first() {
    let mut table = MemHash::new();
    table.store_str("a", Some("x")).unwrap();
    table.store_str("", Some("free text\nblob")).unwrap();
    assert_eq!(dump(&mut table), "free text\nblob\n@a\nx\n");
}

#[test]
fn test_blob_with_at_line_reads_back_as_records() {
    let mut table = MemHash::new();
    table.store_str("", Some("intro\n@notakey")).unwrap();
    let bytes = to_bytes(&mut table).unwrap();
    assert_eq!(bytes, b"intro\n@notakey\n");

    // the blob is not escaped, so its `@` line becomes a header
    let mut back = MemHash::new();
    let summary = codec::read_into(&mut back, &mut std::io::Cursor::new(bytes)).unwrap();
    assert_eq!(summary.records, 2);
    assert_eq!(back.fetch(b"\0").unwrap(), b"intro\0");
    assert_eq!(back.fetch(b"notakey\0").unwrap(), b"");
}

#[test]
fn test_empty_table_writes_nothing() {
    let mut table = MemHash::new();
    assert_eq!(dump(&mut table), "");
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_malformed_key_aborts() {
    let mut table = MemHash::new();
    table.store_str("fine", Some("v")).unwrap();
    table.store(b"nonterm", Value::Bytes(b"v\0")).unwrap();

    let err = to_bytes(&mut table).unwrap_err();
    assert!(matches!(err, HashError::MalformedKey(_)));
}

#[test]
fn test_interior_nul_key_aborts() {
    let mut table = MemHash::new();
    table.store(b"a\0b\0", Value::Bytes(b"v\0")).unwrap();
    assert!(matches!(
        to_bytes(&mut table),
        Err(HashError::MalformedKey(_))
    ));
}

// =============================================================================
// Stream / File Tests
// =============================================================================

#[test]
fn test_to_file_writes_dump() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dump.txt");

    let mut table = MemHash::new();
    table.store_str("k", Some("v")).unwrap();
    to_file(&mut table, &path).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "@k\nv\n");
}

#[test]
fn test_sets_with_terminators() {
    let mut first = MemHash::new();
    first.store_str("one", Some("1")).unwrap();
    let mut second = MemHash::new();
    second.store_str("two", Some("2")).unwrap();

    let mut out = Vec::new();
    codec::to_stream(&mut first, &mut out).unwrap();
    write_set_terminator(&mut out).unwrap();
    codec::to_stream(&mut second, &mut out).unwrap();
    write_set_terminator(&mut out).unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "@one\n1\n@\n@two\n2\n@\n"
    );
}
