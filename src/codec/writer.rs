//! Dump writer
//!
//! Renders a table as the line-oriented dump format.

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{HashError, Result};
use crate::table::Table;

use super::keys::escape_key_into;
use super::{BASE64_CHUNK, BASE64_TAG, EMPTY_KEY, MAX_TEXT_LINE};

/// Whether `key` can be written: NUL-terminated with no other NUL
pub fn is_good_key(key: &[u8]) -> bool {
    match key.split_last() {
        Some((0, rest)) => !rest.contains(&0),
        _ => false,
    }
}

/// Whether `data` has to be written as base64.
///
/// A value is text only if it ends in a NUL, every byte before that NUL is
/// printable ASCII or ASCII whitespace, and no line is longer than
/// `MAX_TEXT_LINE` bytes.
pub fn is_binary_field(data: &[u8]) -> bool {
    let len = data.len();
    let mut last_newline = 0;
    let mut i = 0;

    while i + 1 < len {
        let byte = data[i];
        if !(is_print(byte) || is_space(byte)) {
            return true;
        }
        if byte == b'\n' {
            if i - last_newline > MAX_TEXT_LINE {
                return true;
            }
            last_newline = i;
        }
        i += 1;
    }

    (len > 0 && data[len - 1] != 0) || i - last_newline > MAX_TEXT_LINE
}

#[inline]
fn is_print(byte: u8) -> bool {
    (0x20..=0x7e).contains(&byte)
}

#[inline]
fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

/// Write every record of `table` to `out`.
///
/// The empty key goes first as a bare blob. The remaining keys are written in
/// byte order. A key that fails `is_good_key` aborts the write with
/// `HashError::MalformedKey`; whatever was already written is unusable.
pub fn to_stream<T, W>(table: &mut T, out: &mut W) -> Result<()>
where
    T: Table + ?Sized,
    W: Write,
{
    if let Ok(value) = table.fetch(EMPTY_KEY) {
        if !blob_reads_back(value) {
            tracing::warn!(len = value.len(), "empty key value will not read back intact");
        }
        let blob = value.strip_suffix(&[0]).unwrap_or(value);
        out.write_all(blob)?;
        out.write_all(b"\n")?;
    }

    let mut keys: Vec<Vec<u8>> = Vec::new();
    let mut entry = table.first();
    while let Some(current) = entry {
        if current.key != EMPTY_KEY {
            if !is_good_key(current.key) {
                let key = String::from_utf8_lossy(current.key).into_owned();
                tracing::warn!(key = %key.escape_debug(), "refusing to write malformed key");
                return Err(HashError::MalformedKey(format!(
                    "{:?} is not a NUL-terminated string",
                    key
                )));
            }
            keys.push(current.key.to_vec());
        }
        entry = table.next();
    }
    keys.sort_unstable();

    for key in &keys {
        let value = table.fetch(key)?;
        write_field(out, key, value)?;
    }

    tracing::debug!(records = keys.len(), "wrote table dump");
    Ok(())
}

/// Whether the empty key's value survives as an unescaped leading blob.
///
/// It must be NUL-terminated text with no other NUL, must not open with a
/// blank line, and no line of it may start with `@`.
fn blob_reads_back(value: &[u8]) -> bool {
    match value.split_last() {
        Some((0, text)) => {
            !text.is_empty()
                && text[0] != b'\n'
                && !text.contains(&0)
                && !text.split(|&b| b == b'\n').any(|line| line.first() == Some(&b'@'))
        }
        _ => false,
    }
}

/// Write one header line and its value lines
fn write_field<W: Write>(out: &mut W, key: &[u8], value: &[u8]) -> Result<()> {
    let mut header = Vec::with_capacity(key.len() + 16);
    header.push(b'@');
    escape_key_into(key.strip_suffix(&[0]).unwrap_or(key), &mut header);

    if is_binary_field(value) {
        header.extend_from_slice(BASE64_TAG);
        header.push(b'\n');
        out.write_all(&header)?;

        for chunk in value.chunks(BASE64_CHUNK) {
            out.write_all(STANDARD.encode(chunk).as_bytes())?;
            out.write_all(b"\n")?;
        }
    } else if !value.is_empty() {
        header.push(b'\n');
        out.write_all(&header)?;

        // text values end in their single NUL
        let text = &value[..value.len() - 1];
        for line in text.split_inclusive(|&b| b == b'\n') {
            if line.first() == Some(&b'@') {
                out.write_all(b"@")?;
            }
            out.write_all(line)?;
        }
    } else {
        out.write_all(&header)?;
    }

    out.write_all(b"\n")?;
    Ok(())
}
