//! Codec Module
//!
//! Line-oriented text dump of a table. Text values stay readable, anything
//! else is written as base64.
//!
//! ## Responsibilities
//! - Decide per value between text and base64 lines
//! - Escape keys so a header line always parses back to the same key
//! - Decode a stream incrementally, one set at a time
//! - Keep several sets in one stream, separated by a lone `@`
//!
//! ## Dump Format
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ leading blob (value of the empty key)        │  optional
//! ├──────────────────────────────────────────────┤
//! │ @escaped+key                                 │  text record
//! │ first value line                             │
//! │ @@value line starting with @                 │
//! │                                              │  closes the record
//! ├──────────────────────────────────────────────┤
//! │ @escaped+key base64                          │  binary record
//! │ 64 base64 chars per 48 value bytes           │
//! │ ...                                          │
//! │                                              │
//! ├──────────────────────────────────────────────┤
//! │ @                                            │  end of set (optional)
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Keys are written without their trailing NUL and get it back on read. Text
//! values lose their trailing NUL on write and get it back on read; base64
//! values come back byte for byte. A record with an empty value is a header
//! line alone.

mod keys;
mod reader;
mod writer;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::table::Table;

pub use keys::{escape_key, unescape_key};
pub use reader::{read_into, DecodeState, Decoded, ReadSummary, StreamDecoder};
pub use writer::{is_binary_field, is_good_key, to_stream};

/// Value bytes per base64 line
pub const BASE64_CHUNK: usize = 48;

/// Longest text line before a value is written as base64
pub const MAX_TEXT_LINE: usize = 256;

/// Header suffix marking a base64 record
pub const BASE64_TAG: &[u8] = b" base64";

/// The empty string key; its value is the leading blob
pub const EMPTY_KEY: &[u8] = b"\0";

/// Write a lone `@` line, ending the current set
pub fn write_set_terminator<W: Write>(out: &mut W) -> Result<()> {
    out.write_all(b"@\n")?;
    Ok(())
}

/// Write `table` to `path`, replacing the file
pub fn to_file<T>(table: &mut T, path: &Path) -> Result<()>
where
    T: Table + ?Sized,
{
    let mut out = BufWriter::new(File::create(path)?);
    to_stream(table, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Write `table` into a byte buffer
pub fn to_bytes<T>(table: &mut T) -> Result<Vec<u8>>
where
    T: Table + ?Sized,
{
    let mut out = Vec::new();
    to_stream(table, &mut out)?;
    Ok(out)
}

/// Read one set from `reader`.
///
/// Records go into `table` when one is given. Otherwise a memory table is
/// created, and returned only if the set held at least one record.
pub fn from_stream<R: io::BufRead>(
    table: Option<Box<dyn Table>>,
    reader: &mut R,
) -> Result<Option<Box<dyn Table>>> {
    match table {
        Some(mut table) => {
            read_into(&mut *table, reader)?;
            Ok(Some(table))
        }
        None => {
            let mut fresh = crate::memhash::MemHash::new();
            let summary = read_into(&mut fresh, reader)?;
            Ok((summary.records > 0).then(|| Box::new(fresh) as Box<dyn Table>))
        }
    }
}

/// Read the first set stored at `path`.
///
/// A missing file is not an error: `table` comes back unchanged.
pub fn from_file(table: Option<Box<dyn Table>>, path: &Path) -> Result<Option<Box<dyn Table>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no dump file");
            return Ok(table);
        }
        Err(e) => return Err(e.into()),
    };
    from_stream(table, &mut BufReader::new(file))
}
