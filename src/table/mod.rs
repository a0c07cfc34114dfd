//! Table Module
//!
//! The uniform interface every backend implements.
//!
//! ## Responsibilities
//! - `Table`: the per-backend operation set (fetch/store/insert/delete and
//!   the first/next walk), object safe so callers can hold `Box<dyn Table>`
//! - Backend selection at creation/open time through `HashKind`
//! - Typed helpers for common key/value shapes (`TableExt`)
//!
//! ## Backends
//! | kind     | new | open | count  | last/prev |
//! |----------|-----|------|--------|-----------|
//! | `Memory` | yes | no   | O(1)   | no        |
//! | `File`   | yes | yes  | scan   | no        |

mod typed;

use std::path::Path;

use crate::config::{Config, OpenFlags};
use crate::error::{HashError, Result};
use crate::filehash::FileHash;
use crate::memhash::MemHash;

pub use typed::{str_key, TableExt};

/// A borrowed view of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
}

impl Entry<'_> {
    /// Copy the record out of the table
    pub fn into_owned(self) -> (Vec<u8>, Vec<u8>) {
        (self.key.to_vec(), self.value.to_vec())
    }
}

/// Value handed to `store`/`insert`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    /// Copy these bytes
    Bytes(&'a [u8]),

    /// Reserve this many zero bytes
    Zeroed(usize),
}

impl Value<'_> {
    pub fn len(&self) -> usize {
        match self {
            Value::Bytes(bytes) => bytes.len(),
            Value::Zeroed(len) => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `dst`, which must be exactly `self.len()` bytes
    pub(crate) fn write_into(&self, dst: &mut [u8]) {
        match self {
            Value::Bytes(bytes) => dst.copy_from_slice(bytes),
            Value::Zeroed(_) => dst.fill(0),
        }
    }

    /// Materialize the value as owned bytes
    pub fn to_vec(&self) -> Vec<u8> {
        match self {
            Value::Bytes(bytes) => bytes.to_vec(),
            Value::Zeroed(len) => vec![0; *len],
        }
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Value::Bytes(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Value<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Value::Bytes(bytes)
    }
}

/// Operations shared by every table backend
///
/// Returned slices borrow the table and stay valid until the next call that
/// takes `&mut self`.
pub trait Table {
    /// Backend name used in error messages
    fn name(&self) -> &'static str;

    /// Value stored under `key`, or `HashError::NotFound`
    fn fetch(&mut self, key: &[u8]) -> Result<&[u8]>;

    /// Add or replace the value under `key`
    fn store(&mut self, key: &[u8], value: Value<'_>) -> Result<&[u8]>;

    /// Add `key` only if absent, else `HashError::AlreadyExists` with
    /// `current` showing the existing record
    fn insert(&mut self, key: &[u8], value: Value<'_>) -> Result<&[u8]>;

    /// Remove `key`, or `HashError::NotFound`
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Restart the walk and return the first record
    fn first(&mut self) -> Option<Entry<'_>>;

    /// Next record of the walk, `None` once exhausted
    fn next(&mut self) -> Option<Entry<'_>>;

    /// Start a reverse walk
    fn last(&mut self) -> Result<Option<Entry<'_>>> {
        Err(HashError::Unsupported(self.name()))
    }

    /// Continue a reverse walk
    fn prev(&mut self) -> Result<Option<Entry<'_>>> {
        Err(HashError::Unsupported(self.name()))
    }

    /// Number of records. Backends without a counter walk the whole table.
    fn count(&mut self) -> usize {
        if self.first().is_none() {
            return 0;
        }
        let mut count = 1;
        while self.next().is_some() {
            count += 1;
        }
        count
    }

    /// The record touched by the last successful operation, if any
    fn current(&self) -> Option<Entry<'_>>;

    /// Flush whatever the backend buffers and release the table
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Which backend a table uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    /// `MemHash`
    Memory,

    /// `FileHash`
    File,
}

/// Create an empty table of the given kind
pub fn create(kind: HashKind, config: &Config) -> Result<Box<dyn Table>> {
    config.validate()?;
    let table: Box<dyn Table> = match kind {
        HashKind::Memory => Box::new(MemHash::with_config(config)),
        HashKind::File => Box::new(FileHash::with_config(config)),
    };
    Ok(table)
}

/// Open a table stored at `path`
pub fn open(
    kind: HashKind,
    path: &Path,
    flags: &OpenFlags,
    config: &Config,
) -> Result<Box<dyn Table>> {
    match kind {
        HashKind::Memory => Err(HashError::Unsupported("memory")),
        HashKind::File => Ok(Box::new(FileHash::open(path, flags, config)?)),
    }
}

/// Call `f` on every record of `table`; does nothing for `None`
pub fn each<T, F>(table: Option<&mut T>, mut f: F)
where
    T: Table + ?Sized,
    F: FnMut(Entry<'_>),
{
    let Some(table) = table else {
        return;
    };
    let mut entry = table.first();
    while let Some(current) = entry {
        f(current);
        entry = table.next();
    }
}
