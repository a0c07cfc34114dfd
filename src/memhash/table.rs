//! MemHash implementation
//!
//! Bucket array of singly linked chains, doubled when full.

use crate::config::Config;
use crate::error::{HashError, Result};
use crate::table::{Entry, Table, Value};

use super::hash_key;
use super::iter::Iter;
use super::record::{Link, Record};

/// Bucket count of a table created with `MemHash::new`
pub const DEFAULT_BUCKETS: usize = 64;

/// Location of a record: bucket index and distance from the chain head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    bucket: usize,
    depth: usize,
}

/// In-memory hash table
///
/// Keys and values are opaque byte strings. Lookups, inserts and deletes
/// take `&mut self` because they move the table's cursor (see `current`).
pub struct MemHash {
    /// Chain heads, length is always a power of two
    buckets: Vec<Link>,

    /// Number of records
    count: usize,

    /// Next record the first/next walk will visit
    walk: Position,

    /// Last record touched by fetch/insert/store/first/next
    cursor: Option<Position>,
}

impl MemHash {
    /// Create an empty table with the default bucket count
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// Create an empty table sized from `config`
    pub fn with_config(config: &Config) -> Self {
        Self::with_buckets(config.bucket_count())
    }

    fn with_buckets(count: usize) -> Self {
        let count = count.max(2).next_power_of_two();
        let mut buckets = Vec::with_capacity(count);
        buckets.resize_with(count, || None);

        Self {
            buckets,
            count: 0,
            walk: Position { bucket: 0, depth: 0 },
            cursor: None,
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Fetch the value stored under `key`, moving the cursor onto it.
    ///
    /// A miss clears the cursor and returns `HashError::NotFound`.
    pub fn fetch(&mut self, key: &[u8]) -> Result<&[u8]> {
        match self.locate(key) {
            Ok(pos) => {
                self.cursor = Some(pos);
                self.value_at(pos)
            }
            Err(_) => {
                self.cursor = None;
                Err(HashError::NotFound)
            }
        }
    }

    /// Mutable access to the value stored under `key`
    pub fn fetch_mut(&mut self, key: &[u8]) -> Result<&mut [u8]> {
        match self.locate(key) {
            Ok(pos) => {
                self.cursor = Some(pos);
                self.record_at_mut(pos)
                    .map(Record::value_mut)
                    .ok_or(HashError::NotFound)
            }
            Err(_) => {
                self.cursor = None;
                Err(HashError::NotFound)
            }
        }
    }

    /// Look up `key` without touching the cursor
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let pos = self.locate(key).ok()?;
        self.record_at(pos).map(Record::value)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.locate(key).is_ok()
    }

    /// The record touched by the last successful fetch/insert/store/walk step
    pub fn current(&self) -> Option<Entry<'_>> {
        let record = self.record_at(self.cursor?)?;
        Some(Entry {
            key: record.key(),
            value: record.value(),
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `key` only if it is not present.
    ///
    /// On `HashError::AlreadyExists` the cursor is left on the existing
    /// record so `current` shows what is already stored.
    pub fn insert(&mut self, key: &[u8], value: Value<'_>) -> Result<&[u8]> {
        match self.locate(key) {
            Ok(pos) => {
                self.cursor = Some(pos);
                Err(HashError::AlreadyExists)
            }
            Err(bucket) => {
                let pos = self.link_new(bucket, Record::new(key, value));
                self.value_at(pos)
            }
        }
    }

    /// Insert a zero-filled value of `len` bytes and hand it back for filling
    pub fn reserve(&mut self, key: &[u8], len: usize) -> Result<&mut [u8]> {
        self.insert(key, Value::Zeroed(len))?;
        let pos = self.cursor.ok_or(HashError::NotFound)?;
        self.record_at_mut(pos)
            .map(Record::value_mut)
            .ok_or(HashError::NotFound)
    }

    /// Add or replace the value under `key`.
    ///
    /// The existing record is reused when the new value fits in its buffer,
    /// otherwise a fresh record takes its place in the chain.
    pub fn store(&mut self, key: &[u8], value: Value<'_>) -> Result<&[u8]> {
        let pos = match self.locate(key) {
            Ok(pos) => {
                match self.record_at_mut(pos) {
                    Some(record) if record.fits(value.len()) => record.overwrite(value),
                    _ => self.replace(pos, Record::new(key, value)),
                }
                self.cursor = Some(pos);
                pos
            }
            Err(bucket) => self.link_new(bucket, Record::new(key, value)),
        };
        self.value_at(pos)
    }

    /// Remove `key`. Deleting the record just returned by `first`/`next`
    /// does not disturb the walk.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        match self.locate(key) {
            Ok(pos) => {
                self.unlink(pos);
                self.cursor = None;
                Ok(())
            }
            Err(_) => Err(HashError::NotFound),
        }
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Restart the walk and return the first record
    pub fn first(&mut self) -> Option<Entry<'_>> {
        self.walk = Position { bucket: 0, depth: 0 };
        self.next()
    }

    /// Continue the walk started by `first`.
    ///
    /// Buckets are visited in index order, each chain newest first. Once the
    /// walk is exhausted every further call returns `None`.
    pub fn next(&mut self) -> Option<Entry<'_>> {
        self.cursor = self.advance();
        self.current()
    }

    /// Borrowing iterator in the same order as `first`/`next`
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.buckets, self.count)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Current size of the bucket array
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn bucket_of(&self, key: &[u8]) -> usize {
        hash_key(key) as usize & (self.buckets.len() - 1)
    }

    /// Position of `key`, or the bucket it would go in
    fn locate(&self, key: &[u8]) -> std::result::Result<Position, usize> {
        let bucket = self.bucket_of(key);
        let mut link = &self.buckets[bucket];
        let mut depth = 0;

        while let Some(record) = link {
            if record.matches(key) {
                return Ok(Position { bucket, depth });
            }
            link = &record.next;
            depth += 1;
        }
        Err(bucket)
    }

    fn record_at(&self, pos: Position) -> Option<&Record> {
        let mut record = self.buckets.get(pos.bucket)?.as_deref()?;
        for _ in 0..pos.depth {
            record = record.next.as_deref()?;
        }
        Some(record)
    }

    fn record_at_mut(&mut self, pos: Position) -> Option<&mut Record> {
        let mut record = self.buckets.get_mut(pos.bucket)?.as_deref_mut()?;
        for _ in 0..pos.depth {
            record = record.next.as_deref_mut()?;
        }
        Some(record)
    }

    fn value_at(&self, pos: Position) -> Result<&[u8]> {
        self.record_at(pos)
            .map(Record::value)
            .ok_or(HashError::NotFound)
    }

    /// Push `record` on the head of `bucket`, growing the table if needed.
    /// Returns where the record ended up and leaves the cursor on it.
    fn link_new(&mut self, bucket: usize, mut record: Box<Record>) -> Position {
        let head = &mut self.buckets[bucket];
        record.next = head.take();
        *head = Some(record);
        self.count += 1;

        let mut pos = Position { bucket, depth: 0 };
        if self.count >= self.buckets.len() {
            // the record moves during the split, find it again afterwards
            let key = self.record_at(pos).map(|r| r.key().to_vec()).unwrap_or_default();
            self.split();
            if let Ok(moved) = self.locate(&key) {
                pos = moved;
            }
        }
        self.cursor = Some(pos);
        pos
    }

    /// Detach and free the record at `pos`
    fn unlink(&mut self, pos: Position) {
        let mut link = &mut self.buckets[pos.bucket];
        for _ in 0..pos.depth {
            match link {
                Some(record) => link = &mut record.next,
                None => return,
            }
        }

        if let Some(mut removed) = link.take() {
            *link = removed.next.take();
            self.count -= 1;

            // keep the walk pointing at the same successor
            if self.walk.bucket == pos.bucket && pos.depth < self.walk.depth {
                self.walk.depth -= 1;
            }
        }
    }

    /// Swap the record at `pos` for `fresh`, keeping its place in the chain
    fn replace(&mut self, pos: Position, mut fresh: Box<Record>) {
        let mut link = &mut self.buckets[pos.bucket];
        for _ in 0..pos.depth {
            match link {
                Some(record) => link = &mut record.next,
                None => return,
            }
        }

        if let Some(mut old) = link.take() {
            fresh.next = old.next.take();
            *link = Some(fresh);
        }
    }

    /// Position of the next record in the walk, advancing past it
    fn advance(&mut self) -> Option<Position> {
        while self.walk.bucket < self.buckets.len() {
            if self.record_at(self.walk).is_some() {
                let pos = self.walk;
                self.walk.depth += 1;
                return Some(pos);
            }
            self.walk = Position {
                bucket: self.walk.bucket + 1,
                depth: 0,
            };
        }
        None
    }

    /// Double the bucket array and rehash every record into it
    fn split(&mut self) {
        let old_len = self.buckets.len();
        let new_len = old_len << 1;
        let mask = new_len - 1;

        let mut buckets: Vec<Link> = Vec::with_capacity(new_len);
        buckets.resize_with(new_len, || None);

        for head in std::mem::take(&mut self.buckets) {
            let mut link = head;
            while let Some(mut record) = link {
                link = record.next.take();
                let slot = &mut buckets[hash_key(record.key()) as usize & mask];
                record.next = slot.take();
                *slot = Some(record);
            }
        }

        self.buckets = buckets;
        self.cursor = None;
        tracing::debug!(
            records = self.count,
            from = old_len,
            to = new_len,
            "memhash split"
        );
    }
}

impl Default for MemHash {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemHash {
    fn drop(&mut self) {
        // unlink chains one record at a time so long chains never recurse
        for head in self.buckets.iter_mut() {
            let mut link = head.take();
            while let Some(mut record) = link {
                link = record.next.take();
            }
        }
    }
}

impl std::fmt::Debug for MemHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemHash")
            .field("count", &self.count)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

impl<'a> IntoIterator for &'a MemHash {
    type Item = Entry<'a>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Table backend
// =============================================================================

impl Table for MemHash {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn fetch(&mut self, key: &[u8]) -> Result<&[u8]> {
        MemHash::fetch(self, key)
    }

    fn store(&mut self, key: &[u8], value: Value<'_>) -> Result<&[u8]> {
        MemHash::store(self, key, value)
    }

    fn insert(&mut self, key: &[u8], value: Value<'_>) -> Result<&[u8]> {
        MemHash::insert(self, key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        MemHash::delete(self, key)
    }

    fn first(&mut self) -> Option<Entry<'_>> {
        MemHash::first(self)
    }

    fn next(&mut self) -> Option<Entry<'_>> {
        MemHash::next(self)
    }

    fn count(&mut self) -> usize {
        self.count
    }

    fn current(&self) -> Option<Entry<'_>> {
        MemHash::current(self)
    }
}
