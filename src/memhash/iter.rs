//! MemHash Iterator
//!
//! Walks buckets in index order and each chain newest first, without
//! touching the table's own first/next state.

use std::iter::FusedIterator;

use crate::table::Entry;

use super::record::{Link, Record};

/// Borrowing iterator over every record of a `MemHash`
pub struct Iter<'a> {
    buckets: &'a [Link],
    /// Next bucket to open once the current chain runs out
    bucket: usize,
    /// Next record in the current chain
    record: Option<&'a Record>,
    remaining: usize,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(buckets: &'a [Link], count: usize) -> Self {
        Self {
            buckets,
            bucket: 0,
            record: None,
            remaining: count,
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Entry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.record {
                self.record = record.next.as_deref();
                self.remaining = self.remaining.saturating_sub(1);
                return Some(Entry {
                    key: record.key(),
                    value: record.value(),
                });
            }

            let head = self.buckets.get(self.bucket)?;
            self.record = head.as_deref();
            self.bucket += 1;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FusedIterator for Iter<'_> {}
