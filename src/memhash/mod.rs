//! MemHash Module
//!
//! In-memory open-chaining hash table.
//!
//! ## Responsibilities
//! - Byte-exact keys and values of any length (including embedded NULs)
//! - Amortized O(1) fetch/insert/store/delete
//! - Doubling growth ("split") before the load factor reaches 1.0
//! - Stateful first/next walk plus a borrowing iterator
//!
//! ## Layout
//! ```text
//! buckets (power of two)
//! ┌───┬───┬───┬───┬─────┐
//! │ 0 │ 1 │ 2 │ 3 │ ... │
//! └─┬─┴───┴─┬─┴───┴─────┘
//!   │       │
//!   ▼       ▼
//! ┌──────────────────────────────────────────┐
//! │ Record: next │ klen │ vlen │ key │pad│ val │
//! └──────┬───────────────────────────────────┘
//!        ▼
//!      (next record in the same bucket, newest first)
//! ```

mod iter;
mod record;
mod table;

pub use iter::Iter;
pub use record::value_offset;
pub use table::{MemHash, DEFAULT_BUCKETS};

/// Bucket hash over the raw key bytes
#[inline]
pub(crate) fn hash_key(key: &[u8]) -> u32 {
    crc32fast::hash(key)
}
