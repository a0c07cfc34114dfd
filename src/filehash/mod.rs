//! FileHash Module
//!
//! File-backed table: every mutation is appended to an operation log, and
//! the log is replayed into an in-memory table on open.
//!
//! ## Responsibilities
//! - Same `Table` behaviour as `MemHash`, persisted across open/close
//! - CRC32 checksums to find a damaged log tail
//! - Truncate a damaged tail when opened writable
//! - Compaction down to one record per live key
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Header: Magic "KVHL" (4) │ Version (2)  │
//! ├─────────────────────────────────────────┤
//! │ Frame 1                                 │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ CRC (4) │ Len (4) │ bincode record  │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Frame 2 ...                             │
//! └─────────────────────────────────────────┘
//! ```

mod oplog;
mod table;

pub use oplog::{LogRecord, RecoveryResult, FRAME_HEADER_SIZE, HEADER_SIZE, MAGIC, VERSION};
pub use table::FileHash;
