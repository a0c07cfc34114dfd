//! # kvhash
//!
//! Key/value hash tables behind one interface, with:
//! - An in-memory chained hash table with raw byte keys and values
//! - A file-backed table persisted as a checksummed operation log
//! - Typed helpers for string, integer, handle and set-style tables
//! - A line-oriented, base64-capable text dump format
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Callers / kvdump binary                      │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//! ┌──────────────▼──────────────┐  ┌────────────▼───────────────┐
//! │        Table trait          │◄─┤           Codec            │
//! │   (+ TableExt helpers)      │  │  (text dump read / write)  │
//! └──────┬───────────────┬──────┘  └────────────────────────────┘
//!        │               │
//!        ▼               ▼
//! ┌─────────────┐  ┌─────────────┐
//! │   MemHash   │◄─┤  FileHash   │
//! │  (chained)  │  │ (op log)    │
//! └─────────────┘  └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod memhash;
pub mod table;
pub mod filehash;
pub mod codec;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{HashError, Result};
pub use config::{Config, OpenFlags, SyncStrategy};
pub use memhash::MemHash;
pub use filehash::FileHash;
pub use table::{create, each, open, str_key, Entry, HashKind, Table, TableExt, Value};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvhash
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
