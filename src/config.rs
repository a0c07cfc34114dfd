//! Configuration for kvhash
//!
//! Centralized configuration with sensible defaults.

use crate::error::{HashError, Result};

/// Configuration shared by every table backend
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Memory Table Configuration
    // -------------------------------------------------------------------------
    /// Number of buckets a new table starts with (rounded up to a power of two)
    pub initial_buckets: usize,

    // -------------------------------------------------------------------------
    // File Table Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the operation log
    pub sync_strategy: SyncStrategy,
}

/// Operation log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every mutation (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced mutations
    EveryNWrites { count: usize },

    /// Only fsync when the table is closed
    OnClose,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_buckets: 64,
            sync_strategy: SyncStrategy::EveryNWrites { count: 64 },
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings no table can run with
    pub fn validate(&self) -> Result<()> {
        if self.initial_buckets == 0 {
            return Err(HashError::Config(
                "initial_buckets must be at least 1".to_string(),
            ));
        }
        if let SyncStrategy::EveryNWrites { count: 0 } = self.sync_strategy {
            return Err(HashError::Config(
                "sync count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Bucket count actually allocated: a power of two, never below 2
    pub fn bucket_count(&self) -> usize {
        self.initial_buckets.max(2).next_power_of_two()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the initial bucket count
    pub fn initial_buckets(mut self, count: usize) -> Self {
        self.config.initial_buckets = count;
        self
    }

    /// Set the log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// How a file-backed table is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    /// Refuse every mutation
    pub read_only: bool,

    /// Create the file if it does not exist
    pub create: bool,

    /// Discard existing contents
    pub truncate: bool,

    /// Permission bits for a newly created file (Unix only)
    pub mode: u32,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self::read_write()
    }
}

impl OpenFlags {
    /// Open an existing file for reading and writing
    pub fn read_write() -> Self {
        Self {
            read_only: false,
            create: false,
            truncate: false,
            mode: 0o644,
        }
    }

    /// Open an existing file without allowing mutations
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::read_write()
        }
    }

    /// Open for reading and writing, creating the file when missing
    pub fn create() -> Self {
        Self {
            create: true,
            ..Self::read_write()
        }
    }

    /// Discard whatever the file already holds
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Permission bits used when the file is created
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}
