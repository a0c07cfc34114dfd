//! FileHash implementation
//!
//! A `MemHash` kept in step with an append-only operation log.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::{Config, OpenFlags, SyncStrategy};
use crate::error::{HashError, Result};
use crate::memhash::MemHash;
use crate::table::{Entry, Table, Value};

use super::oplog::{self, LogRecord, LogWriter, RecoveryResult};

/// File-backed table
///
/// Reads are served from memory. Writes go to the log first, then to memory.
/// A table made with `new`/`with_config` has no file and logs nothing.
pub struct FileHash {
    /// Current contents
    inner: MemHash,

    /// Appender for the backing file (None when anonymous or read-only)
    log: Option<LogWriter>,

    /// Backing file path
    path: Option<PathBuf>,

    read_only: bool,

    sync_strategy: SyncStrategy,

    /// What replay found when the file was opened
    recovery: RecoveryResult,
}

impl FileHash {
    /// Anonymous table with no backing file
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            inner: MemHash::with_config(config),
            log: None,
            path: None,
            read_only: false,
            sync_strategy: config.sync_strategy,
            recovery: RecoveryResult::default(),
        }
    }

    /// Open (or create, per `flags`) the table stored at `path`.
    ///
    /// On open:
    /// 1. Replay every intact log frame into memory
    /// 2. Cut off a damaged tail (writable tables only)
    /// 3. Position the appender at the end of the file
    pub fn open(path: &Path, flags: &OpenFlags, config: &Config) -> Result<Self> {
        config.validate()?;
        if flags.read_only && (flags.truncate || flags.create) {
            return Err(HashError::Config(
                "create/truncate need a writable table".to_string(),
            ));
        }

        let mut options = OpenOptions::new();
        options
            .read(true)
            .write(!flags.read_only)
            .create(flags.create);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(flags.mode);
        }
        let mut file = options.open(path)?;

        if flags.truncate {
            file.set_len(0)?;
        }

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let mut inner = MemHash::with_config(config);
        let header = oplog::file_header();
        let recovery = if data.len() < oplog::HEADER_SIZE && header.starts_with(&data) {
            // empty, or a header cut short before it reached the disk
            let mut result = RecoveryResult {
                bytes_discarded: data.len() as u64,
                ..RecoveryResult::default()
            };
            if !data.is_empty() {
                tracing::warn!(
                    path = %path.display(),
                    len = data.len(),
                    "partial log header, treating as empty"
                );
            }
            if !flags.read_only {
                file.set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
                file.write_all(&header)?;
                file.sync_data()?;
                result.was_truncated = !data.is_empty();
            }
            result
        } else {
            let (records, mut result) = oplog::replay(&data)?;
            for record in records {
                apply(&mut inner, record)?;
            }

            if result.bytes_discarded > 0 {
                tracing::warn!(
                    path = %path.display(),
                    valid_len = result.valid_len,
                    discarded = result.bytes_discarded,
                    "damaged log tail"
                );
                if !flags.read_only {
                    file.set_len(result.valid_len)?;
                    result.was_truncated = true;
                }
            }
            result
        };

        file.seek(SeekFrom::End(0))?;
        tracing::debug!(
            path = %path.display(),
            records = inner.count(),
            read_only = flags.read_only,
            "opened file table"
        );

        let log = if flags.read_only {
            None
        } else {
            Some(LogWriter::new(file, config.sync_strategy))
        };

        Ok(Self {
            inner,
            log,
            path: Some(path.to_path_buf()),
            read_only: flags.read_only,
            sync_strategy: config.sync_strategy,
            recovery,
        })
    }

    // =========================================================================
    // Table operations
    // =========================================================================

    pub fn fetch(&mut self, key: &[u8]) -> Result<&[u8]> {
        self.inner.fetch(key)
    }

    pub fn store(&mut self, key: &[u8], value: Value<'_>) -> Result<&[u8]> {
        self.writable()?;
        self.append(|| LogRecord::Store {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        self.inner.store(key, value)
    }

    pub fn insert(&mut self, key: &[u8], value: Value<'_>) -> Result<&[u8]> {
        self.writable()?;
        if self.inner.contains_key(key) {
            // reports AlreadyExists and moves the cursor onto the existing record
            return self.inner.insert(key, value);
        }
        self.append(|| LogRecord::Store {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        self.inner.insert(key, value)
    }

    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.writable()?;
        if !self.inner.contains_key(key) {
            return Err(HashError::NotFound);
        }
        self.append(|| LogRecord::Delete { key: key.to_vec() })?;
        self.inner.delete(key)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Flush buffered frames and fsync the backing file
    pub fn sync(&mut self) -> Result<()> {
        match self.log.as_mut() {
            Some(log) => log.sync(),
            None => Ok(()),
        }
    }

    /// Rewrite the backing file with one frame per live key.
    ///
    /// The new log is written beside the old one and renamed over it, so a
    /// failure part way leaves the old log untouched.
    pub fn compact(&mut self) -> Result<()> {
        self.writable()?;
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        self.sync()?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".compact.tmp");
        let tmp = PathBuf::from(tmp);
        let mut frames = 0u64;
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            writer.write_all(&oplog::file_header())?;
            for entry in self.inner.iter() {
                let frame = oplog::encode_frame(&LogRecord::Store {
                    key: entry.key.to_vec(),
                    value: entry.value.to_vec(),
                })?;
                writer.write_all(&frame)?;
                frames += 1;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        let file = OpenOptions::new().append(true).open(&path)?;
        self.log = Some(LogWriter::new(file, self.sync_strategy));
        tracing::debug!(path = %path.display(), frames, "compacted file table");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// What replay found when the table was opened
    pub fn recovery(&self) -> &RecoveryResult {
        &self.recovery
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn writable(&self) -> Result<()> {
        if self.read_only {
            Err(HashError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Log a mutation; the record is only built when there is a log
    fn append(&mut self, record: impl FnOnce() -> LogRecord) -> Result<()> {
        match self.log.as_mut() {
            Some(log) => log.append(&record()),
            None => Ok(()),
        }
    }
}

impl Default for FileHash {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FileHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHash")
            .field("path", &self.path)
            .field("read_only", &self.read_only)
            .field("inner", &self.inner)
            .finish()
    }
}

/// Apply a replayed record to the in-memory table
fn apply(table: &mut MemHash, record: LogRecord) -> Result<()> {
    match record {
        LogRecord::Store { key, value } => {
            table.store(&key, Value::Bytes(&value))?;
        }
        LogRecord::Delete { key } => match table.delete(&key) {
            Ok(()) | Err(HashError::NotFound) => {}
            Err(e) => return Err(e),
        },
    }
    Ok(())
}

// =============================================================================
// Table backend
// =============================================================================

impl Table for FileHash {
    fn name(&self) -> &'static str {
        "file"
    }

    fn fetch(&mut self, key: &[u8]) -> Result<&[u8]> {
        FileHash::fetch(self, key)
    }

    fn store(&mut self, key: &[u8], value: Value<'_>) -> Result<&[u8]> {
        FileHash::store(self, key, value)
    }

    fn insert(&mut self, key: &[u8], value: Value<'_>) -> Result<&[u8]> {
        FileHash::insert(self, key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        FileHash::delete(self, key)
    }

    fn first(&mut self) -> Option<Entry<'_>> {
        self.inner.first()
    }

    fn next(&mut self) -> Option<Entry<'_>> {
        self.inner.next()
    }

    fn current(&self) -> Option<Entry<'_>> {
        self.inner.current()
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.sync()
    }
}
