//! Operation log
//!
//! Frame encoding, the buffered appender and replay/recovery.

use std::fs::File;
use std::io::{BufWriter, Write};

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::config::SyncStrategy;
use crate::error::{HashError, Result};

/// File magic
pub const MAGIC: &[u8; 4] = b"KVHL";

/// Log format version
pub const VERSION: u16 = 1;

/// Magic + version
pub const HEADER_SIZE: usize = 6;

/// CRC (4) + payload length (4)
pub const FRAME_HEADER_SIZE: usize = 8;

/// One logged mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecord {
    /// Add or replace a key
    Store { key: Vec<u8>, value: Vec<u8> },

    /// Remove a key
    Delete { key: Vec<u8> },
}

/// Outcome of replaying a log file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records read back
    pub records_applied: u64,

    /// Length of the intact prefix of the file
    pub valid_len: u64,

    /// Bytes after the intact prefix
    pub bytes_discarded: u64,

    /// Whether the damaged tail was cut off the file
    pub was_truncated: bool,
}

/// Magic and version bytes that start every log file
pub(crate) fn file_header() -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[..4].copy_from_slice(MAGIC);
    header[4..].copy_from_slice(&VERSION.to_le_bytes());
    header
}

/// Encode a record as `crc | len | payload`
pub(crate) fn encode_frame(record: &LogRecord) -> Result<BytesMut> {
    let payload =
        bincode::serialize(record).map_err(|e| HashError::Serialization(e.to_string()))?;

    let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.put_u32_le(crc32fast::hash(&payload));
    frame.put_u32_le(payload.len() as u32);
    frame.put_slice(&payload);
    Ok(frame)
}

/// Decode every intact frame of a whole log file.
///
/// Stops at the first short, checksum-failing or undecodable frame; the
/// returned `RecoveryResult` tells the caller where the intact prefix ends.
pub(crate) fn replay(data: &[u8]) -> Result<(Vec<LogRecord>, RecoveryResult)> {
    if data.len() < HEADER_SIZE || &data[..4] != MAGIC {
        return Err(HashError::Corrupt(format!(
            "not a kvhash log: bad magic {:?}",
            &data[..data.len().min(4)]
        )));
    }

    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != VERSION {
        return Err(HashError::Corrupt(format!(
            "unsupported log version: {}",
            version
        )));
    }

    let mut records = Vec::new();
    let mut pos = HEADER_SIZE;

    while let Some((record, frame_len)) = decode_frame(&data[pos..]) {
        records.push(record);
        pos += frame_len;
    }

    let result = RecoveryResult {
        records_applied: records.len() as u64,
        valid_len: pos as u64,
        bytes_discarded: (data.len() - pos) as u64,
        was_truncated: false,
    };
    Ok((records, result))
}

/// Decode one frame from the front of `buf`, with the number of bytes it used
fn decode_frame(buf: &[u8]) -> Option<(LogRecord, usize)> {
    if buf.len() < FRAME_HEADER_SIZE {
        return None;
    }

    let crc = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let len = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
    let payload = buf.get(FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + len)?;

    if crc32fast::hash(payload) != crc {
        return None;
    }

    let record = bincode::deserialize(payload).ok()?;
    Some((record, FRAME_HEADER_SIZE + len))
}

/// Appends frames to an open log file
pub(crate) struct LogWriter {
    writer: BufWriter<File>,
    sync_strategy: SyncStrategy,
    /// Frames written since the last fsync
    unsynced: usize,
}

impl LogWriter {
    /// `file` must already be positioned at its end
    pub(crate) fn new(file: File, sync_strategy: SyncStrategy) -> Self {
        Self {
            writer: BufWriter::new(file),
            sync_strategy,
            unsynced: 0,
        }
    }

    pub(crate) fn append(&mut self, record: &LogRecord) -> Result<()> {
        let frame = encode_frame(record)?;
        self.writer.write_all(&frame)?;
        self.unsynced += 1;

        match self.sync_strategy {
            SyncStrategy::EveryWrite => self.sync(),
            SyncStrategy::EveryNWrites { count } if self.unsynced >= count => self.sync(),
            _ => Ok(()),
        }
    }

    /// Flush buffered frames and fsync the file
    pub(crate) fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }
}
