//! Dump reader
//!
//! `StreamDecoder` turns dump lines into records. It can be fed whole lines or
//! arbitrary byte chunks; `read_into` drives it from a `BufRead` and stops at
//! the end of the current set.

use std::io::BufRead;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use bytes::{BufMut, BytesMut};

use crate::error::Result;
use crate::table::{Table, Value};

use super::keys::unescape_key;
use super::{BASE64_TAG, EMPTY_KEY};

/// Chunk lines come from many writers; accept them padded or not
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Where the decoder is within a set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Nothing pending; the next header starts a record
    AwaitingHeader,
    /// A header or value line has been seen and not yet flushed
    AccumulatingValue,
}

/// Decoder output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete record. `key` carries its trailing NUL.
    Record { key: Vec<u8>, value: Vec<u8> },
    /// A lone `@` line closed the current set
    EndOfSet,
}

/// Totals from one `read_into` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    /// Records stored into the table
    pub records: usize,
    /// True if reading stopped at a set terminator rather than end of input
    pub end_of_set: bool,
}

/// Incremental dump decoder
#[derive(Debug)]
pub struct StreamDecoder {
    state: DecodeState,

    /// Decoded key of the pending record; None for the leading blob
    key: Option<Vec<u8>>,

    /// Pending record's header carried the base64 tag
    base64: bool,

    /// Value bytes accumulated so far
    value: BytesMut,

    /// At least one value line has been accepted
    got_value: bool,

    /// Bytes after the last newline passed to `feed`
    partial: BytesMut,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::AwaitingHeader,
            key: None,
            base64: false,
            value: BytesMut::new(),
            got_value: false,
            partial: BytesMut::new(),
        }
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Feed an arbitrary chunk of input. Complete lines are decoded now; a
    /// trailing partial line waits for the next call or `finish`.
    pub fn feed<F>(&mut self, mut bytes: &[u8], mut emit: F) -> Result<()>
    where
        F: FnMut(Decoded) -> Result<()>,
    {
        while let Some(pos) = bytes.iter().position(|&b| b == b'\n') {
            let (line, rest) = (&bytes[..pos], &bytes[pos + 1..]);
            bytes = rest;

            if self.partial.is_empty() {
                self.feed_line(line, &mut emit)?;
            } else {
                self.partial.extend_from_slice(line);
                let joined = self.partial.split();
                self.feed_line(&joined, &mut emit)?;
            }
        }
        self.partial.extend_from_slice(bytes);
        Ok(())
    }

    /// Decode one line, without its newline
    pub fn feed_line<F>(&mut self, line: &[u8], mut emit: F) -> Result<()>
    where
        F: FnMut(Decoded) -> Result<()>,
    {
        // `@@` opens a value line that starts with `@`
        if line.first() == Some(&b'@') && line.get(1) != Some(&b'@') {
            if let Some(record) = self.take_record() {
                emit(record)?;
            }
            if line.len() == 1 {
                return emit(Decoded::EndOfSet);
            }

            let mut header = &line[1..];
            self.base64 = line.len() > BASE64_TAG.len() + 1 && header.ends_with(BASE64_TAG);
            if self.base64 {
                header = &header[..header.len() - BASE64_TAG.len()];
            }
            self.key = Some(unescape_key(header));
            self.state = DecodeState::AccumulatingValue;
            return Ok(());
        }

        let data = line.strip_prefix(b"@").unwrap_or(line);

        if self.base64 {
            match LENIENT.decode(data) {
                Ok(bytes) if !bytes.is_empty() => {
                    self.value.extend_from_slice(&bytes);
                    self.got_value = true;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        key = ?self.key.as_deref().map(String::from_utf8_lossy),
                        error = %e,
                        "skipping bad base64 line"
                    );
                }
            }
        } else {
            if self.got_value {
                self.value.put_u8(b'\n');
            }
            // blank lines ahead of the first header carry nothing
            if !data.is_empty() || self.key.is_some() {
                self.value.extend_from_slice(data);
                self.got_value = true;
                self.state = DecodeState::AccumulatingValue;
            }
        }
        Ok(())
    }

    /// End of input: decode any unterminated last line and flush the
    /// pending record
    pub fn finish<F>(&mut self, mut emit: F) -> Result<()>
    where
        F: FnMut(Decoded) -> Result<()>,
    {
        if !self.partial.is_empty() {
            let line = self.partial.split();
            self.feed_line(&line, &mut emit)?;
        }
        if let Some(record) = self.take_record() {
            emit(record)?;
        }
        Ok(())
    }

    fn take_record(&mut self) -> Option<Decoded> {
        if self.state != DecodeState::AccumulatingValue {
            return None;
        }

        let key = self.key.take().unwrap_or_else(|| EMPTY_KEY.to_vec());
        let mut value = self.value.split().to_vec();
        if !self.base64 && self.got_value {
            value.push(0);
        }

        self.state = DecodeState::AwaitingHeader;
        self.base64 = false;
        self.got_value = false;

        tracing::trace!(
            key = %String::from_utf8_lossy(&key),
            len = value.len(),
            "decoded record"
        );
        Some(Decoded::Record { key, value })
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Read one set from `reader` into `table`, overwriting existing keys.
///
/// Stops after a lone `@` line, leaving the reader just past it, or at end
/// of input.
pub fn read_into<T, R>(table: &mut T, reader: &mut R) -> Result<ReadSummary>
where
    T: Table + ?Sized,
    R: BufRead,
{
    let mut decoder = StreamDecoder::new();
    let mut summary = ReadSummary::default();
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            decoder.finish(|decoded| store_decoded(table, decoded, &mut summary))?;
            break;
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }

        decoder.feed_line(&line, |decoded| store_decoded(table, decoded, &mut summary))?;
        if summary.end_of_set {
            break;
        }
    }

    tracing::debug!(
        records = summary.records,
        end_of_set = summary.end_of_set,
        "read table dump"
    );
    Ok(summary)
}

fn store_decoded<T>(table: &mut T, decoded: Decoded, summary: &mut ReadSummary) -> Result<()>
where
    T: Table + ?Sized,
{
    match decoded {
        Decoded::Record { key, value } => {
            table.store(&key, Value::Bytes(&value))?;
            summary.records += 1;
        }
        Decoded::EndOfSet => summary.end_of_set = true,
    }
    Ok(())
}
