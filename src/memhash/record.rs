//! Hash record
//!
//! One allocation per key: the key bytes, alignment padding, then the value.

use crate::table::Value;

/// Head of a bucket chain, or the link to the next record in it
pub(crate) type Link = Option<Box<Record>>;

/// Offset of the value inside a record buffer holding a `klen`-byte key.
///
/// Values big enough to hold a scalar are aligned to the largest of
/// 8 (64-bit targets only), 4 or 2 bytes their length allows. Values shorter
/// than 2 bytes follow the key directly.
pub fn value_offset(klen: usize, vlen: usize) -> usize {
    let align = if cfg!(target_pointer_width = "64") && vlen >= 8 {
        8
    } else if vlen >= 4 {
        4
    } else if vlen >= 2 {
        2
    } else {
        return klen;
    };
    (klen + align - 1) & !(align - 1)
}

/// A key/value pair stored in a bucket chain
pub(crate) struct Record {
    /// Next record in the same bucket
    pub(crate) next: Link,
    klen: usize,
    vlen: usize,
    /// `key | padding | value`; may be longer than needed after a shrinking store
    buf: Box<[u8]>,
}

impl Record {
    pub(crate) fn new(key: &[u8], value: Value<'_>) -> Box<Self> {
        let vlen = value.len();
        let offset = value_offset(key.len(), vlen);
        let mut buf = vec![0u8; offset + vlen].into_boxed_slice();
        buf[..key.len()].copy_from_slice(key);
        value.write_into(&mut buf[offset..]);

        Box::new(Self {
            next: None,
            klen: key.len(),
            vlen,
            buf,
        })
    }

    #[inline]
    pub(crate) fn key(&self) -> &[u8] {
        &self.buf[..self.klen]
    }

    #[inline]
    pub(crate) fn value(&self) -> &[u8] {
        let offset = value_offset(self.klen, self.vlen);
        &self.buf[offset..offset + self.vlen]
    }

    #[inline]
    pub(crate) fn value_mut(&mut self) -> &mut [u8] {
        let offset = value_offset(self.klen, self.vlen);
        &mut self.buf[offset..offset + self.vlen]
    }

    /// Length first, then bytes
    #[inline]
    pub(crate) fn matches(&self, key: &[u8]) -> bool {
        self.klen == key.len() && self.key() == key
    }

    /// Whether a `vlen`-byte value can replace the current one in place
    pub(crate) fn fits(&self, vlen: usize) -> bool {
        value_offset(self.klen, vlen) + vlen <= self.buf.len()
    }

    /// Replace the value in place. Caller checks `fits` first.
    pub(crate) fn overwrite(&mut self, value: Value<'_>) {
        debug_assert!(self.fits(value.len()));
        self.vlen = value.len();
        value.write_into(self.value_mut());
    }
}
