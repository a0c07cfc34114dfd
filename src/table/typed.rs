//! Typed helpers
//!
//! Fixed key/value conventions layered over any `Table`. String keys are
//! stored as their UTF-8 bytes followed by a NUL, which is also what the
//! dump format expects of every key.

use crate::error::{HashError, Result};

use super::{Table, Value};

/// Key bytes for a string key: the UTF-8 bytes plus a trailing NUL
pub fn str_key(key: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(key.len() + 1);
    bytes.extend_from_slice(key.as_bytes());
    bytes.push(0);
    bytes
}

/// String value bytes; `None` stores an empty value
fn str_value(value: Option<&str>) -> Vec<u8> {
    value.map(str_key).unwrap_or_default()
}

fn fixed<const N: usize>(value: &[u8], what: &str) -> Result<[u8; N]> {
    value.try_into().map_err(|_| {
        HashError::Corrupt(format!(
            "{} value must be {} bytes, found {}",
            what,
            N,
            value.len()
        ))
    })
}

/// Convenience operations available on every table
pub trait TableExt: Table {
    // -------------------------------------------------------------------------
    // String key, string value
    // -------------------------------------------------------------------------

    /// Raw value stored under a string key
    fn fetch_str(&mut self, key: &str) -> Result<&[u8]> {
        self.fetch(&str_key(key))
    }

    /// Value under a string key, without its trailing NUL
    fn fetch_text(&mut self, key: &str) -> Result<&str> {
        let value = self.fetch(&str_key(key))?;
        let text = value.strip_suffix(&[0]).unwrap_or(value);
        std::str::from_utf8(text)
            .map_err(|e| HashError::Corrupt(format!("value of {:?} is not UTF-8: {}", key, e)))
    }

    fn store_str(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        self.store(&str_key(key), Value::Bytes(&str_value(value)))?;
        Ok(())
    }

    fn insert_str(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        self.insert(&str_key(key), Value::Bytes(&str_value(value)))?;
        Ok(())
    }

    fn delete_str(&mut self, key: &str) -> Result<()> {
        self.delete(&str_key(key))
    }

    // -------------------------------------------------------------------------
    // String key, machine-word handle
    // -------------------------------------------------------------------------

    fn store_handle(&mut self, key: &str, handle: usize) -> Result<()> {
        self.store(&str_key(key), Value::Bytes(&handle.to_ne_bytes()))?;
        Ok(())
    }

    fn fetch_handle(&mut self, key: &str) -> Result<usize> {
        let value = self.fetch(&str_key(key))?;
        Ok(usize::from_ne_bytes(fixed(value, "handle")?))
    }

    // -------------------------------------------------------------------------
    // String key, fixed-width integer
    // -------------------------------------------------------------------------

    fn store_int(&mut self, key: &str, value: i64) -> Result<()> {
        self.store(&str_key(key), Value::Bytes(&value.to_ne_bytes()))?;
        Ok(())
    }

    fn fetch_int(&mut self, key: &str) -> Result<i64> {
        let value = self.fetch(&str_key(key))?;
        Ok(i64::from_ne_bytes(fixed(value, "integer")?))
    }

    // -------------------------------------------------------------------------
    // Sets
    // -------------------------------------------------------------------------

    /// Add `key` with an empty value. Returns false if it was already there.
    fn insert_member(&mut self, key: &str) -> Result<bool> {
        match self.insert(&str_key(key), Value::Bytes(&[])) {
            Ok(_) => Ok(true),
            Err(HashError::AlreadyExists) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn contains(&mut self, key: &str) -> bool {
        self.fetch(&str_key(key)).is_ok()
    }

    /// Increment the counter kept under `key` and return the new count
    fn bump(&mut self, key: &str) -> Result<u64> {
        let key = str_key(key);
        let count = match self.fetch(&key) {
            Ok(value) => u64::from_ne_bytes(fixed(value, "counter")?) + 1,
            Err(HashError::NotFound) => 1,
            Err(e) => return Err(e),
        };
        self.store(&key, Value::Bytes(&count.to_ne_bytes()))?;
        Ok(count)
    }
}

impl<T: Table + ?Sized> TableExt for T {}
