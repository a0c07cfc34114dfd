//! Key escaping
//!
//! Header lines carry the key percent-encoded, with every space written as
//! `+` so a trailing ` base64` tag can never be part of a key. A leading `@`
//! is encoded too, otherwise the header would read back as a value line.

/// Append the escaped form of `key` (without its trailing NUL) to `out`
pub fn escape_key_into(key: &[u8], out: &mut Vec<u8>) {
    for (i, &byte) in key.iter().enumerate() {
        match byte {
            b' ' => out.push(b'+'),
            b'@' if i == 0 => out.extend_from_slice(b"%40"),
            b'%' | b'+' | b'&' | b'=' | b'\n' => {
                out.push(b'%');
                out.push(HEX[(byte >> 4) as usize]);
                out.push(HEX[(byte & 0x0f) as usize]);
            }
            _ => out.push(byte),
        }
    }
}

/// Escaped form of `key`
pub fn escape_key(key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 8);
    escape_key_into(key, &mut out);
    out
}

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Decode an escaped key, returning the key bytes plus a trailing NUL.
///
/// Decoding stops at an unescaped `&` or `=`. A `%` not followed by two hex
/// digits is kept as a literal `%`.
pub fn unescape_key(text: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(text.len() + 1);
    let mut i = 0;

    while i < text.len() {
        match text[i] {
            b'+' => key.push(b' '),
            b'%' => match (
                text.get(i + 1).copied().and_then(hex_value),
                text.get(i + 2).copied().and_then(hex_value),
            ) {
                (Some(hi), Some(lo)) => {
                    key.push(hi << 4 | lo);
                    i += 2;
                }
                _ => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(text),
                        offset = i,
                        "bad escape in key"
                    );
                    key.push(b'%');
                }
            },
            b'&' | b'=' => break,
            byte => key.push(byte),
        }
        i += 1;
    }

    key.push(0);
    key
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
