//! Hex dump input.
//!
//! Segments copied out of a hex viewer arrive as hex digits broken up by
//! spaces and newlines. Whitespace is dropped; anything else must be a hex
//! digit, and the digits must pair up into whole bytes.

use crate::error::{ProbeError, Result};

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Removes all ASCII whitespace from a hex dump.
pub fn clean_hex_string(input: &str) -> String {
    input.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}

/// Decodes a whitespace-separated hex dump into bytes.
///
/// Error positions are byte offsets into `input`.
pub fn decode_hex_dump(input: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(input.len() / 2);
    let mut high: Option<(usize, u8)> = None;

    for (position, c) in input.bytes().enumerate() {
        if c.is_ascii_whitespace() {
            continue;
        }
        let value = nibble(c).ok_or_else(|| ProbeError::InvalidHex {
            position,
            reason: format!("'{}' is not a hex digit", char::from(c)),
        })?;
        match high.take() {
            Some((_, upper)) => bytes.push((upper << 4) | value),
            None => high = Some((position, value)),
        }
    }

    if let Some((position, _)) = high {
        return Err(ProbeError::InvalidHex {
            position,
            reason: "odd number of hex digits".to_string(),
        });
    }

    tracing::debug!(bytes = bytes.len(), "Decoded hex dump");
    Ok(bytes)
}
