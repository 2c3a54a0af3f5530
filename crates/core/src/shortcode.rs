//! Reversible short codes for record ids.
//!
//! A short code is the base62 rendering of `id + offset`, where the offset is
//! `62^(min_length - 1)`. The offset guarantees every code has at least
//! `min_length` digits, so the first record ever stored gets a code like `11`
//! instead of `1`.

use crate::{Error, Result};

/// Base62 alphabet: digits, then upper case, then lower case.
pub const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const BASE: u128 = 62;

/// Default minimum code length.
pub const DEFAULT_MIN_LENGTH: u32 = 2;

/// Largest supported minimum length (62^10 still fits comfortably in a u64).
pub const MAX_MIN_LENGTH: u32 = 10;

/// Bijective codec between non-negative record ids and short codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShortCodeCodec {
    min_length: u32,
    offset: u64,
}

impl ShortCodeCodec {
    /// Create a codec whose codes are at least `min_length` characters long.
    pub fn new(min_length: u32) -> Result<Self> {
        if !(1..=MAX_MIN_LENGTH).contains(&min_length) {
            return Err(Error::Config(format!(
                "short code min_length must be between 1 and {MAX_MIN_LENGTH}, got {min_length}"
            )));
        }
        Ok(Self {
            min_length,
            offset: 62u64.pow(min_length - 1),
        })
    }

    pub fn min_length(&self) -> u32 {
        self.min_length
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Encode a record id.
    ///
    /// Total for every `u64`; ids above `u64::MAX - offset` produce codes that
    /// `decode` reports as overflowing.
    pub fn encode(&self, id: u64) -> String {
        let mut value = id as u128 + self.offset as u128;
        let mut digits = Vec::with_capacity(12);
        loop {
            digits.push(ALPHABET[(value % BASE) as usize]);
            value /= BASE;
            if value == 0 {
                break;
            }
        }
        digits.reverse();
        // The alphabet is ASCII.
        digits.into_iter().map(char::from).collect()
    }

    /// Decode a short code back into a record id.
    pub fn decode(&self, code: &str) -> Result<u64> {
        if code.is_empty() {
            return Err(Error::InvalidShortCode("empty code".to_string()));
        }
        if code.len() > 1 && code.starts_with('0') {
            return Err(Error::InvalidShortCode(format!(
                "non-canonical leading zero: {code}"
            )));
        }

        let mut value: u64 = 0;
        for byte in code.bytes() {
            let digit = digit_value(byte).ok_or_else(|| {
                Error::InvalidShortCode(format!("character outside base62 alphabet in {code:?}"))
            })?;
            value = value
                .checked_mul(62)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| Error::InvalidShortCode(format!("code overflows: {code}")))?;
        }

        value
            .checked_sub(self.offset)
            .ok_or_else(|| Error::InvalidShortCode(format!("code below minimum: {code}")))
    }
}

impl Default for ShortCodeCodec {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            offset: 62,
        }
    }
}

fn digit_value(byte: u8) -> Option<u64> {
    match byte {
        b'0'..=b'9' => Some((byte - b'0') as u64),
        b'A'..=b'Z' => Some((byte - b'A') as u64 + 10),
        b'a'..=b'z' => Some((byte - b'a') as u64 + 36),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_codes() {
        let codec = ShortCodeCodec::default();
        assert_eq!(codec.encode(0), "10");
        assert_eq!(codec.encode(1), "11");
        assert_eq!(codec.encode(61), "1z");
        assert_eq!(codec.encode(62), "20");
    }

    #[test]
    fn test_roundtrip_first_million() {
        let codec = ShortCodeCodec::default();
        for id in 0..1_000_000u64 {
            let code = codec.encode(id);
            assert!(code.len() >= 2, "code {code} for {id} is too short");
            assert_eq!(codec.decode(&code).unwrap(), id);
        }
    }

    #[test]
    fn test_min_length_respected() {
        let codec = ShortCodeCodec::new(4).unwrap();
        assert_eq!(codec.encode(0), "1000");
        assert_eq!(codec.decode("1000").unwrap(), 0);
        assert!(codec.decode("zzz").is_err());
    }

    #[test]
    fn test_decode_rejects_bad_codes() {
        let codec = ShortCodeCodec::default();
        assert!(codec.decode("").is_err());
        assert!(codec.decode("a-b").is_err());
        assert!(codec.decode("!!").is_err());
        // Below the offset would be a negative id.
        assert!(codec.decode("z").is_err());
        assert!(codec.decode("0z").is_err());
        assert!(codec.decode("zzzzzzzzzzzzzzzzzzzz").is_err());
    }

    #[test]
    fn test_large_ids() {
        let codec = ShortCodeCodec::default();
        let max_decodable = u64::MAX - codec.offset();
        assert_eq!(codec.decode(&codec.encode(max_decodable)).unwrap(), max_decodable);
        assert!(codec.decode(&codec.encode(u64::MAX)).is_err());
    }

    #[test]
    fn test_new_validates_min_length() {
        assert!(ShortCodeCodec::new(0).is_err());
        assert!(ShortCodeCodec::new(MAX_MIN_LENGTH + 1).is_err());
        assert_eq!(ShortCodeCodec::new(2).unwrap(), ShortCodeCodec::default());
    }
}
