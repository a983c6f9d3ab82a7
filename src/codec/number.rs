//! Canonical Share Numbers
//!
//! Shares are unsigned big-endian integers written as uppercase hex with no
//! leading zero byte. Zero is written as `00`.

use crate::error::{ProxyError, Result};
use std::cmp::Ordering;

/// Strip leading zero bytes. Zero keeps no bytes at all.
pub fn trim_leading_zeroes(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Canonical uppercase hex of an unsigned big-endian value.
pub fn encode_hex(bytes: &[u8]) -> String {
    let trimmed = trim_leading_zeroes(bytes);
    if trimmed.is_empty() {
        "00".to_string()
    } else {
        hex::encode_upper(trimmed)
    }
}

/// Decode a hex line into bytes. Embedded spaces are ignored.
pub fn decode_hex(line: &str) -> Result<Vec<u8>> {
    let digits: String = line.chars().filter(|c| *c != ' ').collect();
    if digits.len() % 2 != 0 {
        return Err(ProxyError::validation(format!(
            "Hex number has an odd digit count ({}).",
            digits.len()
        )));
    }
    hex::decode(&digits)
        .map_err(|e| ProxyError::validation(format!("Malformed hex number: {e}")))
}

/// Compare two unsigned big-endian values by magnitude.
pub fn compare_unsigned(a: &[u8], b: &[u8]) -> Ordering {
    let a = trim_leading_zeroes(a);
    let b = trim_leading_zeroes(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_single_byte() {
        assert_eq!(encode_hex(&[]), "00");
        assert_eq!(encode_hex(&[0, 0, 0]), "00");
        assert_eq!(decode_hex("00").unwrap(), vec![0]);
    }

    #[test]
    fn test_leading_zeroes_trimmed() {
        assert_eq!(encode_hex(&[0x00, 0x00, 0x01, 0xAB]), "01AB");
        assert_eq!(encode_hex(&[0xFF, 0x00]), "FF00");
    }

    #[test]
    fn test_canonical_round_trip() {
        for v in [0u64, 1, 0xFF, 0x100, 0x0102_0304, u64::MAX] {
            let bytes = v.to_be_bytes();
            let text = encode_hex(&bytes);
            assert_eq!(text, text.to_uppercase());
            let back = decode_hex(&text).unwrap();

            let mut padded = [0u8; 8];
            padded[8 - back.len()..].copy_from_slice(&back);
            assert_eq!(u64::from_be_bytes(padded), v);
            assert_eq!(encode_hex(&back), text);
        }
    }

    #[test]
    fn test_decode_accepts_spaces_and_lowercase() {
        assert_eq!(decode_hex("0a 0B").unwrap(), vec![0x0A, 0x0B]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_hex("ABC").is_err());
        assert!(decode_hex("ZZ").is_err());
    }

    #[test]
    fn test_compare_by_magnitude_not_length() {
        assert_eq!(compare_unsigned(&[0, 0, 5], &[4]), Ordering::Greater);
        assert_eq!(compare_unsigned(&[0x01, 0x00], &[0xFF]), Ordering::Greater);
        assert_eq!(compare_unsigned(&[0x7F, 0xFF], &[0x80, 0x00]), Ordering::Less);
        assert_eq!(compare_unsigned(&[0, 0x12], &[0x12]), Ordering::Equal);
        assert_eq!(compare_unsigned(&[], &[0]), Ordering::Equal);
    }
}
