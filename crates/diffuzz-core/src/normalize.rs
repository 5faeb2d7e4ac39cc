//! Output normalization: each stdout field is base64-decoded, then
//! percent-decoded, operating on raw bytes rather than `str` so it never
//! has to assume a text encoding.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("field is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

pub fn normalize_field(raw: &str) -> Result<Vec<u8>, NormalizeError> {
    let decoded = BASE64.decode(raw)?;
    Ok(percent_decode(&decoded))
}

fn is_hex_digit(b: u8) -> bool {
    b.is_ascii_digit() || (b'a'..=b'f').contains(&b) || (b'A'..=b'F').contains(&b)
}

/// Replaces every `%HH` triple (H a hex digit) with the byte `0xHH`; all
/// other bytes pass through unchanged.
pub fn percent_decode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'%' && i + 2 < input.len() && is_hex_digit(input[i + 1]) && is_hex_digit(input[i + 2]) {
            let hex = std::str::from_utf8(&input[i + 1..i + 3]).expect("ascii hex digits are valid utf-8");
            let byte = u8::from_str_radix(hex, 16).expect("validated hex digits");
            out.push(byte);
            i += 3;
        } else {
            out.push(input[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_decode_is_identity_without_triples() {
        let input = b"no percent signs here";
        assert_eq!(percent_decode(input), input.to_vec());
    }

    #[test]
    fn percent_decode_replaces_triples() {
        assert_eq!(percent_decode(b"a%20b"), b"a b".to_vec());
    }

    #[test]
    fn percent_decode_leaves_trailing_malformed_triple_alone() {
        assert_eq!(percent_decode(b"abc%2"), b"abc%2".to_vec());
        assert_eq!(percent_decode(b"abc%"), b"abc%".to_vec());
    }

    #[test]
    fn percent_decode_ignores_non_hex_after_percent() {
        assert_eq!(percent_decode(b"100%complete"), b"100%complete".to_vec());
    }

    #[test]
    fn normalize_field_round_trips_through_base64() {
        let encoded = BASE64.encode(b"hello%20world");
        assert_eq!(normalize_field(&encoded).unwrap(), b"hello world".to_vec());
    }
}
