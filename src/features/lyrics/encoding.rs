//! Encoding fallback for lyrics files
//!
//! Old `.lrc` and `.txt` files are often saved in a legacy code page (EUC-KR
//! for Korean, GBK or Shift-JIS for Chinese and Japanese releases).

use encoding_rs::{BIG5, EUC_KR, GBK, SHIFT_JIS, UTF_16LE, WINDOWS_1252};

/// Decode bytes as UTF-8, falling back to common legacy encodings
///
/// A UTF-8 BOM is stripped. UTF-16LE is accepted when it carries a BOM.
pub fn decode_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        let (decoded, _, _) = UTF_16LE.decode(bytes);
        return decoded.into_owned();
    }
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Korean first
    for encoding in [EUC_KR, GBK, BIG5, SHIFT_JIS, WINDOWS_1252] {
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if !had_errors && is_likely_valid_text(&decoded) {
            tracing::debug!("Decoded lyrics as {}", encoding.name());
            return decoded.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).into_owned()
}

/// Heuristic check if decoded text looks valid
fn is_likely_valid_text(s: &str) -> bool {
    let suspicious = s
        .chars()
        .filter(|c| {
            (*c < ' ' && !matches!(c, '\t' | '\n' | '\r'))
                || ('\u{E000}'..='\u{F8FF}').contains(c)
                || *c == '\u{FFFD}'
        })
        .count();
    suspicious <= (s.len() / 20).max(1)
}

/// Whether a string contains precomposed Hangul syllables
pub fn contains_hangul(s: &str) -> bool {
    s.chars().any(|c| ('\u{AC00}'..='\u{D7A3}').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passthrough() {
        let input = "[00:01.00]안녕하세요";
        assert_eq!(decode_string(input.as_bytes()), input);
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("hello".as_bytes());
        assert_eq!(decode_string(&bytes), "hello");
    }

    #[test]
    fn test_euc_kr_decode() {
        let (bytes, _, _) = EUC_KR.encode("사랑해");
        assert_eq!(decode_string(&bytes), "사랑해");
    }

    #[test]
    fn test_contains_hangul() {
        assert!(contains_hangul("I love 너"));
        assert!(!contains_hangul("こんにちは"));
    }
}
