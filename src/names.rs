//! Entry name conversion between host strings and the archive charset
//!
//! Names are stored as NUL-terminated bytes in a legacy multi-byte charset
//! (EUC-KR for most archives). The binary layout only ever sees bytes;
//! conversion happens at the API boundary.

use crate::error::{GrfError, Result};
use encoding_rs::{Encoding, EUC_KR};

/// Charset used when none is configured
pub const DEFAULT_NAME_ENCODING: &Encoding = EUC_KR;

/// Decode archive name bytes, replacing unmappable sequences
pub fn decode_name(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Encode a host string into archive name bytes
pub fn encode_name(text: &str, encoding: &'static Encoding) -> Result<Vec<u8>> {
    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(GrfError::Encoding(format!(
            "{:?} is not representable in {}",
            text,
            encoding.name()
        )));
    }
    let bytes = bytes.into_owned();
    validate_name(&bytes)?;
    Ok(bytes)
}

/// Names must be non-empty and free of NUL bytes
pub fn validate_name(name: &[u8]) -> Result<()> {
    if name.is_empty() {
        return Err(GrfError::Encoding("empty entry name".to_string()));
    }
    if name.contains(&0) {
        return Err(GrfError::Encoding(format!(
            "entry name contains NUL: {}",
            String::from_utf8_lossy(name)
        )));
    }
    Ok(())
}

/// Case-insensitive name comparison; `/` and `\` are the same separator
pub fn eq_ignore_case(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| fold(x) == fold(y))
}

fn fold(byte: u8) -> u8 {
    match byte {
        b'/' => b'\\',
        other => other.to_ascii_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euc_kr_roundtrip() {
        let text = "data\\texture\\유저인터페이스\\login.bmp";
        let bytes = encode_name(text, DEFAULT_NAME_ENCODING).unwrap();
        assert_ne!(bytes, text.as_bytes());
        assert!(bytes.starts_with(b"data\\texture\\"));
        assert_eq!(decode_name(&bytes, DEFAULT_NAME_ENCODING), text);
    }

    #[test]
    fn test_unmappable_name_rejected() {
        assert!(matches!(
            encode_name("emoji 😀.txt", DEFAULT_NAME_ENCODING),
            Err(GrfError::Encoding(_))
        ));
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(encode_name("", DEFAULT_NAME_ENCODING).is_err());
        assert!(encode_name("a\0b", DEFAULT_NAME_ENCODING).is_err());
        assert!(validate_name(b"data\\ok.txt").is_ok());
    }

    #[test]
    fn test_eq_ignore_case() {
        assert!(eq_ignore_case(b"DATA\\Sprite.SPR", b"data\\sprite.spr"));
        assert!(eq_ignore_case(b"data/sprite.spr", b"data\\sprite.spr"));
        assert!(!eq_ignore_case(b"data\\sprite.spr", b"data\\sprite.act"));
        assert!(!eq_ignore_case(b"data", b"data\\"));
    }

    #[test]
    fn test_multibyte_names_compare_bytewise() {
        let a = encode_name("유저.txt", DEFAULT_NAME_ENCODING).unwrap();
        let b = encode_name("유저.TXT", DEFAULT_NAME_ENCODING).unwrap();
        let c = encode_name("인터.txt", DEFAULT_NAME_ENCODING).unwrap();
        assert!(eq_ignore_case(&a, &b));
        assert!(!eq_ignore_case(&a, &c));
    }
}
