//! Text encoding normalization. Every cached file is stored as UTF-8.
use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};

use crate::errors::{Error, Result};

/// Label of the single encoding all cached files are stored in.
pub const CACHE_ENCODING: &str = "utf-8";

/// True when `label` names the cache encoding. Labels follow the WHATWG
/// rules: `"UTF-8"`, `"utf8"` and `" unicode-1-1-utf-8 "` all match.
pub fn is_cache_encoding(label: &str) -> bool {
    Encoding::for_label(label.as_bytes()) == Some(UTF_8)
}

fn resolve(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.as_bytes()).ok_or_else(|| Error::UnknownEncoding(label.into()))
}

/// Decodes `bytes` declared as `label` into text. A leading byte order mark
/// wins over the label and is dropped, as in the WHATWG decode algorithm.
/// Byte sequences that are malformed in that encoding are an error, not
/// replaced.
///
/// `latin1` and `iso-8859-1` resolve to windows-1252, so bytes 0x80 to 0x9F
/// decode to characters such as `€` rather than C1 control codes.
pub(crate) fn decode<'a>(bytes: &'a [u8], label: &str, target: &str) -> Result<Cow<'a, str>> {
    let declared = resolve(label)?;
    let (encoding, bytes) = match Encoding::for_bom(bytes) {
        Some((sniffed, bom_len)) => (sniffed, &bytes[bom_len..]),
        None => (declared, bytes),
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| Error::DecodeError {
            encoding: encoding.name().into(),
            target: target.into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_encoding_labels() {
        assert!(is_cache_encoding("utf-8"));
        assert!(is_cache_encoding("UTF-8"));
        assert!(is_cache_encoding("utf8"));
        assert!(is_cache_encoding(" utf-8 "));
        assert!(is_cache_encoding(CACHE_ENCODING));
        assert!(!is_cache_encoding("iso-8859-1"));
        assert!(!is_cache_encoding("utf-16le"));
        assert!(!is_cache_encoding("not-an-encoding"));
    }

    #[test]
    fn decode_latin1() {
        let text = decode(b"caf\xe9", "iso-8859-1", "ds").unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn decode_utf16() {
        let bytes: Vec<u8> = "a,b\r\n".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(decode(&bytes, "utf-16le", "ds").unwrap(), "a,b\r\n");
    }

    #[test]
    fn decode_drops_byte_order_mark() {
        let mut le = vec![0xff, 0xfe];
        le.extend("a,b\n".encode_utf16().flat_map(|u| u.to_le_bytes()));
        assert_eq!(decode(&le, "utf-16", "ds").unwrap(), "a,b\n");

        let mut be = vec![0xfe, 0xff];
        be.extend("a,b\n".encode_utf16().flat_map(|u| u.to_be_bytes()));
        assert_eq!(decode(&be, "utf-16", "ds").unwrap(), "a,b\n");

        assert_eq!(decode(b"\xef\xbb\xbfcaf\xc3\xa9", "latin1", "ds").unwrap(), "café");
    }

    #[test]
    fn latin1_is_windows_1252() {
        assert_eq!(decode(b"\x80", "iso-8859-1", "ds").unwrap(), "€");
    }

    #[test]
    fn decode_malformed() {
        let err = decode(b"\xff\xfe\xfd", "utf-8", "ds").unwrap_err();
        assert!(matches!(err, Error::DecodeError { .. }));
    }

    #[test]
    fn decode_unknown_label() {
        let err = decode(b"abc", "klingon", "ds").unwrap_err();
        assert!(matches!(err, Error::UnknownEncoding(label) if label == "klingon"));
    }
}
