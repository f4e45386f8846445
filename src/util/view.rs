//! Byte/string views
//!
//! Borrowed conversions between byte slices and text. The borrow keeps the
//! source frozen for as long as the view lives, so the view can never observe
//! a mutation of the bytes underneath it.

use std::str::Utf8Error;

/// View bytes as text without copying, if they are valid UTF-8
pub fn bytes_as_str(bytes: &[u8]) -> Result<&str, Utf8Error> {
    std::str::from_utf8(bytes)
}

/// View text as bytes without copying
pub fn str_as_bytes(s: &str) -> &[u8] {
    s.as_bytes()
}

/// Copy bytes into an owned string, replacing invalid UTF-8
pub fn bytes_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_as_str() {
        let bytes = b"Hello World!".to_vec();
        let s = bytes_as_str(&bytes).unwrap();
        assert_eq!(s.len(), bytes.len());
        assert_eq!(s, "Hello World!");
        assert!(bytes_as_str(&[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn test_str_as_bytes() {
        let s = "Hello World!";
        assert_eq!(str_as_bytes(s), s.as_bytes());
        assert_eq!(str_as_bytes(s).as_ptr(), s.as_ptr());
    }

    #[test]
    fn test_bytes_to_string_copies() {
        let mut bytes = b"Hello".to_vec();
        let owned = bytes_to_string(&bytes);
        bytes[0] = b'h';
        assert_eq!(owned, "Hello");
        assert_eq!(bytes_to_string(&[b'a', 0xFF]), "a\u{FFFD}");
    }
}
