//! Utility functions and types.

use std::fmt::Debug;

use percent_encoding::utf8_percent_encode;
use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;

/// AsciiSet for [RFC 3986 unreserved characters](https://www.rfc-editor.org/rfc/rfc3986#section-2.3)
///
/// - Encode every byte except: 'A'-'Z', 'a'-'z', '0'-'9', '-', '.', '_', and '~'.
///
/// This is the exact set OAuth 1.0a requires for both the signature base string
/// and the parameters carried in a request.
pub static UNRESERVED: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Same as [`UNRESERVED`] but keeps `/` so it can be used on paths.
pub static UNRESERVED_PATH: AsciiSet = UNRESERVED.remove(b'/');

/// Percent encode input with [`UNRESERVED`].
pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, &UNRESERVED).to_string()
}

/// Percent encode a path with [`UNRESERVED_PATH`].
pub fn percent_encode_path(input: &str) -> String {
    utf8_percent_encode(input, &UNRESERVED_PATH).to_string()
}

/// Redacts a string by replacing all but the first and last three characters with asterisks.
///
/// - If the input string has fewer than 12 characters, it should be entirely redacted.
/// - If the input string has 12 or more characters, only the first three and the last three.
pub struct Redact<'a>(&'a str);

impl<'a> From<&'a str> for Redact<'a> {
    fn from(value: &'a str) -> Self {
        Redact(value)
    }
}

impl<'a> From<&'a String> for Redact<'a> {
    fn from(value: &'a String) -> Self {
        Redact(value.as_str())
    }
}

impl<'a> From<&'a Option<String>> for Redact<'a> {
    fn from(value: &'a Option<String>) -> Self {
        match value {
            None => Redact(""),
            Some(v) => Redact(v),
        }
    }
}

impl Debug for Redact<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let length = self.0.len();
        if length == 0 {
            f.write_str("EMPTY")
        } else if length < 12 {
            f.write_str("***")
        } else {
            f.write_str(&self.0[..3])?;
            f.write_str("***")?;
            f.write_str(&self.0[length - 3..])
        }
    }
}
