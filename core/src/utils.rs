//! Utility functions and types.

use std::fmt::Debug;

/// Redacts secrets in `Debug` output.
///
/// Values shorter than 12 characters are hidden entirely. Longer values keep their
/// first and last three characters so two redacted secrets can still be told apart.
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
        Redact(value.as_deref().unwrap_or_default())
    }
}

impl Debug for Redact<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let length = self.0.len();
        match length {
            0 => f.write_str("EMPTY"),
            1..=11 => f.write_str("***"),
            _ => match (self.0.get(..3), self.0.get(length - 3..)) {
                (Some(head), Some(tail)) => write!(f, "{head}***{tail}"),
                // Multi-byte characters at the edges, hide everything.
                _ => f.write_str("***"),
            },
        }
    }
}

/// Bytes that hold key material, printed only by length.
pub struct RedactBytes<'a>(pub &'a [u8]);

impl Debug for RedactBytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{} bytes>", self.0.len())
    }
}
