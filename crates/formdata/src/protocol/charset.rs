//! Character set and transfer encoding handling for form data.
//!
//! Multipart bodies carry text in the charset the browser declares, either
//! explicitly through a `charset` parameter or implicitly through the
//! `Content-Transfer-Encoding` mechanism. Only the encodings a form decoder
//! actually encounters are supported: UTF-8, US-ASCII and ISO-8859-1.

use crate::protocol::DecodeError;

/// Character set used to decode textual form content.
///
/// Unknown charset labels are rejected at parse time with
/// [`DecodeError::UnsupportedCharset`]; decoding itself is lossy, replacing
/// unmappable bytes the way the platform charset decoders do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// UTF-8, the default for form submissions
    #[default]
    Utf8,
    /// US-ASCII, implied by `Content-Transfer-Encoding: 7bit`
    Ascii,
    /// ISO-8859-1, implied by `Content-Transfer-Encoding: 8bit`
    Latin1,
}

impl Charset {
    /// Resolves a charset label as found in a `charset=` parameter.
    ///
    /// Returns `None` for labels outside the supported set.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().trim_matches('"');
        if label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8") {
            Some(Self::Utf8)
        } else if label.eq_ignore_ascii_case("us-ascii") || label.eq_ignore_ascii_case("ascii") {
            Some(Self::Ascii)
        } else if label.eq_ignore_ascii_case("iso-8859-1")
            || label.eq_ignore_ascii_case("iso8859-1")
            || label.eq_ignore_ascii_case("latin1")
            || label.eq_ignore_ascii_case("latin-1")
        {
            Some(Self::Latin1)
        } else {
            None
        }
    }

    /// Like [`Charset::from_label`], but reports the unknown label as a decode error.
    pub fn parse_label(label: &str) -> Result<Self, DecodeError> {
        Self::from_label(label).ok_or_else(|| DecodeError::unsupported_charset(label))
    }

    /// The preferred MIME label of this charset.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "us-ascii",
            Self::Latin1 => "iso-8859-1",
        }
    }

    /// Decodes raw content bytes into text.
    ///
    /// Bytes outside the charset are replaced, never rejected: a body that
    /// made it through boundary scanning is content, whatever it contains.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Ascii => {
                bytes.iter().map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER }).collect()
            }
            Self::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    /// Encodes text into raw content bytes, replacing unmappable characters with `?`.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Ascii => text.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }).collect(),
            Self::Latin1 => text.chars().map(|c| if (c as u32) < 256 { c as u8 } else { b'?' }).collect(),
        }
    }
}

/// Transfer encoding mechanism of a multipart part.
///
/// Only identity mechanisms are allowed in `multipart/form-data`:
///
/// ```text
/// mechanism := "7bit" / "8bit" / "binary"
/// ```
///
/// `quoted-printable` and `base64` are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// Short lines of ASCII, the default mechanism
    #[default]
    Bit7,
    /// Short lines, bytes beyond ASCII allowed
    Bit8,
    /// Arbitrary binary content
    Binary,
}

impl TransferEncoding {
    /// Resolves a `Content-Transfer-Encoding` header value.
    pub fn from_value(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("7bit") {
            Some(Self::Bit7)
        } else if value.eq_ignore_ascii_case("8bit") {
            Some(Self::Bit8)
        } else if value.eq_ignore_ascii_case("binary") {
            Some(Self::Binary)
        } else {
            None
        }
    }

    /// The wire value of this mechanism.
    pub fn value(&self) -> &'static str {
        match self {
            Self::Bit7 => "7bit",
            Self::Bit8 => "8bit",
            Self::Binary => "binary",
        }
    }

    /// The charset this mechanism implies when the part declares none.
    ///
    /// `binary` implies nothing and leaves the configured default in place.
    pub fn implied_charset(&self) -> Option<Charset> {
        match self {
            Self::Bit7 => Some(Charset::Ascii),
            Self::Bit8 => Some(Charset::Latin1),
            Self::Binary => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_labels() {
        assert_eq!(Charset::from_label("UTF-8"), Some(Charset::Utf8));
        assert_eq!(Charset::from_label("\"iso-8859-1\""), Some(Charset::Latin1));
        assert_eq!(Charset::from_label("us-ascii"), Some(Charset::Ascii));
        assert_eq!(Charset::from_label("shift-jis"), None);
        assert!(Charset::parse_label("koi8-r").is_err());
    }

    #[test]
    fn latin1_round_trip() {
        let text = "caf\u{e9}";
        let bytes = Charset::Latin1.encode(text);
        assert_eq!(bytes, b"caf\xe9");
        assert_eq!(Charset::Latin1.decode(&bytes), text);
    }

    #[test]
    fn ascii_replaces_high_bytes() {
        assert_eq!(Charset::Ascii.decode(b"a\xffb"), "a\u{fffd}b");
        assert_eq!(Charset::Ascii.encode("a\u{e9}b"), b"a?b");
    }

    #[test]
    fn transfer_encoding_values() {
        assert_eq!(TransferEncoding::from_value("7BIT"), Some(TransferEncoding::Bit7));
        assert_eq!(TransferEncoding::from_value(" binary "), Some(TransferEncoding::Binary));
        assert_eq!(TransferEncoding::from_value("base64"), None);
        assert_eq!(TransferEncoding::Bit8.implied_charset(), Some(Charset::Latin1));
        assert_eq!(TransferEncoding::Binary.implied_charset(), None);
    }
}
