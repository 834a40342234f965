//! Core types for decoded form data.
//!
//! A decoded body is a sequence of items, each either a textual
//! [`Attribute`] or a [`FileUpload`]. Both carry a validated name and hold
//! their content in a [`Backing`](crate::storage::Backing) selected by the
//! [`DataFactory`](crate::storage::DataFactory) at creation time, so the
//! same item type serves memory-resident and disk-spooled content.
//!
//! # Components
//!
//! - [`Attribute`]: named textual value
//! - [`FileUpload`]: named file content with filename, content type,
//!   transfer encoding and charset
//! - [`FormItem`]: what a decode step emits — an item or the end marker
//! - [`Charset`] / [`TransferEncoding`]: text handling of part content
//! - [`DecodeError`]: error taxonomy of the whole crate

mod attribute;
pub use attribute::Attribute;

mod upload;
pub use upload::FileUpload;

mod item;
pub use item::FormItem;

mod charset;
pub use charset::Charset;
pub use charset::TransferEncoding;

mod error;
pub use error::DecodeError;

/// Validates a form data name: non-empty ASCII without separator or control
/// characters. Returns the trimmed name.
pub(crate) fn validate_name(name: &str) -> Result<String, DecodeError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DecodeError::invalid_name("empty name"));
    }
    for c in name.chars() {
        if !c.is_ascii() {
            return Err(DecodeError::invalid_name(format!("name contains non-ascii character: {name}")));
        }
        if matches!(c, '=' | ',' | ';' | ' ' | '\t' | '\r' | '\n' | '\x0b' | '\x0c') {
            return Err(DecodeError::invalid_name(format!(
                "name contains one of the prohibited characters =,; \\t\\r\\n\\v\\f: {name}"
            )));
        }
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_tokens() {
        assert_eq!(validate_name("field1").unwrap(), "field1");
        assert_eq!(validate_name("  padded  ").unwrap(), "padded");
        assert_eq!(validate_name("a-b_c.d!#$%").unwrap(), "a-b_c.d!#$%");
    }

    #[test]
    fn rejects_prohibited_characters() {
        for name in ["a=b", "a,b", "a;b", "a b", "a\tb", "a\rb", "a\nb", "a\x0bb", "a\x0cb"] {
            assert!(validate_name(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn rejects_empty_and_non_ascii() {
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("caf\u{e9}").is_err());
        assert!(validate_name("\u{80}").is_err());
    }
}
