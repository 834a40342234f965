//! Items emitted by the body decoders.

use crate::protocol::{Attribute, FileUpload};

/// One emission of a body decode step: a decoded item or the end marker.
///
/// After the closing delimiter was consumed, every further decode step
/// produces [`FormItem::Eof`] again, so a caller that keeps pulling sees a
/// stable terminal signal rather than an error.
#[derive(Debug, Clone)]
pub enum FormItem {
    /// A decoded textual attribute
    Attribute(Attribute),
    /// A decoded file upload
    Upload(FileUpload),
    /// Marks the end of the body
    Eof,
}

impl FormItem {
    /// Returns true if this item marks the end of the body
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, FormItem::Eof)
    }

    #[inline]
    pub fn is_attribute(&self) -> bool {
        matches!(self, FormItem::Attribute(_))
    }

    #[inline]
    pub fn is_upload(&self) -> bool {
        matches!(self, FormItem::Upload(_))
    }

    /// The item name, absent for the end marker.
    pub fn name(&self) -> Option<&str> {
        match self {
            FormItem::Attribute(attribute) => Some(attribute.name()),
            FormItem::Upload(upload) => Some(upload.name()),
            FormItem::Eof => None,
        }
    }

    pub fn as_attribute(&self) -> Option<&Attribute> {
        match self {
            FormItem::Attribute(attribute) => Some(attribute),
            _ => None,
        }
    }

    pub fn as_upload(&self) -> Option<&FileUpload> {
        match self {
            FormItem::Upload(upload) => Some(upload),
            _ => None,
        }
    }

    pub fn into_attribute(self) -> Option<Attribute> {
        match self {
            FormItem::Attribute(attribute) => Some(attribute),
            _ => None,
        }
    }

    pub fn into_upload(self) -> Option<FileUpload> {
        match self {
            FormItem::Upload(upload) => Some(upload),
            _ => None,
        }
    }
}
