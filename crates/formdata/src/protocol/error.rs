use std::io;
use thiserror::Error;

use crate::storage::StoreError;

/// Errors surfaced by body decoding.
///
/// "Need more data" is never an error: every decode step reports it as
/// `Ok(None)` and the facade absorbs it. The variants here are either fatal
/// protocol/storage failures that should abort the exchange, usage errors
/// ([`DecodeError::NotSupported`]), or the terminal [`DecodeError::EndOfBody`]
/// marker raised by any pull performed after decoding already finished.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid content type: {reason}")]
    InvalidContentType { reason: String },

    #[error("invalid multipart delimiter: {reason}")]
    InvalidDelimiter { reason: String },

    #[error("invalid part header: {reason}")]
    InvalidHeader { reason: String },

    #[error("unknown part header: {name}")]
    UnknownHeader { name: String },

    #[error("required part header missing: {name}")]
    MissingHeader { name: String },

    #[error("invalid data name: {reason}")]
    InvalidName { reason: String },

    #[error("unsupported charset: {label}")]
    UnsupportedCharset { label: String },

    #[error("unsupported transfer encoding: {value}")]
    UnsupportedTransferEncoding { value: String },

    #[error("invalid url-encoded body: {reason}")]
    InvalidUrlEncoded { reason: String },

    #[error("body decode not supported: {reason}")]
    NotSupported { reason: String },

    #[error("body decoding already finished")]
    EndOfBody,

    #[error("storage error: {source}")]
    Store {
        #[from]
        source: StoreError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl DecodeError {
    pub fn invalid_content_type<S: ToString>(str: S) -> Self {
        Self::InvalidContentType { reason: str.to_string() }
    }

    pub fn invalid_delimiter<S: ToString>(str: S) -> Self {
        Self::InvalidDelimiter { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn unknown_header<S: ToString>(str: S) -> Self {
        Self::UnknownHeader { name: str.to_string() }
    }

    pub fn missing_header<S: ToString>(str: S) -> Self {
        Self::MissingHeader { name: str.to_string() }
    }

    pub fn invalid_name<S: ToString>(str: S) -> Self {
        Self::InvalidName { reason: str.to_string() }
    }

    pub fn unsupported_charset<S: ToString>(str: S) -> Self {
        Self::UnsupportedCharset { label: str.to_string() }
    }

    pub fn unsupported_transfer_encoding<S: ToString>(str: S) -> Self {
        Self::UnsupportedTransferEncoding { value: str.to_string() }
    }

    pub fn invalid_url_encoded<S: ToString>(str: S) -> Self {
        Self::InvalidUrlEncoded { reason: str.to_string() }
    }

    pub fn not_supported<S: ToString>(str: S) -> Self {
        Self::NotSupported { reason: str.to_string() }
    }

    /// True for the terminal end-of-body marker.
    pub fn is_end_of_body(&self) -> bool {
        matches!(self, Self::EndOfBody)
    }
}
