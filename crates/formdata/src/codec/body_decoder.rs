//! Request body decoder facade.
//!
//! [`BodyDecoder`] is the entry point tying the pieces together: it decides
//! from the request method and Content-Type whether and how the body
//! decodes, accumulates the chunks the transport delivers, and exposes pull
//! iteration over the decoded items so callers interleave network reads with
//! consuming attributes and uploads. It also owns the cleanup registry for
//! every file upload the session created.
//!
//! "Need more data" never escapes as an error here: [`BodyDecoder::next`]
//! reports it as `Ok(None)` and the caller feeds the next chunk. Fatal
//! decode errors and the terminal [`DecodeError::EndOfBody`] propagate.

use bytes::BytesMut;
use http::{HeaderMap, Method};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::multipart_decoder::{multipart_boundary, MultipartDecoder};
use crate::codec::urlencoded_decoder::{UrlEncodedDecoder, UrlEncodedForm};
use crate::ensure;
use crate::protocol::{Attribute, Charset, DecodeError, FileUpload, FormItem};
use crate::storage::{DataFactory, UploadCleaner};

/// Configuration of a [`BodyDecoder`]: the storage factory for decoded
/// items and the default charset for textual content.
#[derive(Debug, Clone, Default)]
pub struct DecoderConfig {
    pub factory: DataFactory,
    pub charset: Charset,
}

/// Decoder for one request entity body.
///
/// Feed chunks with [`BodyDecoder::new_chunk`] as they arrive and pull
/// decoded items with [`BodyDecoder::has_next`] / [`BodyDecoder::next`].
/// When the owning request is discarded — on success and on error paths
/// alike — call [`BodyDecoder::clean_file_uploads`] to remove the temp
/// files of uploads nobody persisted.
#[derive(Debug)]
pub struct BodyDecoder {
    kind: Kind,
    buffer: BytesMut,
    last_chunk_seen: bool,
    charset: Charset,
    factory: DataFactory,
    cleaner: UploadCleaner,
    pending: Option<FormItem>,
    finished: bool,
}

/// The decoding strategy, fixed at construction.
#[derive(Debug)]
enum Kind {
    /// `multipart/form-data`: decoded incrementally as chunks arrive
    Multipart(MultipartDecoder),
    /// url-encoded: decoded in one pass once the body is complete
    UrlEncoded { form: Option<UrlEncodedForm>, next: usize },
    /// The method carries no decodable body
    NoBody,
}

impl BodyDecoder {
    /// Creates a decoder for a request.
    ///
    /// A `multipart/form-data` Content-Type selects incremental multipart
    /// decoding regardless of method; otherwise POST and PUT bodies decode
    /// as url-encoded parameters and any other method has no decodable
    /// body, making every feed or pull a usage error.
    pub fn new(method: &Method, content_type: Option<&str>, config: DecoderConfig) -> Result<Self, DecodeError> {
        let DecoderConfig { factory, charset } = config;
        let cleaner = UploadCleaner::new();

        let boundary = match content_type {
            Some(value) => multipart_boundary(value)?,
            None => None,
        };
        let kind = if let Some(boundary) = boundary {
            trace!(%boundary, "request body is multipart");
            Kind::Multipart(MultipartDecoder::new(&boundary, charset, factory.clone(), cleaner.clone()))
        } else if *method == Method::POST || *method == Method::PUT {
            Kind::UrlEncoded { form: None, next: 0 }
        } else {
            Kind::NoBody
        };

        Ok(Self {
            kind,
            buffer: BytesMut::new(),
            last_chunk_seen: false,
            charset,
            factory,
            cleaner,
            pending: None,
            finished: false,
        })
    }

    /// True when the body decodes as multipart.
    pub fn is_multipart(&self) -> bool {
        matches!(self.kind, Kind::Multipart(_))
    }

    /// True once the body was fully decoded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn ensure_decodable(&self) -> Result<(), DecodeError> {
        ensure!(
            !matches!(self.kind, Kind::NoBody),
            DecodeError::not_supported("only POST or PUT requests carry a decodable body")
        );
        Ok(())
    }

    /// Appends one body chunk; `is_last` marks the end of the body.
    pub fn new_chunk(&mut self, chunk: &[u8], is_last: bool) -> Result<(), DecodeError> {
        self.ensure_decodable()?;
        self.buffer.extend_from_slice(chunk);
        if is_last {
            self.last_chunk_seen = true;
        }
        Ok(())
    }

    /// True when a decoded item is available right now.
    ///
    /// `Ok(false)` means more input is needed; feed another chunk and ask
    /// again. Every call after the body finished decoding reports
    /// [`DecodeError::EndOfBody`].
    pub fn has_next(&mut self) -> Result<bool, DecodeError> {
        self.ensure_decodable()?;
        if self.finished {
            return Err(DecodeError::EndOfBody);
        }
        if self.pending.is_some() {
            return Ok(true);
        }
        match self.poll()? {
            Some(item) => {
                self.pending = Some(item);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The next decoded item, or `Ok(None)` when more input is needed.
    ///
    /// The call that consumes the closing delimiter itself reports
    /// `Ok(None)`; every later call reports [`DecodeError::EndOfBody`].
    pub fn next(&mut self) -> Result<Option<FormItem>, DecodeError> {
        self.ensure_decodable()?;
        if self.finished {
            return Err(DecodeError::EndOfBody);
        }
        if let Some(item) = self.pending.take() {
            return Ok(Some(item));
        }
        self.poll()
    }

    fn poll(&mut self) -> Result<Option<FormItem>, DecodeError> {
        match &mut self.kind {
            Kind::Multipart(decoder) => {
                let item = if self.last_chunk_seen {
                    decoder.decode_eof(&mut self.buffer)?
                } else {
                    decoder.decode(&mut self.buffer)?
                };
                match item {
                    Some(FormItem::Eof) => {
                        self.finished = true;
                        Ok(None)
                    }
                    Some(item) => Ok(Some(item)),
                    None => Ok(None),
                }
            }
            Kind::UrlEncoded { form, next } => {
                if !self.last_chunk_seen {
                    return Ok(None);
                }
                if form.is_none() {
                    let decoder = UrlEncodedDecoder::new(self.charset, self.factory.clone());
                    *form = Some(decoder.decode(&self.buffer)?);
                }
                let attributes = form.as_ref().map(UrlEncodedForm::attributes).unwrap_or_default();
                if *next < attributes.len() {
                    let attribute = attributes[*next].clone();
                    *next += 1;
                    Ok(Some(FormItem::Attribute(attribute)))
                } else {
                    self.finished = true;
                    Err(DecodeError::EndOfBody)
                }
            }
            Kind::NoBody => Err(DecodeError::not_supported("only POST or PUT requests carry a decodable body")),
        }
    }

    /// The decoded parameters of an url-encoded body, list and map at once.
    ///
    /// `Ok(None)` until the last chunk arrived; a usage error for multipart
    /// bodies, whose items only stream through [`BodyDecoder::next`].
    pub fn form_attributes(&mut self) -> Result<Option<&UrlEncodedForm>, DecodeError> {
        match &mut self.kind {
            Kind::UrlEncoded { form, .. } => {
                if !self.last_chunk_seen {
                    return Ok(None);
                }
                if form.is_none() {
                    let decoder = UrlEncodedDecoder::new(self.charset, self.factory.clone());
                    *form = Some(decoder.decode(&self.buffer)?);
                }
                Ok(form.as_ref())
            }
            _ => Err(DecodeError::not_supported("body attributes require an url-encoded body")),
        }
    }

    /// The first url-encoded attribute with the given name, ignoring case.
    pub fn form_attribute(&mut self, name: &str) -> Result<Option<Attribute>, DecodeError> {
        Ok(self.form_attributes()?.and_then(|form| form.first(name).cloned()))
    }

    /// Maps already-parsed request headers into attribute form, one per
    /// header value. Cookie headers are left to a cookie parser and skipped.
    pub fn attributes_from_headers(&self, headers: &HeaderMap) -> Result<Vec<Attribute>, DecodeError> {
        let mut attributes = Vec::with_capacity(headers.len());
        for (name, value) in headers {
            if name == &http::header::COOKIE {
                continue;
            }
            let value = value
                .to_str()
                .map_err(|_| DecodeError::invalid_header(format!("{name} value is not text")))?;
            attributes.push(self.factory.create_attribute(name.as_str(), value, self.charset)?);
        }
        Ok(attributes)
    }

    /// Decodes the query string of a request URI into attribute form.
    pub fn attributes_from_query(&self, uri: &str) -> Result<UrlEncodedForm, DecodeError> {
        UrlEncodedDecoder::new(self.charset, self.factory.clone()).decode_query(uri)
    }

    /// Deletes the temp file of every upload this session created and did
    /// not persist. Idempotent; call it whenever the owning request ends.
    pub fn clean_file_uploads(&self) {
        self.cleaner.clean();
    }

    /// Opts an upload out of [`BodyDecoder::clean_file_uploads`], typically
    /// after its content was moved to its final location.
    pub fn remove_from_cleanup(&self, upload: &FileUpload) {
        self.cleaner.remove(upload.storage());
    }
}
