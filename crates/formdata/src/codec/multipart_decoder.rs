//! Decoder implementation for `multipart/form-data` bodies.
//!
//! This module provides an incremental decoder for multipart bodies as
//! specified in [RFC 2388](https://tools.ietf.org/html/rfc2388) and
//! [RFC 2046 Section 5.1](https://tools.ietf.org/html/rfc2046#section-5.1),
//! including one nested level of `multipart/mixed` (several files submitted
//! under one field).
//!
//! Decoding is driven by a state machine over the accumulated input:
//!
//! ```text
//! (HeaderDelimiter Disposition (Field | Upload))*
//! (HeaderDelimiter Disposition
//!    (MixedDelimiter MixedDisposition MixedUpload)+
//!  MixedDelimiter(close))*
//! HeaderDelimiter(close) Epilogue
//! ```
//!
//! Each decode call makes as much progress as the buffered bytes allow and
//! returns `Ok(None)` when it needs more input. File upload content is
//! committed incrementally up to the last *safe cut point* — the position
//! just before the most recently confirmed line terminator — so bytes that
//! could still turn out to be the leading CRLF of a boundary are never
//! written twice nor lost across retries.

use bytes::{Buf, BytesMut};
use mime::Mime;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::cursor::ByteCursor;
use crate::ensure;
use crate::protocol::{Attribute, Charset, DecodeError, FileUpload, FormItem, TransferEncoding};
use crate::storage::{DataFactory, UploadCleaner};

/// Maximum size of one part-header block
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Maximum number of headers in one part
const MAX_PART_HEADERS: usize = 16;

/// A decoder for one `multipart/form-data` body.
///
/// Implements [`Decoder`] with [`FormItem`] as the item type: each
/// successful decode emits one completed [`Attribute`] or [`FileUpload`],
/// `Ok(None)` asks the caller to append more input and retry, and once the
/// closing delimiter was consumed every further call emits
/// [`FormItem::Eof`].
///
/// The boundary comes from the request's Content-Type
/// (`multipart/form-data; boundary=X`); parsing it is the caller's entry
/// transition, see [`multipart_boundary`].
#[derive(Debug)]
pub struct MultipartDecoder {
    state: State,
    /// Outer delimiter, `--` + boundary
    delimiter: String,
    /// Inner delimiter while inside a `multipart/mixed` part
    mixed_delimiter: Option<String>,
    /// Headers of the part currently being decoded
    part: PartHeaders,
    /// Upload receiving content across decode calls
    current_upload: Option<FileUpload>,
    factory: DataFactory,
    cleaner: UploadCleaner,
    charset: Charset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Expect `--boundary` (next part) or `--boundary--` (close)
    HeaderDelimiter,
    /// Read part headers up to the empty line
    Disposition,
    /// Decode a textual field value up to the boundary
    Field,
    /// Stream file content up to the boundary
    Upload,
    /// Same three states, one level inside a multipart/mixed part
    MixedDelimiter,
    MixedDisposition,
    MixedUpload,
    /// Body fully decoded; terminal
    Epilogue,
}

/// Outcome of a delimiter line
enum Delimiter {
    /// `--boundary`: a part follows
    Open,
    /// `--boundary--`: this multipart level is finished
    Close,
}

/// Headers collected for the part being decoded.
///
/// Inside a mixed part the field name spans several files while the
/// per-file headers reset between them.
#[derive(Debug, Default)]
struct PartHeaders {
    name: Option<String>,
    filename: Option<String>,
    content_type: Option<Mime>,
    transfer_encoding: Option<TransferEncoding>,
    charset: Option<Charset>,
    declared_length: u64,
}

impl PartHeaders {
    fn clear(&mut self) {
        *self = Default::default();
    }

    /// Resets everything a mixed sub-part declares for itself, keeping the
    /// field name of the enclosing part.
    fn clear_for_next_mixed_part(&mut self) {
        self.filename = None;
        self.content_type = None;
        self.transfer_encoding = None;
        self.charset = None;
        self.declared_length = 0;
    }
}

impl MultipartDecoder {
    /// Creates a decoder for a body delimited by `boundary`.
    ///
    /// Uploads are created through `factory` and registered with `cleaner`
    /// as soon as they exist, so a session cleanup also catches uploads
    /// whose content was still streaming when the request died.
    pub fn new(boundary: &str, charset: Charset, factory: DataFactory, cleaner: UploadCleaner) -> Self {
        Self {
            state: State::HeaderDelimiter,
            delimiter: format!("--{boundary}"),
            mixed_delimiter: None,
            part: PartHeaders::default(),
            current_upload: None,
            factory,
            cleaner,
            charset,
        }
    }

    /// Reads the next delimiter line, which must match `delimiter`.
    fn read_delimiter(src: &mut BytesMut, delimiter: &str) -> Result<Option<Delimiter>, DecodeError> {
        let mut cursor = ByteCursor::new(src);
        cursor.skip_control_chars();
        let Some(line) = cursor.read_line() else {
            ensure!(
                cursor.remaining() <= MAX_HEADER_BYTES,
                DecodeError::invalid_delimiter("delimiter line exceeds the size limit")
            );
            return Ok(None);
        };
        if line == delimiter {
            cursor.commit();
            Ok(Some(Delimiter::Open))
        } else if line.len() == delimiter.len() + 2 && line.starts_with(delimiter) && line.ends_with("--") {
            cursor.commit();
            Ok(Some(Delimiter::Close))
        } else {
            Err(DecodeError::invalid_delimiter(format!("expected {delimiter}, found {line}")))
        }
    }

    /// Parses the part-header block up to the empty line and decides the
    /// next state. `Ok(None)` when the block is not fully buffered yet.
    fn read_part_headers(&mut self, src: &mut BytesMut) -> Result<Option<State>, DecodeError> {
        let mixed = self.state == State::MixedDisposition;
        if !mixed {
            self.part.clear();
        }

        let mut switch_to_mixed = false;
        let offset = {
            let mut headers = [httparse::EMPTY_HEADER; MAX_PART_HEADERS];
            match httparse::parse_headers(&src[..], &mut headers) {
                Ok(httparse::Status::Complete((offset, parsed))) => {
                    for header in parsed {
                        let value = std::str::from_utf8(header.value)
                            .map_err(|_| DecodeError::invalid_header(format!("{} value is not text", header.name)))?;
                        if header.name.eq_ignore_ascii_case("content-disposition") {
                            self.read_disposition(value, mixed)?;
                        } else if header.name.eq_ignore_ascii_case("content-type") {
                            switch_to_mixed = self.read_content_type(value, mixed)?;
                        } else if header.name.eq_ignore_ascii_case("content-transfer-encoding") {
                            self.part.transfer_encoding = Some(
                                TransferEncoding::from_value(value)
                                    .ok_or_else(|| DecodeError::unsupported_transfer_encoding(value))?,
                            );
                        } else if header.name.eq_ignore_ascii_case("content-length") {
                            self.part.declared_length = value.trim().parse::<u64>().map_err(|_| {
                                DecodeError::invalid_header(format!("content-length value {value} is not u64"))
                            })?;
                        } else {
                            return Err(DecodeError::unknown_header(header.name));
                        }
                    }
                    offset
                }
                Ok(httparse::Status::Partial) => {
                    ensure!(
                        src.len() <= MAX_HEADER_BYTES,
                        DecodeError::invalid_header("part header block exceeds the size limit")
                    );
                    return Ok(None);
                }
                Err(e) => return Err(DecodeError::invalid_header(e.to_string())),
            }
        };
        src.advance(offset);

        if switch_to_mixed {
            return Ok(Some(State::MixedDelimiter));
        }
        match (mixed, self.part.filename.is_some()) {
            (false, true) => Ok(Some(State::Upload)),
            (false, false) => Ok(Some(State::Field)),
            (true, true) => Ok(Some(State::MixedUpload)),
            // a mixed sub-part carries files only
            (true, false) => Err(DecodeError::missing_header("filename")),
        }
    }

    /// Parses a Content-Disposition value: `form-data; name="a"` at the
    /// outer level, `attachment; filename="f"` inside a mixed part.
    fn read_disposition(&mut self, value: &str, mixed: bool) -> Result<(), DecodeError> {
        let mut segments = split_header_value(value);
        let disposition = segments.next().unwrap_or_default();
        let expected = if mixed { "attachment" } else { "form-data" };
        ensure!(
            disposition.eq_ignore_ascii_case(expected),
            DecodeError::invalid_header(format!("unexpected content disposition: {disposition}"))
        );
        for segment in segments {
            let Some((key, param)) = segment.split_once('=') else { continue };
            let key = key.trim().to_ascii_lowercase();
            let param = clean_param(param);
            match key.as_str() {
                "name" => self.part.name = Some(param),
                "filename" => self.part.filename = Some(param),
                _ => {}
            }
        }
        Ok(())
    }

    /// Parses a part Content-Type value; returns true when it declares the
    /// switch into a nested `multipart/mixed` cycle.
    fn read_content_type(&mut self, value: &str, mixed: bool) -> Result<bool, DecodeError> {
        let mut segments = split_header_value(value);
        let media_type = segments.next().unwrap_or_default().trim().to_string();
        let mime: Mime =
            media_type.parse().map_err(|_| DecodeError::invalid_header(format!("invalid content type: {value}")))?;

        if mime.type_() == mime::MULTIPART && mime.subtype() == "mixed" {
            ensure!(!mixed, DecodeError::invalid_header("mixed multipart inside a mixed multipart"));
            let boundary = segments
                .filter_map(|segment| segment.split_once('='))
                .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
                .map(|(_, param)| clean_param(param))
                .filter(|boundary| !boundary.is_empty())
                .ok_or_else(|| DecodeError::invalid_content_type("mixed multipart needs a boundary value"))?;
            self.mixed_delimiter = Some(format!("--{boundary}"));
            return Ok(true);
        }

        for segment in segments {
            if let Some((key, param)) = segment.split_once('=') {
                if key.trim().eq_ignore_ascii_case("charset") {
                    self.part.charset = Some(Charset::parse_label(&clean_param(param))?);
                }
            }
        }
        self.part.content_type = Some(mime);
        Ok(false)
    }

    /// Decodes a field value once the closing boundary is buffered.
    ///
    /// Unlike uploads, nothing is committed on suspend: the value is
    /// re-scanned in full when more input arrives.
    fn read_field(&mut self, src: &mut BytesMut) -> Result<Option<Attribute>, DecodeError> {
        match scan_for_delimiter(src, self.delimiter.as_bytes()) {
            Scan::Found { content_len } => {
                let charset = self.part.charset.unwrap_or(self.charset);
                let name = self.part.name.clone().ok_or_else(|| DecodeError::missing_header("name"))?;
                let value = charset.decode(&src[..content_len]);
                let attribute = self.factory.create_attribute(&name, &value, charset)?;
                src.advance(content_len);
                trace!(name = %attribute.name(), len = attribute.len(), "decoded form field");
                Ok(Some(attribute))
            }
            Scan::Partial { .. } => Ok(None),
        }
    }

    /// Streams upload content, committing up to the safe cut point on
    /// suspend and completing the upload once the boundary matched.
    fn read_upload(&mut self, src: &mut BytesMut) -> Result<Option<FileUpload>, DecodeError> {
        let mixed = self.state == State::MixedUpload;
        if self.current_upload.is_none() {
            self.current_upload = Some(self.start_upload()?);
        }
        let delimiter = if mixed {
            self.mixed_delimiter.as_deref().ok_or_else(|| DecodeError::invalid_delimiter("mixed delimiter not set"))?
        } else {
            &self.delimiter
        };

        match scan_for_delimiter(src, delimiter.as_bytes()) {
            Scan::Found { content_len } => {
                let mut upload = self
                    .current_upload
                    .take()
                    .ok_or_else(|| DecodeError::invalid_delimiter("no upload in progress"))?;
                upload.add_chunk(&src[..content_len], true)?;
                src.advance(content_len);
                upload.mark_completed();
                if mixed {
                    self.part.clear_for_next_mixed_part();
                    self.state = State::MixedDelimiter;
                } else {
                    self.part.clear();
                    self.state = State::HeaderDelimiter;
                }
                trace!(name = %upload.name(), filename = %upload.filename(), len = upload.len(), "completed file upload");
                Ok(Some(upload))
            }
            Scan::Partial { safe_len } => {
                if safe_len > 0 {
                    if let Some(upload) = &self.current_upload {
                        upload.add_chunk(&src[..safe_len], false)?;
                    }
                    src.advance(safe_len);
                }
                Ok(None)
            }
        }
    }

    /// Creates the upload for the current part from its headers.
    fn start_upload(&mut self) -> Result<FileUpload, DecodeError> {
        let name = self.part.name.clone().ok_or_else(|| DecodeError::missing_header("name"))?;
        let filename = self.part.filename.clone().ok_or_else(|| DecodeError::missing_header("filename"))?;
        let content_type =
            self.part.content_type.clone().ok_or_else(|| DecodeError::missing_header("content-type"))?;

        let mut charset = self.charset;
        if let Some(implied) = self.part.transfer_encoding.and_then(|encoding| encoding.implied_charset()) {
            charset = implied;
        }
        if let Some(explicit) = self.part.charset {
            charset = explicit;
        }

        let upload = self.factory.create_upload(
            &name,
            &filename,
            content_type,
            self.part.transfer_encoding,
            charset,
            self.part.declared_length,
        )?;
        self.cleaner.register(upload.storage());
        trace!(name = %upload.name(), filename = %upload.filename(), "started file upload");
        Ok(upload)
    }
}

impl Decoder for MultipartDecoder {
    type Item = FormItem;
    type Error = DecodeError;

    /// Advances the state machine as far as the buffered bytes allow.
    ///
    /// # Returns
    /// - `Ok(Some(FormItem::Attribute(_) | FormItem::Upload(_)))` for each completed item
    /// - `Ok(Some(FormItem::Eof))` once the body is fully decoded, stable across calls
    /// - `Ok(None)` when more input is needed
    /// - `Err(DecodeError)` on malformed bodies and storage failures, fatal
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // states hand control back to this loop instead of invoking each
        // other, so stack depth is flat no matter how many parts arrive
        loop {
            match self.state {
                State::Epilogue => {
                    trace!("multipart body fully decoded");
                    return Ok(Some(FormItem::Eof));
                }
                State::HeaderDelimiter => {
                    match Self::read_delimiter(src, &self.delimiter)? {
                        Some(Delimiter::Open) => self.state = State::Disposition,
                        Some(Delimiter::Close) => self.state = State::Epilogue,
                        None => return Ok(None),
                    }
                }
                State::MixedDelimiter => {
                    let delimiter = self
                        .mixed_delimiter
                        .as_deref()
                        .ok_or_else(|| DecodeError::invalid_delimiter("mixed delimiter not set"))?;
                    match Self::read_delimiter(src, delimiter)? {
                        Some(Delimiter::Open) => self.state = State::MixedDisposition,
                        Some(Delimiter::Close) => {
                            self.part.clear();
                            self.mixed_delimiter = None;
                            self.state = State::HeaderDelimiter;
                        }
                        None => return Ok(None),
                    }
                }
                State::Disposition | State::MixedDisposition => match self.read_part_headers(src)? {
                    Some(next) => self.state = next,
                    None => return Ok(None),
                },
                State::Field => match self.read_field(src)? {
                    Some(attribute) => {
                        self.part.clear();
                        self.state = State::HeaderDelimiter;
                        return Ok(Some(FormItem::Attribute(attribute)));
                    }
                    None => return Ok(None),
                },
                State::Upload | State::MixedUpload => match self.read_upload(src)? {
                    Some(upload) => return Ok(Some(FormItem::Upload(upload))),
                    None => return Ok(None),
                },
            }
        }
    }

    /// Like decode, but the input is known to be complete: running out of
    /// bytes before the closing delimiter is a truncated body.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(DecodeError::invalid_delimiter("body ended before the closing delimiter")),
        }
    }
}

/// Extracts the boundary from a request Content-Type.
///
/// Returns `Ok(None)` for anything that is not `multipart/form-data`, the
/// raw boundary for a well-formed multipart declaration, and an error for a
/// multipart declaration whose boundary parameter is empty or valueless.
pub fn multipart_boundary(content_type: &str) -> Result<Option<String>, DecodeError> {
    let mut segments = split_header_value(content_type);
    let media_type = segments.next().unwrap_or_default().trim().to_string();
    let Ok(mime) = media_type.parse::<Mime>() else {
        return Ok(None);
    };
    if mime != mime::MULTIPART_FORM_DATA {
        return Ok(None);
    }
    let mut saw_boundary = false;
    for segment in segments {
        let Some((key, param)) = segment.split_once('=') else { continue };
        if key.trim().eq_ignore_ascii_case("boundary") {
            saw_boundary = true;
            let boundary = clean_param(param);
            if !boundary.is_empty() {
                return Ok(Some(boundary));
            }
        }
    }
    if saw_boundary {
        Err(DecodeError::invalid_content_type("boundary parameter needs a value"))
    } else {
        // multipart without any boundary parameter decodes as a plain body
        Ok(None)
    }
}

/// Splits a header value into the leading token and its parameters.
/// Parameters are separated by `;`, or by `,` in the older agent form.
fn split_header_value(value: &str) -> impl Iterator<Item = &str> {
    let separator = if value.contains(';') { ';' } else { ',' };
    value.split(separator).map(str::trim)
}

/// Unquotes a header parameter value and strips separator characters.
fn clean_param(param: &str) -> String {
    let cleaned: String = param
        .chars()
        .filter(|c| *c != '"')
        .map(|c| if matches!(c, ':' | ',' | '=' | ';' | '\t') { ' ' } else { c })
        .collect();
    cleaned.trim().to_string()
}

/// Outcome of one boundary scan over the buffered content bytes.
enum Scan {
    /// Delimiter matched; `content_len` bytes precede its leading line
    /// terminator
    Found { content_len: usize },
    /// Input exhausted; only the first `safe_len` bytes are certain to be
    /// content
    Partial { safe_len: usize },
}

/// Scans content bytes for the next occurrence of `delimiter` at a line
/// start. The safe cut point trails the most recently confirmed CRLF/LF, so
/// a suspend never commits bytes that could still belong to a partially
/// received boundary.
fn scan_for_delimiter(src: &[u8], delimiter: &[u8]) -> Scan {
    let mut at_line_start = true;
    let mut safe = 0;
    let mut i = 0;
    while i < src.len() {
        if at_line_start {
            let n = usize::min(delimiter.len(), src.len() - i);
            if src[i..i + n] == delimiter[..n] {
                if n == delimiter.len() {
                    return Scan::Found { content_len: safe };
                }
                return Scan::Partial { safe_len: safe };
            }
            at_line_start = false;
        }
        match src[i] {
            b'\n' => {
                safe = i;
                at_line_start = true;
                i += 1;
            }
            b'\r' => {
                if i + 1 >= src.len() {
                    return Scan::Partial { safe_len: safe };
                }
                if src[i + 1] == b'\n' {
                    safe = i;
                    at_line_start = true;
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    Scan::Partial { safe_len: safe }
}
