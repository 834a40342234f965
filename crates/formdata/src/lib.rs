//! A streaming decoder for HTTP form bodies
//!
//! This crate decodes request bodies sent as `application/x-www-form-urlencoded`
//! or `multipart/form-data`, producing structured attributes and file uploads
//! incrementally as network chunks arrive. Bodies never need to be fully
//! memory-resident: multipart content streams into tiered storage (memory,
//! disk, or memory-until-a-threshold), so large uploads decode under bounded
//! memory.
//!
//! # Features
//!
//! - Incremental `multipart/form-data` decoding, chunk by chunk
//! - One nested level of `multipart/mixed` (several files under one field)
//! - Tiered per-item storage: memory, disk, or mixed with a spool threshold
//! - Safe temp file lifecycle with session-wide cleanup and explicit persist
//! - One-shot `application/x-www-form-urlencoded` and query-string decoding
//! - UTF-8, US-ASCII and ISO-8859-1 content, including per-part overrides
//! - Split-invariant boundary scanning: chunk borders never lose or
//!   duplicate content bytes
//!
//! # Example
//!
//! ```
//! use http::Method;
//! use micro_formdata::codec::{BodyDecoder, DecoderConfig};
//! use micro_formdata::protocol::FormItem;
//!
//! let body = [
//!     "--boundary\r\n",
//!     "Content-Disposition: form-data; name=\"field1\"\r\n",
//!     "\r\n",
//!     "Joe Blow\r\n",
//!     "--boundary\r\n",
//!     "Content-Disposition: form-data; name=\"pics\"; filename=\"file1.txt\"\r\n",
//!     "Content-Type: text/plain\r\n",
//!     "\r\n",
//!     "abc\r\n",
//!     "--boundary--\r\n",
//! ]
//! .concat();
//!
//! let mut decoder = BodyDecoder::new(
//!     &Method::POST,
//!     Some("multipart/form-data; boundary=boundary"),
//!     DecoderConfig::default(),
//! )
//! .unwrap();
//!
//! // chunks may arrive split at any byte offset; here the body is one chunk
//! decoder.new_chunk(body.as_bytes(), true).unwrap();
//!
//! while let Some(item) = decoder.next().unwrap() {
//!     match item {
//!         FormItem::Attribute(attribute) => {
//!             assert_eq!(attribute.name(), "field1");
//!             assert_eq!(attribute.value().unwrap(), "Joe Blow");
//!         }
//!         FormItem::Upload(upload) => {
//!             assert_eq!(upload.filename(), "file1.txt");
//!             assert_eq!(&upload.bytes().unwrap()[..], b"abc");
//!         }
//!         FormItem::Eof => break,
//!     }
//! }
//!
//! // when the request is discarded, drop whatever was not persisted
//! decoder.clean_file_uploads();
//! ```
//!
//! # Architecture
//!
//! The crate is organized into three modules:
//!
//! - [`codec`]: the decoders — the [`codec::BodyDecoder`] facade, the
//!   multipart state machine and the url-encoded one-shot decoder
//! - [`protocol`]: decoded data types, charsets and the error taxonomy
//! - [`storage`]: tiered content storage, the item factory and the upload
//!   cleanup registry
//!
//! # Core Components
//!
//! ## Feeding and pulling
//!
//! The transport layer delivers discrete body chunks, each flagged
//! last-or-not, to [`codec::BodyDecoder::new_chunk`]. Decoded items are
//! pulled with [`codec::BodyDecoder::next`]: `Ok(Some(_))` is a completed
//! item, `Ok(None)` means more input is needed, and every pull after the
//! body finished reports [`protocol::DecodeError::EndOfBody`]. "Need more
//! data" is a normal return, never an error, so the owning I/O loop simply
//! buffers the next chunk and retries.
//!
//! ## Storage tiers
//!
//! Each item's bytes live behind a [`storage::Backing`] selected by the
//! [`storage::DataFactory`]: always memory, always disk, or mixed with a
//! spool threshold (16 KiB by default). A mixed backing migrates its
//! buffered bytes to disk exactly once, just before a write would cross the
//! threshold, and stays on disk from then on.
//!
//! ## Upload lifecycle
//!
//! Disk-backed uploads own their temp file until a successful
//! [`protocol::FileUpload::move_to`] hands it over. The facade registers
//! every upload in a cleanup registry;
//! [`codec::BodyDecoder::clean_file_uploads`] removes everything still
//! registered and is safe to call repeatedly, including on error paths.
//!
//! # Error Handling
//!
//! All failures surface as [`protocol::DecodeError`]: malformed multipart
//! structure, unknown or missing part headers, unsupported charsets and
//! transfer encodings, storage failures, and the usage error of decoding a
//! body on a method that has none. Fatal errors abort the exchange; there
//! are no internal retries.
//!
//! # Limitations
//!
//! - No full MIME support; transfer encodings are limited to 7bit, 8bit
//!   and binary
//! - `multipart/mixed` nests at most one level inside `multipart/form-data`
//! - url-encoded bodies decode only once fully buffered, the format has no
//!   internal delimiter
//! - Maximum part-header block size: 8KB

pub mod codec;
pub mod protocol;
pub mod storage;

mod utils;
pub(crate) use utils::ensure;
