//! Decoders for HTTP form bodies.
//!
//! This module turns the chunks of an entity body into decoded form items.
//! It follows a streaming approach: the facade accumulates input, and each
//! pull makes as much progress as the buffered bytes allow.
//!
//! # Components
//!
//! - [`BodyDecoder`]: facade dispatching on method and Content-Type,
//!   feeding chunks and pulling decoded items
//! - [`MultipartDecoder`]: incremental state machine for
//!   `multipart/form-data` bodies
//! - [`UrlEncodedDecoder`]: one-shot decoder for
//!   `application/x-www-form-urlencoded` bodies and query strings
//! - `ByteCursor`: position-tracked scanning over the accumulated bytes,
//!   internal
//!
//! # Example
//!
//! ```
//! use http::Method;
//! use micro_formdata::codec::{BodyDecoder, DecoderConfig};
//!
//! let mut decoder = BodyDecoder::new(
//!     &Method::POST,
//!     Some("application/x-www-form-urlencoded"),
//!     DecoderConfig::default(),
//! ).unwrap();
//!
//! decoder.new_chunk(b"a=1&b=2", true).unwrap();
//! while decoder.has_next().unwrap_or(false) {
//!     let item = decoder.next().unwrap().unwrap();
//!     let attribute = item.as_attribute().unwrap();
//!     println!("{} = {}", attribute.name(), attribute.value().unwrap());
//! }
//! ```

mod body_decoder;
mod cursor;
mod multipart_decoder;
mod urlencoded_decoder;

pub use body_decoder::BodyDecoder;
pub use body_decoder::DecoderConfig;
pub use multipart_decoder::multipart_boundary;
pub use multipart_decoder::MultipartDecoder;
pub use urlencoded_decoder::UrlEncodedDecoder;
pub use urlencoded_decoder::UrlEncodedForm;
