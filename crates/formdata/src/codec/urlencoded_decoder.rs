//! One-shot decoder for `application/x-www-form-urlencoded` bodies.
//!
//! The format carries no internal delimiter a streaming decoder could cut
//! at, so decoding runs exactly once over the fully buffered body. The same
//! routine serves URI query strings, which use the identical encoding.

use std::collections::HashMap;

use tracing::trace;

use crate::protocol::{Attribute, Charset, DecodeError};
use crate::storage::DataFactory;

/// The decoded parameters of an url-encoded body or query string.
///
/// Keys are lower-cased at decode time, so lookups are case-insensitive.
/// The ordered list and the name-keyed map hold the same attributes.
#[derive(Debug, Default)]
pub struct UrlEncodedForm {
    list: Vec<Attribute>,
    map: HashMap<String, Vec<Attribute>>,
}

impl UrlEncodedForm {
    /// All attributes in body order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.list
    }

    /// All attributes with the given name, ignoring case.
    pub fn all(&self, name: &str) -> Option<&[Attribute]> {
        self.map.get(&name.to_lowercase()).map(Vec::as_slice)
    }

    /// The first attribute with the given name, ignoring case.
    pub fn first(&self, name: &str) -> Option<&Attribute> {
        self.map.get(&name.to_lowercase()).and_then(|attributes| attributes.first())
    }

    /// The value of the first attribute with the given name, ignoring case.
    pub fn value(&self, name: &str) -> Option<String> {
        self.first(name).and_then(|attribute| attribute.value().ok())
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// Decoder for url-encoded parameter lists.
///
/// Splits on `&`, each segment at its first `=`, percent-decodes key and
/// value with the configured charset and lower-cases the key. Segments
/// without a `=` carry no decodable pair and are skipped.
#[derive(Debug)]
pub struct UrlEncodedDecoder {
    charset: Charset,
    factory: DataFactory,
}

impl UrlEncodedDecoder {
    pub fn new(charset: Charset, factory: DataFactory) -> Self {
        Self { charset, factory }
    }

    /// Decodes a complete body.
    pub fn decode(&self, body: &[u8]) -> Result<UrlEncodedForm, DecodeError> {
        let mut form = UrlEncodedForm::default();
        for segment in body.split(|&b| b == b'&') {
            if segment.is_empty() {
                continue;
            }
            let Some(eq) = segment.iter().position(|&b| b == b'=') else {
                continue;
            };
            let key = decode_component(&segment[..eq], self.charset)?.to_lowercase();
            let value = decode_component(&segment[eq + 1..], self.charset)?;
            let attribute = self.factory.create_attribute(&key, &value, self.charset)?;
            form.map.entry(key).or_default().push(attribute.clone());
            form.list.push(attribute);
        }
        trace!(count = form.len(), "decoded url-encoded parameters");
        Ok(form)
    }

    /// Decodes the query-string part of a request URI.
    ///
    /// Everything up to and including the first `?` is ignored, so both a
    /// full URI and a bare query string decode the same way.
    pub fn decode_query(&self, uri: &str) -> Result<UrlEncodedForm, DecodeError> {
        let query = match uri.find('?') {
            Some(pos) => &uri[pos + 1..],
            None => uri,
        };
        self.decode(query.as_bytes())
    }
}

/// Percent-decodes one component: `+` means space, `%XX` is a raw byte,
/// and the resulting bytes are decoded with `charset`.
fn decode_component(bytes: &[u8], charset: Charset) -> Result<String, DecodeError> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let (high, low) = match (bytes.get(i + 1), bytes.get(i + 2)) {
                    (Some(&high), Some(&low)) => (hex_value(high), hex_value(low)),
                    _ => (None, None),
                };
                match (high, low) {
                    (Some(high), Some(low)) => {
                        out.push(high << 4 | low);
                        i += 3;
                    }
                    _ => {
                        return Err(DecodeError::invalid_url_encoded(format!(
                            "incomplete escape at offset {i}"
                        )));
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Ok(charset.decode(&out))
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> UrlEncodedDecoder {
        UrlEncodedDecoder::new(Charset::Utf8, DataFactory::in_memory())
    }

    #[test]
    fn decodes_ordered_pairs() {
        let form = decoder().decode(b"a=1&b=2").unwrap();
        assert_eq!(form.len(), 2);
        assert_eq!(form.attributes()[0].name(), "a");
        assert_eq!(form.attributes()[0].value().unwrap(), "1");
        assert_eq!(form.attributes()[1].name(), "b");
        assert_eq!(form.attributes()[1].value().unwrap(), "2");
    }

    #[test]
    fn lookup_ignores_case() {
        let form = decoder().decode(b"UserName=joe").unwrap();
        assert_eq!(form.value("username").unwrap(), "joe");
        assert_eq!(form.value("USERNAME").unwrap(), "joe");
        assert_eq!(form.attributes()[0].name(), "username");
    }

    #[test]
    fn repeated_names_accumulate() {
        let form = decoder().decode(b"tag=a&tag=b&other=c").unwrap();
        let tags = form.all("tag").unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].value().unwrap(), "a");
        assert_eq!(tags[1].value().unwrap(), "b");
    }

    #[test]
    fn plus_and_percent_escapes() {
        let form = decoder().decode(b"greeting=hello+world%21").unwrap();
        assert_eq!(form.value("greeting").unwrap(), "hello world!");
    }

    #[test]
    fn charset_applies_to_escaped_bytes() {
        let latin1 = UrlEncodedDecoder::new(Charset::Latin1, DataFactory::in_memory());
        let form = latin1.decode(b"city=Z%FCrich").unwrap();
        assert_eq!(form.value("city").unwrap(), "Z\u{fc}rich");
    }

    #[test]
    fn bare_tokens_and_empty_segments_are_skipped() {
        let form = decoder().decode(b"lonely&&a=1&").unwrap();
        assert_eq!(form.len(), 1);
        assert_eq!(form.value("a").unwrap(), "1");
    }

    #[test]
    fn empty_values_are_kept() {
        let form = decoder().decode(b"empty=&full=x").unwrap();
        assert_eq!(form.value("empty").unwrap(), "");
        assert_eq!(form.value("full").unwrap(), "x");
    }

    #[test]
    fn malformed_escape_is_fatal() {
        assert!(decoder().decode(b"a=%2").is_err());
        assert!(decoder().decode(b"a=%zz").is_err());
    }

    #[test]
    fn query_string_of_a_uri() {
        let form = decoder().decode_query("/index?a=1&b=2&a=3").unwrap();
        assert_eq!(form.len(), 3);
        assert_eq!(form.all("a").unwrap().len(), 2);
        assert_eq!(form.value("b").unwrap(), "2");
    }

    #[test]
    fn round_trip_of_encoded_pairs() {
        let encoded = "a=1&b=2";
        let form = decoder().decode(encoded.as_bytes()).unwrap();
        let rebuilt: Vec<String> = form
            .attributes()
            .iter()
            .map(|attribute| format!("{}={}", attribute.name(), attribute.value().unwrap()))
            .collect();
        assert_eq!(rebuilt.join("&"), encoded);
    }
}
