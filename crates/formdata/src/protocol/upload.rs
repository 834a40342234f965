//! Uploaded file decoded from a multipart part.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use mime::Mime;

use crate::protocol::{Charset, DecodeError, TransferEncoding};
use crate::storage::{Backing, StoreError};

/// A file upload: the part's field name, the browser-supplied filename, the
/// declared content type and the content bytes, which may be memory- or
/// disk-resident depending on the factory policy.
///
/// The temp file of a disk-resident upload belongs to the upload until
/// [`FileUpload::move_to`] succeeds; until then it is removed by
/// [`FileUpload::delete`], by the session cleanup registry, or when the last
/// storage handle is dropped.
#[derive(Debug, Clone)]
pub struct FileUpload {
    name: String,
    filename: String,
    content_type: Mime,
    transfer_encoding: Option<TransferEncoding>,
    charset: Charset,
    backing: Backing,
    completed: bool,
}

impl FileUpload {
    pub(crate) fn new(
        name: String,
        filename: String,
        content_type: Mime,
        transfer_encoding: Option<TransferEncoding>,
        charset: Charset,
        backing: Backing,
    ) -> Self {
        Self { name, filename, content_type, transfer_encoding, charset, backing, completed: false }
    }

    /// The field name this upload was submitted under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The original filename as sent by the client.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }

    pub fn transfer_encoding(&self) -> Option<TransferEncoding> {
        self.transfer_encoding
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn set_charset(&mut self, charset: Charset) {
        self.charset = charset;
    }

    /// Appends content bytes; `last` completes the upload.
    pub fn add_chunk(&self, chunk: &[u8], last: bool) -> Result<(), DecodeError> {
        self.backing.write(chunk, last)?;
        Ok(())
    }

    pub(crate) fn mark_completed(&mut self) {
        self.completed = true;
    }

    /// The full content bytes, materialized from disk on demand.
    pub fn bytes(&self) -> Result<Bytes, DecodeError> {
        Ok(self.backing.bytes()?)
    }

    /// The content as text, decoded with the upload charset.
    pub fn text(&self) -> Result<String, DecodeError> {
        Ok(self.charset.decode(&self.backing.bytes()?))
    }

    /// The next slice for re-streaming; see [`Backing::chunk`].
    pub fn chunk(&self, length: usize) -> Result<Option<Bytes>, StoreError> {
        self.backing.chunk(length)
    }

    pub fn len(&self) -> u64 {
        self.backing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backing.is_empty()
    }

    /// True once the closing boundary confirmed no more bytes belong here.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_in_memory(&self) -> bool {
        self.backing.is_in_memory()
    }

    /// Persists the content at `dest` and takes the temp file out of
    /// automatic removal; see [`Backing::move_to`]. Callers iterating through
    /// a [`BodyDecoder`](crate::codec::BodyDecoder) should also call its
    /// `remove_from_cleanup` so the session cleanup skips this upload.
    pub fn move_to(&self, dest: &Path) -> Result<(), StoreError> {
        self.backing.move_to(dest)
    }

    /// Drops the content, removing a not-yet-renamed temp file.
    pub fn delete(&self) {
        self.backing.delete();
    }

    /// Path of the backing temp file while the content is disk-resident.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.backing.file_path()
    }

    /// The storage handle, for cleanup registry bookkeeping.
    pub fn storage(&self) -> &Backing {
        &self.backing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(backing: Backing) -> FileUpload {
        FileUpload::new("pics".into(), "file1.txt".into(), mime::TEXT_PLAIN, None, Charset::Utf8, backing)
    }

    #[test]
    fn accumulates_content() {
        let mut upload = upload(Backing::memory(0));
        upload.add_chunk(b"ab", false).unwrap();
        upload.add_chunk(b"c", true).unwrap();
        upload.mark_completed();

        assert!(upload.is_completed());
        assert_eq!(upload.bytes().unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(upload.text().unwrap(), "abc");
        assert_eq!(upload.name(), "pics");
        assert_eq!(upload.filename(), "file1.txt");
        assert_eq!(upload.content_type(), &mime::TEXT_PLAIN);
    }

    #[test]
    fn declared_size_caps_content() {
        let upload = upload(Backing::memory(2));
        let err = upload.add_chunk(b"abc", false).unwrap_err();
        assert!(matches!(err, DecodeError::Store { source: StoreError::CapacityExceeded { size: 3, limit: 2 } }));
    }
}
