//! Named textual form attribute.

use std::path::Path;

use bytes::Bytes;

use crate::protocol::{Charset, DecodeError};
use crate::storage::{Backing, StoreError};

/// A name/value pair decoded from a form body, a query string or a header.
///
/// The value is held as raw bytes in the attribute's [`Backing`] and decoded
/// to text on demand with the attribute's charset, so an oversized value can
/// live on disk like any upload. Cloning is cheap and shares the backing.
#[derive(Debug, Clone)]
pub struct Attribute {
    name: String,
    charset: Charset,
    backing: Backing,
    completed: bool,
}

impl Attribute {
    pub(crate) fn new(name: String, charset: Charset, backing: Backing) -> Self {
        Self { name, charset, backing, completed: false }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn set_charset(&mut self, charset: Charset) {
        self.charset = charset;
    }

    /// Sets the complete value, encoding it with the attribute charset.
    pub fn set_value(&mut self, value: &str) -> Result<(), DecodeError> {
        let bytes = self.charset.encode(value);
        self.backing.write(&bytes, true)?;
        self.completed = true;
        Ok(())
    }

    /// Appends raw content bytes; `last` completes the attribute.
    pub fn add_chunk(&mut self, chunk: &[u8], last: bool) -> Result<(), DecodeError> {
        self.backing.write(chunk, last)?;
        if last {
            self.completed = true;
        }
        Ok(())
    }

    /// The value as text, decoded with the attribute charset.
    pub fn value(&self) -> Result<String, DecodeError> {
        Ok(self.charset.decode(&self.backing.bytes()?))
    }

    /// The raw value bytes, materialized from disk on demand.
    pub fn bytes(&self) -> Result<Bytes, DecodeError> {
        Ok(self.backing.bytes()?)
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

    /// True once no more content bytes belong to this attribute.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_in_memory(&self) -> bool {
        self.backing.is_in_memory()
    }

    /// Moves the value content to `dest`; see [`Backing::move_to`].
    pub fn move_to(&self, dest: &Path) -> Result<(), StoreError> {
        self.backing.move_to(dest)
    }

    /// Drops the stored value, removing any temp file.
    pub fn delete(&self) {
        self.backing.delete();
    }

    pub fn file_path(&self) -> Option<std::path::PathBuf> {
        self.backing.file_path()
    }

    /// The storage handle, for cleanup registry bookkeeping.
    pub fn storage(&self) -> &Backing {
        &self.backing
    }
}
