//! In-memory content store.
//!
//! Accumulates writes into a [`BytesMut`] and freezes the buffer into a
//! shared [`Bytes`] once the content is complete, so later reads and chunked
//! re-streaming are cheap slices instead of copies.

use bytes::{Bytes, BytesMut};

use crate::storage::StoreError;

#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    buf: BytesMut,
    frozen: Option<Bytes>,
    read_pos: usize,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    pub(crate) fn len(&self) -> u64 {
        match &self.frozen {
            Some(bytes) => bytes.len() as u64,
            None => self.buf.len() as u64,
        }
    }

    pub(crate) fn write(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        if self.frozen.is_some() {
            return Err(StoreError::Sealed);
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    pub(crate) fn complete(&mut self) {
        if self.frozen.is_none() {
            self.frozen = Some(self.buf.split().freeze());
        }
    }

    /// Full accumulated content. Copies only while still accepting writes.
    pub(crate) fn content(&self) -> Bytes {
        match &self.frozen {
            Some(bytes) => bytes.clone(),
            None => Bytes::copy_from_slice(&self.buf),
        }
    }

    /// Hands the accumulated buffer over for migration to another store.
    pub(crate) fn take_buffer(&mut self) -> BytesMut {
        self.buf.split()
    }

    pub(crate) fn chunk(&mut self, length: usize) -> Option<Bytes> {
        let total = self.len() as usize;
        if length == 0 || self.read_pos >= total {
            self.read_pos = 0;
            return None;
        }
        let end = usize::min(self.read_pos + length, total);
        let slice = match &self.frozen {
            Some(bytes) => bytes.slice(self.read_pos..end),
            None => Bytes::copy_from_slice(&self.buf[self.read_pos..end]),
        };
        self.read_pos = end;
        Some(slice)
    }

    pub(crate) fn delete(&mut self) {
        self.buf.clear();
        self.frozen = None;
        self.read_pos = 0;
    }

    pub(crate) fn move_to(&mut self, dest: &std::path::Path) -> Result<(), StoreError> {
        std::fs::write(dest, self.content())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_freezes() {
        let mut store = MemoryStore::new();
        store.write(b"hello ").unwrap();
        store.write(b"world").unwrap();
        assert_eq!(store.len(), 11);

        store.complete();
        assert_eq!(store.content(), Bytes::from_static(b"hello world"));
        assert_eq!(store.len(), 11);
        assert!(store.write(b"more").is_err());
    }

    #[test]
    fn chunk_signals_exhaustion_then_restarts() {
        let mut store = MemoryStore::new();
        store.write(b"abcdef").unwrap();
        store.complete();

        assert_eq!(store.chunk(4).unwrap(), Bytes::from_static(b"abcd"));
        assert_eq!(store.chunk(4).unwrap(), Bytes::from_static(b"ef"));
        assert!(store.chunk(4).is_none());
        // exhaustion rewinds, a new pass starts from the beginning
        assert_eq!(store.chunk(3).unwrap(), Bytes::from_static(b"abc"));
    }

    #[test]
    fn delete_drops_content() {
        let mut store = MemoryStore::new();
        store.write(b"abc").unwrap();
        store.complete();
        store.delete();
        assert_eq!(store.len(), 0);
        assert!(store.content().is_empty());
    }
}
