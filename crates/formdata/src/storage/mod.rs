//! Tiered content storage for decoded form items.
//!
//! Every decoded attribute and file upload accumulates its bytes through a
//! [`Backing`], which hides where the content actually lives:
//!
//! - memory: a growable buffer, bounded only by address space
//! - disk: a lazily created temp file, streamed to as chunks arrive
//! - mixed: memory first, migrating to disk once a size threshold is crossed
//!
//! The variants expose one capability surface, so the decoder and callers
//! never branch on the storage tier. [`DataFactory`] selects the tier for
//! each new item; [`UploadCleaner`] tracks the disk resources created during
//! a decode session for bulk removal.
//!
//! A `Backing` is a cheap-to-clone shared handle. The decode model is
//! single-threaded by design (one decoder per in-flight request), so the
//! sharing uses `Rc<RefCell<_>>` rather than atomics: the handle held by an
//! emitted item and the one held by the cleanup registry refer to the same
//! underlying store.

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bytes::Bytes;
use thiserror::Error;
use tracing::trace;

mod cleanup;
mod disk;
mod factory;
mod memory;

pub use cleanup::UploadCleaner;
pub use factory::{DataFactory, StoragePolicy, TempFileConfig, DEFAULT_MEMORY_THRESHOLD};

use disk::DiskStore;
use memory::MemoryStore;

/// Errors raised by the storage tier.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("declared size {limit} exceeded: content would reach {size} bytes")]
    CapacityExceeded { size: u64, limit: u64 },

    #[error("content storage no longer accepts writes")]
    Sealed,

    #[error("copy fallback wrote {copied} of {expected} bytes")]
    IncompleteCopy { expected: u64, copied: u64 },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Shared handle to the byte storage of one decoded item.
///
/// Writes respect the declared size cap recorded at construction: a cap
/// greater than zero is never exceeded by any write. Content can be read
/// back whole ([`Backing::bytes`]), streamed in slices ([`Backing::chunk`]),
/// moved out of temp storage ([`Backing::move_to`]) or dropped
/// ([`Backing::delete`]).
#[derive(Debug, Clone)]
pub struct Backing {
    inner: Rc<RefCell<Inner>>,
}

#[derive(Debug)]
struct Inner {
    /// Declared size cap; 0 means undeclared
    cap: u64,
    store: Store,
}

#[derive(Debug)]
enum Store {
    Memory(MemoryStore),
    Disk(DiskStore),
    /// Memory until `threshold` would be crossed, disk from then on
    Mixed { threshold: u64, config: TempFileConfig, hint: Option<String>, active: Box<Store> },
}

impl Store {
    fn len(&self) -> u64 {
        match self {
            Store::Memory(store) => store.len(),
            Store::Disk(store) => store.len(),
            Store::Mixed { active, .. } => active.len(),
        }
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        match self {
            Store::Memory(store) => store.write(chunk),
            Store::Disk(store) => store.write(chunk),
            Store::Mixed { threshold, config, hint, active } => {
                if let Store::Memory(memory) = active.as_mut() {
                    if memory.len() + chunk.len() as u64 > *threshold {
                        trace!(threshold, "content crossed threshold, migrating to disk");
                        let mut disk = DiskStore::new(config.clone(), hint.clone());
                        let buffered = memory.take_buffer();
                        if !buffered.is_empty() {
                            disk.write(&buffered)?;
                        }
                        **active = Store::Disk(disk);
                    }
                }
                active.write(chunk)
            }
        }
    }

    fn complete(&mut self) -> Result<(), StoreError> {
        match self {
            Store::Memory(store) => {
                store.complete();
                Ok(())
            }
            Store::Disk(store) => store.complete(),
            Store::Mixed { active, .. } => active.complete(),
        }
    }

    fn content(&self) -> Result<Bytes, StoreError> {
        match self {
            Store::Memory(store) => Ok(store.content()),
            Store::Disk(store) => store.content(),
            Store::Mixed { active, .. } => active.content(),
        }
    }

    fn chunk(&mut self, length: usize) -> Result<Option<Bytes>, StoreError> {
        match self {
            Store::Memory(store) => Ok(store.chunk(length)),
            Store::Disk(store) => store.chunk(length),
            Store::Mixed { active, .. } => active.chunk(length),
        }
    }

    fn move_to(&mut self, dest: &Path) -> Result<(), StoreError> {
        match self {
            Store::Memory(store) => store.move_to(dest),
            Store::Disk(store) => store.move_to(dest),
            Store::Mixed { active, .. } => active.move_to(dest),
        }
    }

    fn delete(&mut self) {
        match self {
            Store::Memory(store) => store.delete(),
            Store::Disk(store) => store.delete(),
            Store::Mixed { active, .. } => active.delete(),
        }
    }

    fn is_in_memory(&self) -> bool {
        match self {
            Store::Memory(_) => true,
            Store::Disk(_) => false,
            Store::Mixed { active, .. } => active.is_in_memory(),
        }
    }

    fn is_renamed(&self) -> bool {
        match self {
            Store::Memory(_) => false,
            Store::Disk(store) => store.is_renamed(),
            Store::Mixed { active, .. } => active.is_renamed(),
        }
    }

    fn file_path(&self) -> Option<PathBuf> {
        match self {
            Store::Memory(_) => None,
            Store::Disk(store) => store.file_path().map(Path::to_path_buf),
            Store::Mixed { active, .. } => active.file_path(),
        }
    }
}

impl Backing {
    pub(crate) fn memory(cap: u64) -> Self {
        Self::from_store(cap, Store::Memory(MemoryStore::new()))
    }

    pub(crate) fn disk(config: TempFileConfig, hint: Option<String>, cap: u64) -> Self {
        Self::from_store(cap, Store::Disk(DiskStore::new(config, hint)))
    }

    pub(crate) fn mixed(config: TempFileConfig, hint: Option<String>, threshold: u64, cap: u64) -> Self {
        // a declared size already past the threshold skips the memory phase
        let active = if cap > threshold {
            Store::Disk(DiskStore::new(config.clone(), hint.clone()))
        } else {
            Store::Memory(MemoryStore::new())
        };
        Self::from_store(cap, Store::Mixed { threshold, config, hint, active: Box::new(active) })
    }

    fn from_store(cap: u64, store: Store) -> Self {
        Self { inner: Rc::new(RefCell::new(Inner { cap, store })) }
    }

    /// Appends a chunk of content, closing the storage when `last` is set.
    ///
    /// The write is rejected whole when it would push the total past the
    /// declared size cap.
    pub fn write(&self, chunk: &[u8], last: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        let size = inner.store.len() + chunk.len() as u64;
        if inner.cap > 0 && size > inner.cap {
            return Err(StoreError::CapacityExceeded { size, limit: inner.cap });
        }
        if !chunk.is_empty() {
            inner.store.write(chunk)?;
        }
        if last {
            inner.store.complete()?;
        }
        Ok(())
    }

    /// Accumulated content length in bytes.
    pub fn len(&self) -> u64 {
        self.inner.borrow().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while the content lives in memory.
    pub fn is_in_memory(&self) -> bool {
        self.inner.borrow().store.is_in_memory()
    }

    /// The complete accumulated content, materialized from disk on demand.
    pub fn bytes(&self) -> Result<Bytes, StoreError> {
        self.inner.borrow().store.content()
    }

    /// The next slice of at most `length` bytes for re-streaming.
    ///
    /// Returns `Ok(None)` once the content is exhausted; the internal read
    /// position then rewinds so a subsequent call starts a fresh pass from
    /// the beginning.
    pub fn chunk(&self, length: usize) -> Result<Option<Bytes>, StoreError> {
        self.inner.borrow_mut().store.chunk(length)
    }

    /// Moves the content to `dest`, transferring ownership of any disk file.
    pub fn move_to(&self, dest: &Path) -> Result<(), StoreError> {
        self.inner.borrow_mut().store.move_to(dest)
    }

    /// Drops the stored content, removing any not-renamed temp file.
    pub fn delete(&self) {
        self.inner.borrow_mut().store.delete();
    }

    /// True once the content was moved out via [`Backing::move_to`].
    pub fn is_renamed(&self) -> bool {
        self.inner.borrow().store.is_renamed()
    }

    /// Path of the backing file, when the content is disk-resident.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.inner.borrow().store.file_path()
    }

    /// True when both handles refer to the same underlying store.
    pub fn same(a: &Backing, b: &Backing) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_stays_in_memory_below_threshold() {
        let backing = Backing::mixed(TempFileConfig::default(), None, 64, 0);
        backing.write(&[b'a'; 64], true).unwrap();
        assert!(backing.is_in_memory());
        assert_eq!(backing.len(), 64);
    }

    #[test]
    fn mixed_migrates_once_threshold_crossed() {
        let dir = tempfile::tempdir().unwrap();
        let config = TempFileConfig { base_dir: Some(dir.path().to_path_buf()), ..Default::default() };
        let backing = Backing::mixed(config, Some("payload".into()), 8, 0);

        backing.write(b"12345", false).unwrap();
        assert!(backing.is_in_memory());

        // this write would reach 10 > 8: previously buffered bytes move to disk first
        backing.write(b"67890", false).unwrap();
        assert!(!backing.is_in_memory());

        backing.write(b"abc", true).unwrap();
        assert_eq!(backing.bytes().unwrap(), Bytes::from_static(b"1234567890abc"));
        assert!(backing.file_path().is_some());
    }

    #[test]
    fn mixed_with_large_declared_size_starts_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = TempFileConfig { base_dir: Some(dir.path().to_path_buf()), ..Default::default() };
        let backing = Backing::mixed(config, None, 16, 1024);
        backing.write(b"x", false).unwrap();
        assert!(!backing.is_in_memory());
    }

    #[test]
    fn declared_cap_is_never_exceeded() {
        let backing = Backing::memory(4);
        backing.write(b"123", false).unwrap();
        let err = backing.write(b"45", false).unwrap_err();
        assert!(matches!(err, StoreError::CapacityExceeded { size: 5, limit: 4 }));
        // the rejected write left the content untouched
        assert_eq!(backing.len(), 3);
        backing.write(b"4", true).unwrap();
        assert_eq!(backing.bytes().unwrap(), Bytes::from_static(b"1234"));
    }

    #[test]
    fn handles_share_one_store() {
        let a = Backing::memory(0);
        let b = a.clone();
        a.write(b"shared", true).unwrap();
        assert_eq!(b.bytes().unwrap(), Bytes::from_static(b"shared"));
        assert!(Backing::same(&a, &b));
        assert!(!Backing::same(&a, &Backing::memory(0)));
    }
}
