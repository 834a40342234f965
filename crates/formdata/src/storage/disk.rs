//! Disk-backed content store.
//!
//! The temp file is created lazily on the first write and the write handle
//! stays open until the content completes, so a large upload streams straight
//! to disk without reopening the file per chunk. Every write is flushed to the
//! device before the call returns. The file is exclusively owned by this
//! store until [`DiskStore::move_to`] transfers ownership to the caller;
//! until then, dropping or deleting the store removes it.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::storage::factory::TempFileConfig;
use crate::storage::StoreError;

#[derive(Debug)]
pub(crate) struct DiskStore {
    config: TempFileConfig,
    /// Sanitized item name, woven into the temp file name
    hint: Option<String>,
    path: Option<PathBuf>,
    file: Option<File>,
    len: u64,
    read_pos: u64,
    renamed: bool,
    removed: bool,
}

impl DiskStore {
    pub(crate) fn new(config: TempFileConfig, hint: Option<String>) -> Self {
        Self { config, hint, path: None, file: None, len: 0, read_pos: 0, renamed: false, removed: false }
    }

    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    fn create_file(&mut self) -> Result<(), StoreError> {
        let suffix = match &self.hint {
            Some(hint) => format!("_{hint}"),
            None => self.config.suffix.clone(),
        };
        let dir = match &self.config.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir(),
        };
        let named = tempfile::Builder::new().prefix(&self.config.prefix).suffix(&suffix).tempfile_in(dir)?;
        let (file, temp_path) = named.into_parts();
        // removal stays under this store's control, not the temp path guard's
        let path = temp_path.keep().map_err(|e| StoreError::Io { source: e.error })?;
        trace!(path = %path.display(), "created temp file for form content");
        self.path = Some(path);
        self.file = Some(file);
        Ok(())
    }

    fn writer(&mut self) -> Result<&mut File, StoreError> {
        if self.path.is_none() {
            self.create_file()?;
        } else if self.file.is_none() {
            if self.renamed || self.removed {
                return Err(StoreError::Sealed);
            }
            let path = self.path.as_ref().expect("path set above");
            self.file = Some(OpenOptions::new().append(true).open(path)?);
        }
        Ok(self.file.as_mut().expect("file opened above"))
    }

    pub(crate) fn write(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        let file = self.writer()?;
        file.write_all(chunk)?;
        file.sync_data()?;
        self.len += chunk.len() as u64;
        Ok(())
    }

    /// Closes the write handle; an untouched store still materializes an empty file.
    pub(crate) fn complete(&mut self) -> Result<(), StoreError> {
        if self.path.is_none() {
            self.create_file()?;
        }
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        Ok(())
    }

    pub(crate) fn content(&self) -> Result<Bytes, StoreError> {
        match &self.path {
            Some(path) if !self.removed => Ok(Bytes::from(fs::read(path)?)),
            _ => Ok(Bytes::new()),
        }
    }

    pub(crate) fn chunk(&mut self, length: usize) -> Result<Option<Bytes>, StoreError> {
        if length == 0 || self.read_pos >= self.len || self.removed {
            self.read_pos = 0;
            return Ok(None);
        }
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(None),
        };
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(self.read_pos))?;
        let mut buf = Vec::with_capacity(length);
        file.take(length as u64).read_to_end(&mut buf)?;
        if buf.is_empty() {
            self.read_pos = 0;
            return Ok(None);
        }
        self.read_pos += buf.len() as u64;
        Ok(Some(Bytes::from(buf)))
    }

    /// Moves the content to `dest`, preferring an atomic rename.
    ///
    /// When rename fails (typically across filesystems) the content is copied
    /// byte-for-byte instead; the source is deleted only after the copied
    /// length was verified, and a short destination is removed again. On
    /// success the file is out of this store's ownership: neither
    /// [`DiskStore::delete`] nor drop will touch it anymore.
    pub(crate) fn move_to(&mut self, dest: &Path) -> Result<(), StoreError> {
        if self.removed {
            return Err(StoreError::Sealed);
        }
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        let src = match &self.path {
            Some(path) => path.clone(),
            None => {
                // nothing was ever written, the move produces an empty file
                fs::write(dest, [])?;
                self.path = Some(dest.to_path_buf());
                self.renamed = true;
                return Ok(());
            }
        };
        if fs::rename(&src, dest).is_err() {
            debug!(src = %src.display(), dest = %dest.display(), "rename failed, falling back to copy");
            copy_verified(&src, dest, self.len)?;
        }
        self.path = Some(dest.to_path_buf());
        self.renamed = true;
        Ok(())
    }

    pub(crate) fn delete(&mut self) {
        self.file.take();
        if self.renamed {
            // ownership was transferred, the destination is not ours to remove
            return;
        }
        if !self.removed {
            if let Some(path) = &self.path {
                if let Err(e) = fs::remove_file(path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        debug!(path = %path.display(), error = %e, "failed to remove temp file");
                    }
                }
            }
        }
        self.removed = true;
    }

    pub(crate) fn is_renamed(&self) -> bool {
        self.renamed
    }

    pub(crate) fn file_path(&self) -> Option<&Path> {
        if self.removed { None } else { self.path.as_deref() }
    }
}

impl Drop for DiskStore {
    fn drop(&mut self) {
        if self.config.remove_on_drop && !self.renamed && !self.removed {
            if let Some(path) = self.path.take() {
                let _ = fs::remove_file(path);
            }
        }
    }
}

/// Copy fallback for a failed rename: copies `src` to `dest`, verifies the
/// copied length against `expected`, and deletes the source only on success.
/// A partial destination is removed before the failure is reported.
pub(crate) fn copy_verified(src: &Path, dest: &Path, expected: u64) -> Result<(), StoreError> {
    let copied = match fs::copy(src, dest) {
        Ok(copied) => copied,
        Err(e) => {
            let _ = fs::remove_file(dest);
            return Err(e.into());
        }
    };
    if copied != expected {
        let _ = fs::remove_file(dest);
        return Err(StoreError::IncompleteCopy { expected, copied });
    }
    fs::remove_file(src)?;
    Ok(())
}
