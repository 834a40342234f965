//! Bulk cleanup of the disk resources a decode session created.
//!
//! The decoder registers the backing of every file upload it creates, before
//! the upload is ever handed to the caller. When the owning request ends —
//! normally or on an error path — one [`UploadCleaner::clean`] call removes
//! every temp file that was not explicitly persisted. A caller that renamed
//! an upload away opts it out with [`UploadCleaner::remove`].

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::storage::Backing;

/// Registry of upload backings pending cleanup. Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct UploadCleaner {
    entries: Rc<RefCell<Vec<Backing>>>,
}

impl UploadCleaner {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a backing for later cleanup.
    pub fn register(&self, backing: &Backing) {
        self.entries.borrow_mut().push(backing.clone());
    }

    /// Opts a backing out of cleanup, typically after a successful rename.
    pub fn remove(&self, backing: &Backing) {
        self.entries.borrow_mut().retain(|entry| !Backing::same(entry, backing));
    }

    /// Deletes every still-registered backing and empties the registry.
    ///
    /// Renamed content is left alone by `Backing::delete`, and a second call
    /// finds an empty registry, so the operation is idempotent.
    pub fn clean(&self) {
        let entries = self.entries.borrow_mut().split_off(0);
        if !entries.is_empty() {
            trace!(count = entries.len(), "cleaning registered uploads");
        }
        for entry in entries {
            entry.delete();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
