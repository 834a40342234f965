//! Construction of decoded items bound to their storage tier.
//!
//! [`DataFactory`] is the one place where storage decisions are made: it
//! captures a [`StoragePolicy`] and a [`TempFileConfig`] at construction and
//! hands out [`Attribute`]/[`FileUpload`] instances pre-bound to the selected
//! [`Backing`]. There is no process-wide mutable state; two decoders with
//! different policies coexist freely.

use std::path::PathBuf;

use mime::Mime;

use crate::protocol::{Attribute, Charset, DecodeError, FileUpload, TransferEncoding};
use crate::storage::Backing;

/// Spool-to-disk threshold used by [`StoragePolicy::default`], 16 KiB.
pub const DEFAULT_MEMORY_THRESHOLD: u64 = 16 * 1024;

/// Which storage tier newly created items receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoragePolicy {
    /// Everything in memory, regardless of size
    Memory,
    /// Everything on disk, from the first byte
    Disk,
    /// In memory until the given byte count would be crossed, then on disk
    Threshold(u64),
}

impl Default for StoragePolicy {
    fn default() -> Self {
        Self::Threshold(DEFAULT_MEMORY_THRESHOLD)
    }
}

/// Temp file placement and naming, fixed at construction.
///
/// Files are created under `base_dir` (the platform temp directory when
/// unset) as `prefix<random>_<name-hint>`, falling back to `suffix` when the
/// item carries no usable name. With `remove_on_drop` set, a temp file that
/// was never renamed away is removed when its storage handle goes away, so
/// abandoned uploads do not outlive the request that carried them.
#[derive(Debug, Clone)]
pub struct TempFileConfig {
    pub base_dir: Option<PathBuf>,
    pub prefix: String,
    pub suffix: String,
    pub remove_on_drop: bool,
}

impl Default for TempFileConfig {
    fn default() -> Self {
        Self { base_dir: None, prefix: "upload_".to_string(), suffix: ".tmp".to_string(), remove_on_drop: true }
    }
}

/// Factory for decoded items, pre-binding each to its [`Backing`].
#[derive(Debug, Clone, Default)]
pub struct DataFactory {
    policy: StoragePolicy,
    temp: TempFileConfig,
}

impl DataFactory {
    pub fn new(policy: StoragePolicy, temp: TempFileConfig) -> Self {
        Self { policy, temp }
    }

    /// Factory keeping every item in memory.
    pub fn in_memory() -> Self {
        Self::new(StoragePolicy::Memory, TempFileConfig::default())
    }

    /// Factory writing every item to disk.
    pub fn on_disk(temp: TempFileConfig) -> Self {
        Self::new(StoragePolicy::Disk, temp)
    }

    /// Factory spooling items to disk once `threshold` bytes would be crossed.
    pub fn with_threshold(threshold: u64, temp: TempFileConfig) -> Self {
        Self::new(StoragePolicy::Threshold(threshold), temp)
    }

    pub fn policy(&self) -> StoragePolicy {
        self.policy
    }

    /// Creates a completed attribute holding `value`.
    ///
    /// The name is validated; the value lands in the policy-selected backing,
    /// so an oversized attribute spools to disk exactly like an upload.
    pub fn create_attribute(&self, name: &str, value: &str, charset: Charset) -> Result<Attribute, DecodeError> {
        let name = crate::protocol::validate_name(name)?;
        let backing = self.backing(0, Some(&name));
        let mut attribute = Attribute::new(name, charset, backing);
        attribute.set_value(value)?;
        Ok(attribute)
    }

    /// Creates an empty, not yet completed file upload.
    ///
    /// `declared_size` greater than zero becomes the hard cap of the backing
    /// and, under a threshold policy, routes a knowingly-large upload to disk
    /// without a memory detour.
    pub fn create_upload(
        &self,
        name: &str,
        filename: &str,
        content_type: Mime,
        transfer_encoding: Option<TransferEncoding>,
        charset: Charset,
        declared_size: u64,
    ) -> Result<FileUpload, DecodeError> {
        let name = crate::protocol::validate_name(name)?;
        let hint = sanitize_hint(filename).or_else(|| sanitize_hint(&name));
        let backing = self.backing(declared_size, hint.as_deref());
        Ok(FileUpload::new(name, filename.to_string(), content_type, transfer_encoding, charset, backing))
    }

    fn backing(&self, declared_size: u64, hint: Option<&str>) -> Backing {
        let hint = hint.map(str::to_string);
        match self.policy {
            StoragePolicy::Memory => Backing::memory(declared_size),
            StoragePolicy::Disk => Backing::disk(self.temp.clone(), hint, declared_size),
            StoragePolicy::Threshold(threshold) => Backing::mixed(self.temp.clone(), hint, threshold, declared_size),
        }
    }
}

/// Reduces an item (file) name to something safe inside a temp file name:
/// the last path component, restricted to ASCII alphanumerics, `.`, `-`, `_`.
fn sanitize_hint(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String =
        base.chars().filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')).take(32).collect();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}
