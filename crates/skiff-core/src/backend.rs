//! Storage backend contract.
//!
//! Every storage adapter (object store, SFTP, FTP, SMB, cloud drive, local
//! disk) implements [`StorageBackend`]. Paths passed to a backend are
//! bucket-relative, `/`-delimited, and end with `/` for directories.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{BackendError, Entry};

/// Result type returned by backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Options for listing a directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOptions {
    /// Token returned by a previous page.
    #[serde(default)]
    pub continuation_token: Option<String>,
    /// Maximum number of entries per page (None = backend default).
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Include entries whose name starts with `.`.
    #[serde(default)]
    pub include_hidden: bool,
}

/// One page of a directory listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListResult {
    pub entries: Vec<Entry>,
    pub continuation_token: Option<String>,
    pub has_more: bool,
}

/// Options for deleting an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOptions {
    /// Remove directory contents as well.
    pub recursive: bool,
}

impl DeleteOptions {
    pub fn recursive(recursive: bool) -> Self {
        Self { recursive }
    }
}

/// Uniform interface over a storage backend.
///
/// Implementations report failures through [`BackendError`] and must be
/// `Send + Sync` so a single adapter can be shared with a spawned executor.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Scheme tag used in URIs for this backend (`s3`, `sftp`, `local`, ...).
    fn scheme(&self) -> &str;

    /// List the entries of a directory.
    async fn list(&self, path: &str, options: &ListOptions) -> BackendResult<ListResult>;

    /// Read a file's contents.
    async fn read(&self, path: &str) -> BackendResult<Vec<u8>>;

    /// Write a file, creating or replacing it.
    async fn write(&self, path: &str, content: &[u8]) -> BackendResult<()>;

    /// Create a directory (and any missing parents).
    async fn mkdir(&self, path: &str) -> BackendResult<()>;

    /// Delete a file or directory.
    async fn delete(&self, path: &str, options: DeleteOptions) -> BackendResult<()>;

    /// Move an entry to a new path within the same backend.
    async fn move_entry(&self, source: &str, dest: &str) -> BackendResult<()>;

    /// Copy an entry to a new path within the same backend.
    async fn copy(&self, source: &str, dest: &str) -> BackendResult<()>;
}
