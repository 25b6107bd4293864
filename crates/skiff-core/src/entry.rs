//! Listed storage entries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::StorageUri;

/// Identifier of an entry within one listing.
///
/// Ids are regenerated on every list call and must not be used to match
/// entries across listings; use [`StorageUri`] for that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub CompactString);

impl EntryId {
    /// Create a new EntryId.
    pub fn new(id: impl Into<CompactString>) -> Self {
        Self(id.into())
    }

    /// Id for an entry synthesized from a pending operation.
    pub fn virtual_for(operation_id: &str) -> Self {
        Self(compact_str::format_compact!("virtual-{operation_id}"))
    }

    /// Whether this id belongs to a synthesized entry.
    pub fn is_virtual(&self) -> bool {
        self.0.starts_with("virtual-")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Type of storage entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    /// Top-level container of an object store.
    Bucket,
}

impl EntryKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    /// Check if this entry can hold children.
    pub fn is_container(&self) -> bool {
        matches!(self, EntryKind::Directory | EntryKind::Bucket)
    }
}

/// Snapshot of one listed file, directory or bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Ephemeral listing id.
    pub id: EntryId,

    /// Entry name (last path segment).
    pub name: CompactString,

    /// Entry type.
    pub kind: EntryKind,

    /// Bucket-relative path. Directories end with `/`.
    pub path: String,

    /// Size in bytes, when the backend reports one.
    #[serde(default)]
    pub size: Option<u64>,

    /// Last modification time, when known.
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,

    /// Backend-specific metadata (content type, storage class, owner, ...).
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl Entry {
    /// Create a new entry with no size, timestamp or metadata.
    pub fn new(
        id: EntryId,
        name: impl Into<CompactString>,
        kind: EntryKind,
        path: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            path: path.into(),
            size: None,
            modified: None,
            metadata: None,
        }
    }

    /// Create a file entry.
    pub fn file(id: EntryId, name: impl Into<CompactString>, path: impl Into<String>) -> Self {
        Self::new(id, name, EntryKind::File, path)
    }

    /// Create a directory entry.
    pub fn directory(
        id: EntryId,
        name: impl Into<CompactString>,
        path: impl Into<String>,
    ) -> Self {
        Self::new(id, name, EntryKind::Directory, path)
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Canonical URI of this entry in the given scheme and bucket.
    pub fn uri(&self, scheme: &str, bucket: Option<&str>) -> StorageUri {
        if self.kind.is_container() && !self.path.ends_with('/') {
            StorageUri::new(scheme, bucket, &format!("{}/", self.path))
        } else {
            StorageUri::new(scheme, bucket, &self.path)
        }
    }
}
