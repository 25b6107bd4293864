//! Pending operation types.

use std::fmt;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use skiff_core::{Entry, EntryKind, StorageUri};
use strum::{Display, EnumIter};

/// Identifier of a pending operation, unique within one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(pub CompactString);

impl OperationId {
    /// Create a new OperationId.
    pub fn new(id: impl Into<CompactString>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of a pending operation.
///
/// Variants are declared in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Create,
    Copy,
    Move,
    Rename,
    Delete,
}

impl OperationKind {
    /// Execution priority; lower runs first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Create => 0,
            Self::Copy => 1,
            Self::Move => 2,
            Self::Rename => 3,
            Self::Delete => 4,
        }
    }
}

/// A staged, not yet applied mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PendingOperation {
    /// Remove an entry.
    Delete {
        id: OperationId,
        uri: StorageUri,
        entry: Entry,
        created_at: DateTime<Utc>,
    },
    /// Move an entry to a new location.
    Move {
        id: OperationId,
        source_uri: StorageUri,
        dest_uri: StorageUri,
        entry: Entry,
        created_at: DateTime<Utc>,
    },
    /// Copy an entry to a new location.
    Copy {
        id: OperationId,
        source_uri: StorageUri,
        dest_uri: StorageUri,
        entry: Entry,
        created_at: DateTime<Utc>,
    },
    /// Rename an entry in place.
    Rename {
        id: OperationId,
        uri: StorageUri,
        entry: Entry,
        new_name: CompactString,
        created_at: DateTime<Utc>,
    },
    /// Create a new entry.
    Create {
        id: OperationId,
        uri: StorageUri,
        name: CompactString,
        entry_kind: EntryKind,
        created_at: DateTime<Utc>,
    },
}

impl PendingOperation {
    pub fn id(&self) -> &OperationId {
        match self {
            Self::Delete { id, .. }
            | Self::Move { id, .. }
            | Self::Copy { id, .. }
            | Self::Rename { id, .. }
            | Self::Create { id, .. } => id,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Delete { .. } => OperationKind::Delete,
            Self::Move { .. } => OperationKind::Move,
            Self::Copy { .. } => OperationKind::Copy,
            Self::Rename { .. } => OperationKind::Rename,
            Self::Create { .. } => OperationKind::Create,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Delete { created_at, .. }
            | Self::Move { created_at, .. }
            | Self::Copy { created_at, .. }
            | Self::Rename { created_at, .. }
            | Self::Create { created_at, .. } => *created_at,
        }
    }

    /// The URI the operation acts on (the source for moves and copies).
    pub fn uri(&self) -> &StorageUri {
        match self {
            Self::Delete { uri, .. } | Self::Rename { uri, .. } | Self::Create { uri, .. } => uri,
            Self::Move { source_uri, .. } | Self::Copy { source_uri, .. } => source_uri,
        }
    }

    /// Destination URI of a move or copy.
    pub fn dest_uri(&self) -> Option<&StorageUri> {
        match self {
            Self::Move { dest_uri, .. } | Self::Copy { dest_uri, .. } => Some(dest_uri),
            _ => None,
        }
    }

    /// Every URI this operation references.
    pub fn uris(&self) -> impl Iterator<Item = &StorageUri> {
        std::iter::once(self.uri()).chain(self.dest_uri())
    }

    /// Execution priority of this operation's kind.
    pub fn priority(&self) -> u8 {
        self.kind().priority()
    }
}

impl fmt::Display for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete { uri, .. } => write!(f, "delete {uri}"),
            Self::Move {
                source_uri,
                dest_uri,
                ..
            } => write!(f, "move {source_uri} -> {dest_uri}"),
            Self::Copy {
                source_uri,
                dest_uri,
                ..
            } => write!(f, "copy {source_uri} -> {dest_uri}"),
            Self::Rename { uri, new_name, .. } => write!(f, "rename {uri} -> '{new_name}'"),
            Self::Create {
                uri, entry_kind, ..
            } => write!(f, "create {entry_kind} {uri}"),
        }
    }
}
