//! Projection of pending operations onto directory listings.
//!
//! Nothing here is stored; every query scans the operation log, which is
//! expected to hold at most a few dozen entries.

use compact_str::CompactString;
use serde::Serialize;
use skiff_core::{Entry, EntryId, StorageUri, normalize_dir};

use crate::PendingOperation;

/// How a listed entry is affected by the staged operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntryVisualState {
    pub is_deleted: bool,
    pub is_moved_away: bool,
    pub is_moved_here: bool,
    pub is_copied_here: bool,
    pub is_renamed: bool,
    pub is_created: bool,
    /// Where the entry is being moved to.
    pub move_destination: Option<StorageUri>,
    /// The staged rename target.
    pub new_name: Option<CompactString>,
}

impl EntryVisualState {
    /// No pending operation references the entry.
    pub fn is_unchanged(&self) -> bool {
        *self == Self::default()
    }

    /// The entry disappears once the operations are applied.
    pub fn should_filter(&self) -> bool {
        self.is_deleted || self.is_moved_away
    }
}

/// Union of the effects of every operation referencing `uri`.
pub fn entry_state(operations: &[PendingOperation], uri: &StorageUri) -> EntryVisualState {
    let mut state = EntryVisualState::default();

    for operation in operations {
        match operation {
            PendingOperation::Delete { uri: target, .. } if target == uri => {
                state.is_deleted = true;
            }
            PendingOperation::Move {
                source_uri,
                dest_uri,
                ..
            } => {
                if source_uri == uri {
                    state.is_moved_away = true;
                    state.move_destination = Some(dest_uri.clone());
                }
                if dest_uri == uri {
                    state.is_moved_here = true;
                }
            }
            PendingOperation::Copy { dest_uri, .. } if dest_uri == uri => {
                state.is_copied_here = true;
            }
            PendingOperation::Rename {
                uri: target,
                new_name,
                ..
            } if target == uri => {
                state.is_renamed = true;
                state.new_name = Some(new_name.clone());
            }
            PendingOperation::Create { uri: target, .. } if target == uri => {
                state.is_created = true;
            }
            _ => {}
        }
    }

    state
}

/// Entries that will appear in `path` once the operations are applied.
pub fn virtual_entries(
    operations: &[PendingOperation],
    path: &str,
    scheme: &str,
    bucket: Option<&str>,
) -> Vec<Entry> {
    let dir = normalize_dir(path);
    let bucket = bucket.unwrap_or_default();
    let in_dir = |uri: &StorageUri| {
        let parts = uri.parts();
        parts.scheme == scheme && parts.bucket == bucket && parts.dir() == dir
    };

    operations
        .iter()
        .filter_map(|operation| match operation {
            PendingOperation::Move {
                id,
                dest_uri,
                entry,
                ..
            }
            | PendingOperation::Copy {
                id,
                dest_uri,
                entry,
                ..
            } if in_dir(dest_uri) => Some(Entry {
                id: EntryId::virtual_for(id.as_str()),
                name: dest_uri.name().into(),
                kind: entry.kind,
                path: dest_uri.path().to_string(),
                size: entry.size,
                modified: entry.modified,
                metadata: entry.metadata.clone(),
            }),
            PendingOperation::Create {
                id,
                uri,
                name,
                entry_kind,
                ..
            } if in_dir(uri) => Some(Entry::new(
                EntryId::virtual_for(id.as_str()),
                name.clone(),
                *entry_kind,
                uri.path(),
            )),
            _ => None,
        })
        .collect()
}

/// Operations with a URI under `path` (either side of a move or copy).
pub fn operations_for_path<'a>(
    operations: &'a [PendingOperation],
    path: &str,
    scheme: &str,
    bucket: Option<&str>,
) -> Vec<&'a PendingOperation> {
    operations
        .iter()
        .filter(|operation| {
            operation
                .uris()
                .any(|uri| uri.is_within(scheme, bucket, path))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use skiff_core::EntryKind;

    use super::*;
    use crate::OperationId;

    fn uri(path: &str) -> StorageUri {
        StorageUri::new("s3", Some("b"), path)
    }

    fn storage_class() -> BTreeMap<String, String> {
        BTreeMap::from([("storage_class".to_string(), "GLACIER".to_string())])
    }

    fn copy_op(id: &str, source: &str, dest: &str) -> PendingOperation {
        PendingOperation::Copy {
            id: OperationId::new(id),
            source_uri: uri(source),
            dest_uri: uri(dest),
            entry: Entry::file(EntryId::new("e"), "a.txt", source)
                .with_size(42)
                .with_metadata(storage_class()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_copy_marks_only_destination() {
        let ops = vec![copy_op("1", "src/a.txt", "dst/a.txt")];

        assert!(entry_state(&ops, &uri("src/a.txt")).is_unchanged());
        let state = entry_state(&ops, &uri("dst/a.txt"));
        assert!(state.is_copied_here);
        assert!(!state.should_filter());
    }

    #[test]
    fn test_virtual_copy_keeps_source_attributes() {
        let ops = vec![copy_op("1", "src/a.txt", "dst/a.txt")];

        let entries = virtual_entries(&ops, "/dst", "s3", Some("b"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id.as_str(), "virtual-1");
        assert_eq!(entries[0].size, Some(42));
        assert_eq!(entries[0].path, "dst/a.txt");
        assert_eq!(entries[0].metadata, Some(storage_class()));

        assert!(virtual_entries(&ops, "dst/", "s3", Some("other")).is_empty());
        assert!(virtual_entries(&ops, "", "s3", Some("b")).is_empty());
    }

    #[test]
    fn test_virtual_move_keeps_kind_and_metadata() {
        let ops = vec![PendingOperation::Move {
            id: OperationId::new("7"),
            source_uri: uri("src/raw/"),
            dest_uri: uri("archive/raw/"),
            entry: Entry::directory(EntryId::new("d"), "raw", "src/raw/")
                .with_metadata(storage_class()),
            created_at: Utc::now(),
        }];

        let entries = virtual_entries(&ops, "archive", "s3", Some("b"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[0].name.as_str(), "raw");
        assert_eq!(entries[0].path, "archive/raw/");
        assert_eq!(entries[0].metadata, Some(storage_class()));
    }

    #[test]
    fn test_root_directory_matches_empty_path() {
        let ops = vec![PendingOperation::Create {
            id: OperationId::new("1"),
            uri: uri("top/"),
            name: "top".into(),
            entry_kind: EntryKind::Directory,
            created_at: Utc::now(),
        }];

        assert_eq!(virtual_entries(&ops, "", "s3", Some("b")).len(), 1);
        assert_eq!(virtual_entries(&ops, "/", "s3", Some("b")).len(), 1);
    }

    #[test]
    fn test_operations_for_path_matches_either_side() {
        let ops = vec![
            copy_op("1", "src/a.txt", "dst/a.txt"),
            copy_op("2", "other/b.txt", "more/b.txt"),
        ];

        let under_src = operations_for_path(&ops, "src", "s3", Some("b"));
        let under_dst = operations_for_path(&ops, "dst/", "s3", Some("b"));
        assert_eq!(under_src.len(), 1);
        assert_eq!(under_dst.len(), 1);
        assert_eq!(operations_for_path(&ops, "", "s3", Some("b")).len(), 2);
        assert!(operations_for_path(&ops, "sr", "s3", Some("b")).is_empty());
    }
}
