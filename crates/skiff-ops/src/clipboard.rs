//! Cut/copy clipboard feeding paste.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skiff_core::{Entry, StorageUri};
use strum::Display;

/// Whether pasting moves or copies the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ClipboardMode {
    Cut,
    Copy,
}

/// A cut or copied selection.
///
/// `entries` and `source_uris` are paired by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardState {
    entries: Vec<Entry>,
    source_uris: Vec<StorageUri>,
    mode: ClipboardMode,
    timestamp: DateTime<Utc>,
}

impl ClipboardState {
    /// Capture a selection. Unpaired trailing items are dropped.
    pub fn new(entries: &[Entry], source_uris: &[StorageUri], mode: ClipboardMode) -> Self {
        let len = entries.len().min(source_uris.len());
        Self {
            entries: entries[..len].to_vec(),
            source_uris: source_uris[..len].to_vec(),
            mode,
            timestamp: Utc::now(),
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn source_uris(&self) -> &[StorageUri] {
        &self.source_uris
    }

    pub fn mode(&self) -> ClipboardMode {
        self.mode
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_cut(&self) -> bool {
        self.mode == ClipboardMode::Cut
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(entry, source_uri)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Entry, &StorageUri)> {
        self.entries.iter().zip(&self.source_uris)
    }
}
