//! Core types and traits for skiff.
//!
//! This crate provides the fundamental data structures shared by the rest of
//! the workspace: storage URIs, listed entries, and the contract every
//! storage backend implements.

mod backend;
mod entry;
mod error;
mod name;
mod uri;

pub use backend::{BackendResult, DeleteOptions, ListOptions, ListResult, StorageBackend};
pub use entry::{Entry, EntryId, EntryKind};
pub use error::{BackendError, BackendStatus, UriError};
pub use name::validate_name;
pub use uri::{StorageUri, UriParts, join_path, normalize_dir, parent_dir};
