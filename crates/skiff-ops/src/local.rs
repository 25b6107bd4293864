//! Local filesystem backend.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skiff_core::{
    BackendError, BackendResult, BackendStatus, DeleteOptions, Entry, EntryId, EntryKind,
    ListOptions, ListResult, StorageBackend, join_path, normalize_dir,
};

/// Scheme tag for local paths.
pub const LOCAL_SCHEME: &str = "local";

/// Storage backend rooted at a local directory.
///
/// Backend paths are relative to the root; paths that would leave it are
/// rejected.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a backend path onto the filesystem.
    fn resolve(&self, path: &str) -> BackendResult<PathBuf> {
        let relative = Path::new(normalize_dir(path));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(BackendError::permission_denied(path));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn scheme(&self) -> &str {
        LOCAL_SCHEME
    }

    async fn list(&self, path: &str, options: &ListOptions) -> BackendResult<ListResult> {
        let dir = self.resolve(path)?;
        let prefix = normalize_dir(path).to_string();
        let mut entries = blocking(path, move || read_entries(&dir, &prefix)).await?;

        if !options.include_hidden {
            entries.retain(|e| !e.name.starts_with('.'));
        }

        let offset = match &options.continuation_token {
            Some(token) => token.parse::<usize>().map_err(|_| {
                BackendError::new(
                    BackendStatus::Error,
                    format!("Invalid continuation token '{token}'"),
                )
            })?,
            None => 0,
        };
        let limit = options.max_results.unwrap_or(usize::MAX);
        let end = offset.saturating_add(limit).min(entries.len());
        let has_more = end < entries.len();
        let page = entries.drain(offset.min(end)..end).collect();

        Ok(ListResult {
            entries: page,
            continuation_token: has_more.then(|| end.to_string()),
            has_more,
        })
    }

    async fn read(&self, path: &str) -> BackendResult<Vec<u8>> {
        let target = self.resolve(path)?;
        blocking(path, move || fs::read(target)).await
    }

    async fn write(&self, path: &str, content: &[u8]) -> BackendResult<()> {
        let target = self.resolve(path)?;
        let content = content.to_vec();
        blocking(path, move || {
            create_parent(&target)?;
            fs::write(target, content)
        })
        .await
    }

    async fn mkdir(&self, path: &str) -> BackendResult<()> {
        let target = self.resolve(path)?;
        blocking(path, move || fs::create_dir_all(target)).await
    }

    async fn delete(&self, path: &str, options: DeleteOptions) -> BackendResult<()> {
        let target = self.resolve(path)?;
        if target == self.root {
            return Err(BackendError::permission_denied(path));
        }
        blocking(path, move || {
            if target.is_dir() {
                if options.recursive {
                    fs::remove_dir_all(target)
                } else {
                    fs::remove_dir(target)
                }
            } else {
                fs::remove_file(target)
            }
        })
        .await
    }

    async fn move_entry(&self, source: &str, dest: &str) -> BackendResult<()> {
        let from = self.resolve(source)?;
        let to = self.resolve(dest)?;
        blocking(source, move || move_item(&from, &to)).await
    }

    async fn copy(&self, source: &str, dest: &str) -> BackendResult<()> {
        let from = self.resolve(source)?;
        let to = self.resolve(dest)?;
        blocking(source, move || {
            create_parent(&to)?;
            if from.is_dir() {
                copy_dir_recursive(&from, &to)
            } else {
                fs::copy(&from, &to).map(|_| ())
            }
        })
        .await
    }
}

/// Run blocking filesystem work off the async runtime.
async fn blocking<T, F>(path: &str, work: F) -> BackendResult<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BackendError::new(BackendStatus::Error, format!("Task failed: {e}")))?
        .map_err(|e| BackendError::io(path, e))
}

/// Read a directory into entries, directories first then by name.
fn read_entries(dir: &Path, prefix: &str) -> io::Result<Vec<Entry>> {
    let mut entries = Vec::new();

    for (index, dir_entry) in fs::read_dir(dir)?.enumerate() {
        let dir_entry = dir_entry?;
        let metadata = dir_entry.metadata()?;
        let name = dir_entry.file_name().to_string_lossy().to_string();
        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        let mut entry = Entry::new(
            EntryId::new(format!("entry-{index}")),
            name.as_str(),
            kind,
            join_path(prefix, &name, kind.is_dir()),
        );
        if !kind.is_dir() {
            entry = entry.with_size(metadata.len());
        }
        if let Ok(modified) = metadata.modified() {
            entry = entry.with_modified(DateTime::<Utc>::from(modified));
        }
        entries.push(entry);
    }

    entries.sort_by(|a, b| {
        b.kind
            .is_dir()
            .cmp(&a.kind.is_dir())
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(entries)
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// Move a single item, falling back to copy + delete across filesystems.
fn move_item(source: &Path, dest: &Path) -> io::Result<()> {
    create_parent(dest)?;

    if fs::rename(source, dest).is_ok() {
        return Ok(());
    }

    if source.is_dir() {
        copy_dir_recursive(source, dest)?;
        fs::remove_dir_all(source)
    } else {
        fs::copy(source, dest)?;
        fs::remove_file(source)
    }
}

/// Recursively copy a directory.
fn copy_dir_recursive(source: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if path.is_dir() {
            copy_dir_recursive(&path, &dest_path)?;
        } else {
            fs::copy(&path, &dest_path)?;
        }
    }

    Ok(())
}
