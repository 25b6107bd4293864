//! Canonical storage addressing.
//!
//! Every entry is identified by a `scheme://bucket/path` string. The bucket is
//! empty for schemes without a container concept, and directory paths end
//! with a `/`. Two entries that refer to the same object always produce the
//! same string, whichever directory view listed them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::UriError;

/// Canonical identity of a storage entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageUri(String);

impl StorageUri {
    /// Build a URI from its parts.
    ///
    /// A leading `/` on `path` is dropped so that `"/a/b"` and `"a/b"`
    /// address the same entry.
    pub fn new(scheme: &str, bucket: Option<&str>, path: &str) -> Self {
        Self(format!(
            "{scheme}://{}/{}",
            bucket.unwrap_or_default(),
            path.trim_start_matches('/')
        ))
    }

    /// Parse a URI string, requiring a non-empty scheme.
    pub fn parse(uri: &str) -> Result<Self, UriError> {
        let Some((scheme, rest)) = uri.split_once("://") else {
            return Err(UriError::MissingScheme {
                uri: uri.to_string(),
            });
        };
        if scheme.is_empty() {
            return Err(UriError::EmptyScheme {
                uri: uri.to_string(),
            });
        }
        let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
        Ok(Self::new(scheme, Some(bucket), path))
    }

    /// The URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the URI into scheme, bucket and path.
    pub fn parts(&self) -> UriParts<'_> {
        let (scheme, rest) = self.0.split_once("://").unwrap_or(("", self.0.as_str()));
        let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
        UriParts {
            scheme,
            bucket,
            path,
        }
    }

    pub fn scheme(&self) -> &str {
        self.parts().scheme
    }

    pub fn bucket(&self) -> &str {
        self.parts().bucket
    }

    /// Path within the bucket, without a leading `/`.
    pub fn path(&self) -> &str {
        self.parts().path
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.parts().name()
    }

    /// Whether the URI addresses a directory (trailing `/`).
    pub fn is_directory(&self) -> bool {
        self.0.ends_with('/')
    }

    /// The URI of a sibling entry carrying `new_name` in place of the last
    /// segment. Directory-ness is preserved.
    pub fn with_name(&self, new_name: &str) -> Self {
        let parts = self.parts();
        let path = join_path(parts.dir(), new_name, self.is_directory());
        Self::new(parts.scheme, Some(parts.bucket), &path)
    }

    /// Whether this URI lies under `dir` in the given scheme and bucket.
    ///
    /// Matching is per path segment, so `dir` does not contain `dir2/x`.
    /// An empty `dir` contains everything in the bucket.
    pub fn is_within(&self, scheme: &str, bucket: Option<&str>, dir: &str) -> bool {
        let parts = self.parts();
        if parts.scheme != scheme || parts.bucket != bucket.unwrap_or_default() {
            return false;
        }

        let dir = normalize_dir(dir);
        let path = normalize_dir(parts.path);
        dir.is_empty()
            || path == dir
            || (path.starts_with(dir) && path[dir.len()..].starts_with('/'))
    }
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for StorageUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StorageUri {
    type Error = UriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StorageUri> for String {
    fn from(uri: StorageUri) -> Self {
        uri.0
    }
}

/// Borrowed view of the components of a [`StorageUri`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UriParts<'a> {
    pub scheme: &'a str,
    pub bucket: &'a str,
    pub path: &'a str,
}

impl<'a> UriParts<'a> {
    /// Last path segment, ignoring a trailing `/`.
    pub fn name(&self) -> &'a str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// Normalized parent directory of the path.
    pub fn dir(&self) -> &'a str {
        parent_dir(self.path)
    }
}

/// Strip leading and trailing slashes so `"dir/"`, `"/dir"` and `"dir"`
/// compare equal. The root normalizes to `""`.
pub fn normalize_dir(path: &str) -> &str {
    path.trim_matches('/')
}

/// Normalized parent directory of `path` (`""` for top-level entries).
pub fn parent_dir(path: &str) -> &str {
    normalize_dir(path)
        .rsplit_once('/')
        .map(|(parent, _)| parent)
        .unwrap_or_default()
}

/// Join a directory and an entry name into a bucket-relative path.
pub fn join_path(dir: &str, name: &str, is_dir: bool) -> String {
    let dir = normalize_dir(dir);
    let mut path = if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    };
    if is_dir {
        path.push('/');
    }
    path
}
