use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Remote object not found: {0}")]
    NotFound(String),

    #[error("Remote object already exists: {0}")]
    AlreadyExists(String),

    #[error("Remote store answered {status} for {path}")]
    Status { status: u16, path: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from remote store: {0}")]
    InvalidResponse(String),
}

/// A direct child of a remote directory
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

/// Capability set the relay needs from a remote file store.
///
/// Paths are absolute and `/`-separated, relative to the store root.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Creates a single directory. The parent must exist.
    /// Returns `StoreError::AlreadyExists` when the directory is already there.
    async fn create_directory(&self, path: &str) -> Result<(), StoreError>;

    /// Lists the direct children of a directory.
    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>, StoreError>;

    async fn read_file(&self, path: &str) -> Result<Bytes, StoreError>;

    /// Writes a whole object. With `overwrite == false` an existing object is
    /// left untouched and `StoreError::AlreadyExists` is returned.
    async fn write_file(&self, path: &str, data: Bytes, overwrite: bool)
    -> Result<(), StoreError>;
}

/// Joins path segments under a base path, collapsing duplicate slashes.
pub fn remote_join(base: &str, segments: &[&str]) -> String {
    let mut path = String::new();
    for part in std::iter::once(base)
        .chain(segments.iter().copied())
        .flat_map(|s| s.split('/'))
        .filter(|s| !s.is_empty())
    {
        path.push('/');
        path.push_str(part);
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

/// Last segment of a remote path
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}
