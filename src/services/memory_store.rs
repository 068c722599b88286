use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::storage::{RemoteEntry, RemoteStore, StoreError, file_name, remote_join};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File {
        data: Bytes,
        modified: DateTime<Utc>,
    },
}

/// In-process remote store.
///
/// Mirrors WebDAV semantics: parents must exist before children are created,
/// and non-overwriting writes to an existing path fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: Mutex<BTreeMap<String, Node>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn parent_exists(nodes: &BTreeMap<String, Node>, path: &str) -> bool {
        match path.rsplit_once('/') {
            Some(("", _)) | None => true,
            Some((parent, _)) => matches!(nodes.get(parent), Some(Node::Dir)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Node>> {
        self.nodes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of directories currently stored
    pub fn directory_count(&self) -> usize {
        self.lock().values().filter(|n| matches!(n, Node::Dir)).count()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let path = remote_join("/", &[path]);
        Ok(path == "/" || self.lock().contains_key(&path))
    }

    async fn create_directory(&self, path: &str) -> Result<(), StoreError> {
        let path = remote_join("/", &[path]);
        let mut nodes = self.lock();
        if path == "/" || nodes.contains_key(&path) {
            return Err(StoreError::AlreadyExists(path));
        }
        if !Self::parent_exists(&nodes, &path) {
            return Err(StoreError::Status { status: 409, path });
        }
        nodes.insert(path, Node::Dir);
        Ok(())
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>, StoreError> {
        let path = remote_join("/", &[path]);
        let nodes = self.lock();
        if path != "/" && !matches!(nodes.get(&path), Some(Node::Dir)) {
            return Err(StoreError::NotFound(path));
        }

        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{}/", path)
        };

        Ok(nodes
            .iter()
            .filter(|(key, _)| {
                key.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .map(|(key, node)| {
                let (is_dir, last_modified, size) = match node {
                    Node::Dir => (true, None, None),
                    Node::File { data, modified } => {
                        (false, Some(*modified), Some(data.len() as u64))
                    }
                };
                RemoteEntry {
                    name: file_name(key).to_string(),
                    path: key.clone(),
                    is_dir,
                    last_modified,
                    size,
                }
            })
            .collect())
    }

    async fn read_file(&self, path: &str) -> Result<Bytes, StoreError> {
        let path = remote_join("/", &[path]);
        match self.lock().get(&path) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            _ => Err(StoreError::NotFound(path)),
        }
    }

    async fn write_file(
        &self,
        path: &str,
        data: Bytes,
        overwrite: bool,
    ) -> Result<(), StoreError> {
        let path = remote_join("/", &[path]);
        let mut nodes = self.lock();
        match nodes.get(&path) {
            Some(Node::Dir) => return Err(StoreError::Status { status: 405, path }),
            Some(Node::File { .. }) if !overwrite => return Err(StoreError::AlreadyExists(path)),
            _ => (),
        }
        if !Self::parent_exists(&nodes, &path) {
            return Err(StoreError::Status { status: 409, path });
        }
        nodes.insert(
            path,
            Node::File {
                data,
                modified: Utc::now(),
            },
        );
        Ok(())
    }
}
