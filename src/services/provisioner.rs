use super::storage::{RemoteStore, StoreError};

/// Makes sure every segment of `folder_path` exists as a remote directory,
/// creating missing ones from the root down.
pub async fn ensure_folder_recursive(
    store: &dyn RemoteStore,
    folder_path: &str,
) -> Result<(), StoreError> {
    let mut current = String::new();
    for part in folder_path.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);

        if store.exists(&current).await? {
            continue;
        }
        match store.create_directory(&current).await {
            Ok(()) => tracing::debug!("Created remote folder {}", current),
            // Created concurrently by another request
            Err(StoreError::AlreadyExists(_)) => (),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::MemoryStore;

    #[tokio::test]
    async fn test_creates_missing_segments_in_order() {
        let store = MemoryStore::new();
        ensure_folder_recursive(&store, "/Wahlen/Nord-1/042")
            .await
            .unwrap();

        assert!(store.exists("/Wahlen").await.unwrap());
        assert!(store.exists("/Wahlen/Nord-1").await.unwrap());
        assert!(store.exists("/Wahlen/Nord-1/042").await.unwrap());
        assert_eq!(store.directory_count(), 3);
    }

    #[tokio::test]
    async fn test_provisioning_is_idempotent() {
        let store = MemoryStore::new();
        ensure_folder_recursive(&store, "Wahlen//Nord-1/042/")
            .await
            .unwrap();
        ensure_folder_recursive(&store, "/Wahlen/Nord-1/042")
            .await
            .unwrap();
        assert_eq!(store.directory_count(), 3);
    }

    #[tokio::test]
    async fn test_root_needs_nothing() {
        let store = MemoryStore::new();
        ensure_folder_recursive(&store, "/").await.unwrap();
        assert_eq!(store.directory_count(), 0);
    }
}
