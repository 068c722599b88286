use super::storage::{RemoteEntry, RemoteStore, StoreError};
use crate::utils::validation::RoutingTags;

/// Files directly inside `<base>/<district>/<precinct>`, newest first.
///
/// A missing folder is an empty listing. Entries without a modification time
/// sort last.
pub async fn list_precinct_files(
    store: &dyn RemoteStore,
    base_path: &str,
    tags: &RoutingTags,
) -> Result<Vec<RemoteEntry>, StoreError> {
    let folder = tags.folder_under(base_path);

    let entries = match store.list_directory(&folder).await {
        Ok(entries) => entries,
        Err(StoreError::NotFound(_)) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files: Vec<RemoteEntry> = entries.into_iter().filter(|e| !e.is_dir).collect();
    files.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    Ok(files)
}
