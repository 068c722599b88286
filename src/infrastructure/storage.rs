use crate::config::RelayConfig;
use crate::services::memory_store::MemoryStore;
use crate::services::storage::RemoteStore;
use crate::services::webdav::WebDavStore;
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageBackend {
    /// Nextcloud / WebDAV server from NEXTCLOUD_URL
    Webdav,
    /// Process-local store, contents are lost on exit
    Memory,
}

pub async fn setup_storage(
    config: &RelayConfig,
    backend: StorageBackend,
) -> anyhow::Result<Arc<dyn RemoteStore>> {
    let store: Arc<dyn RemoteStore> = match backend {
        StorageBackend::Memory => {
            warn!("🧪 Using in-memory storage, uploads are not persisted");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::Webdav => {
            let base_url = url::Url::parse(&config.webdav_url)
                .with_context(|| format!("Invalid NEXTCLOUD_URL: {}", config.webdav_url))?;
            if config.webdav_user.is_empty() {
                warn!("⚠️  NEXTCLOUD_USER is empty, requests will likely be rejected");
            }

            let client = reqwest::Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .context("Failed to build HTTP client")?;

            info!(
                "☁️  WebDAV Storage: {} (Base path: {})",
                base_url, config.base_path
            );
            Arc::new(WebDavStore::new(
                client,
                base_url,
                config.webdav_user.clone(),
                config.webdav_password.clone(),
            ))
        }
    };

    // Warm up the connection
    match store.exists(&config.base_path).await {
        Ok(true) => info!("✅ Base path '{}' is ready", config.base_path),
        Ok(false) => info!(
            "🪣 Base path '{}' not found, it is created on the first upload",
            config.base_path
        ),
        Err(e) => warn!("⚠️  Remote storage unreachable: {}", e),
    }

    Ok(store)
}
