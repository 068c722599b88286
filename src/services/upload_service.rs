use bytes::Bytes;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::sync::Arc;
use tempfile::TempPath;
use thiserror::Error;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::audit::{AuditLogger, AuditRecord};
use super::limiter::ConcurrencyLimiter;
use super::naming::ConflictSafeNamer;
use super::provisioner::ensure_folder_recursive;
use super::storage::{RemoteStore, StoreError, remote_join};
use super::transfer::{TransferError, TransferExecutor};
use crate::config::RelayConfig;
use crate::utils::validation::{RoutingTags, sanitize_extension};

/// A multipart file staged on local disk.
///
/// The temp file is removed when the item is dropped; the orchestrator removes
/// it explicitly once the transfer is done so failures get logged.
#[derive(Debug)]
pub struct FileItem {
    pub temp_path: TempPath,
    pub original_name: String,
    pub size: u64,
}

/// Parsed upload form
#[derive(Debug, Default)]
pub struct UploadRequest {
    pub district: String,
    pub precinct: String,
    /// One label per file, same order as `files`
    pub containers: Vec<String>,
    pub files: Vec<FileItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub original_name: String,
    pub container: String,
    pub remote_path: Option<String>,
    pub size: u64,
    pub timestamp: DateTime<Utc>,
    pub attempts: u32,
    pub status: TransferStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferResult {
    pub fn is_ok(&self) -> bool {
        self.status == TransferStatus::Ok
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to prepare remote folder: {0}")]
    Provision(#[source] StoreError),
}

/// Why a single file could not be stored
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Failed to read staged file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to check remote name: {0}")]
    Naming(#[from] StoreError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("No free remote name for {0}")]
    NoFreeName(String),
}

impl FileError {
    fn attempts(&self) -> u32 {
        match self {
            FileError::Transfer(TransferError::Exhausted { attempts, .. }) => *attempts,
            _ => 0,
        }
    }
}

/// Relays staged uploads into `<base>/<district>/<precinct>/` on the remote store.
pub struct UploadService {
    store: Arc<dyn RemoteStore>,
    base_path: String,
    namer: ConflictSafeNamer,
    executor: TransferExecutor,
    concurrency: usize,
    audit: Option<AuditLogger>,
}

impl UploadService {
    pub fn new(store: Arc<dyn RemoteStore>, config: &RelayConfig) -> Self {
        let audit = config.audit_log_enabled.then(|| {
            AuditLogger::new(
                store.clone(),
                config.audit_log_path(),
                config.audit_log_format,
            )
        });

        Self {
            store,
            base_path: config.base_path.clone(),
            namer: ConflictSafeNamer::new(config.naming_policy),
            executor: TransferExecutor::new(config.retry_policy()),
            concurrency: config.upload_concurrency,
            audit,
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Validates, provisions the folder and transfers every file.
    ///
    /// A failing file does not stop its siblings; each outcome is reported in
    /// the returned list, in input order. Staged files are always removed.
    pub async fn process(&self, request: UploadRequest) -> Result<Vec<TransferResult>, UploadError> {
        let UploadRequest {
            district,
            precinct,
            containers,
            files,
        } = request;

        let tags = RoutingTags::sanitized(&district, &precinct);
        if let Err(e) = tags.validate() {
            discard(files).await;
            return Err(UploadError::Validation(e.to_string()));
        }
        if files.is_empty() {
            return Err(UploadError::Validation("No file provided".to_string()));
        }

        let folder = tags.folder_under(&self.base_path);
        if let Err(e) = ensure_folder_recursive(self.store.as_ref(), &folder).await {
            discard(files).await;
            return Err(UploadError::Provision(e));
        }

        info!(
            "Relaying {} file(s) to {} (concurrency {})",
            files.len(),
            folder,
            self.concurrency
        );

        let limiter = ConcurrencyLimiter::new(self.concurrency);
        let (folder, tags, containers) = (folder.as_str(), &tags, &containers);
        let units = files.into_iter().enumerate().map(move |(i, file)| {
            let category = RoutingTags::category(containers, i);
            self.process_item(folder, tags, category, file)
        });

        Ok(limiter.run_all(units).await)
    }

    async fn process_item(
        &self,
        folder: &str,
        tags: &RoutingTags,
        category: String,
        file: FileItem,
    ) -> TransferResult {
        let outcome = self.store_item(folder, &category, &file).await;

        let result = match outcome {
            Ok((remote_path, size, attempts)) => {
                info!("Stored {} as {}", file.original_name, remote_path);
                self.record(tags, &category, &file.original_name, &remote_path)
                    .await;
                TransferResult {
                    original_name: file.original_name.clone(),
                    container: category,
                    remote_path: Some(remote_path),
                    size,
                    timestamp: Utc::now(),
                    attempts,
                    status: TransferStatus::Ok,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Failed to store {}: {}", file.original_name, e);
                TransferResult {
                    original_name: file.original_name.clone(),
                    container: category,
                    remote_path: None,
                    size: file.size,
                    timestamp: Utc::now(),
                    attempts: e.attempts(),
                    status: TransferStatus::Error,
                    error: Some(e.to_string()),
                }
            }
        };

        cleanup(file).await;
        result
    }

    /// Returns the final remote path, the stored size and the attempts used.
    async fn store_item(
        &self,
        folder: &str,
        category: &str,
        file: &FileItem,
    ) -> Result<(String, u64, u32), FileError> {
        let data = Bytes::from(tokio::fs::read(&file.temp_path).await?);
        let size = data.len() as u64;
        let ext = sanitize_extension(&file.original_name);
        let at = Local::now().naive_local();

        let initial = self
            .namer
            .initial_name(self.store.as_ref(), folder, category, &ext, at)
            .await?;

        for name in self.namer.candidates(initial, category, &ext, at) {
            let remote_path = remote_join(folder, &[&name]);
            match self
                .executor
                .transfer(self.store.as_ref(), &remote_path, data.clone())
                .await
            {
                Ok(attempts) => return Ok((remote_path, size, attempts)),
                Err(TransferError::Conflict(path)) => {
                    debug!("{} already exists, trying next name", path);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(FileError::NoFreeName(file.original_name.clone()))
    }

    /// Audit failures never fail the file
    async fn record(&self, tags: &RoutingTags, category: &str, original_name: &str, remote_path: &str) {
        let Some(audit) = &self.audit else {
            return;
        };
        let record = AuditRecord {
            timestamp: Local::now(),
            district: tags.district.clone(),
            precinct: tags.precinct.clone(),
            category: category.to_string(),
            original_name: original_name.to_string(),
            remote_path: remote_path.to_string(),
        };
        if let Err(e) = audit.append(&record).await {
            warn!(
                "Failed to append {} to audit log {}: {}",
                remote_path,
                audit.log_path(),
                e
            );
        }
    }
}

async fn cleanup(file: FileItem) {
    let path = file.temp_path.to_path_buf();
    match tokio::task::spawn_blocking(move || file.temp_path.close()).await {
        Ok(Ok(())) => debug!("Removed temp file {}", path.display()),
        Ok(Err(e)) => warn!("Failed to remove temp file {}: {}", path.display(), e),
        Err(e) => warn!("Temp file cleanup task failed for {}: {}", path.display(), e),
    }
}

/// Removes staged files of a request that is not going to be relayed.
pub async fn discard(files: Vec<FileItem>) {
    for file in files {
        cleanup(file).await;
    }
}
