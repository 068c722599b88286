use bytes::Bytes;
use chrono::{DateTime, Local};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use super::storage::{RemoteStore, StoreError};
use crate::utils::keyed_mutex::KeyedMutex;

pub const CSV_HEADER: &str = "timestamp,bezirk,bkz,container,original_name,remote_path";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditFormat {
    Csv,
    Text,
}

impl FromStr for AuditFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "text" | "txt" => Ok(Self::Text),
            other => Err(format!("unknown audit log format: {}", other)),
        }
    }
}

impl fmt::Display for AuditFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// One stored file
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub timestamp: DateTime<Local>,
    pub district: String,
    pub precinct: String,
    pub category: String,
    pub original_name: String,
    pub remote_path: String,
}

impl AuditRecord {
    pub fn to_line(&self, format: AuditFormat) -> String {
        let ts = self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        let fields = [
            ts.as_str(),
            self.district.as_str(),
            self.precinct.as_str(),
            self.category.as_str(),
            self.original_name.as_str(),
            self.remote_path.as_str(),
        ];
        match format {
            AuditFormat::Csv => fields
                .iter()
                .map(|f| csv_field(f))
                .collect::<Vec<_>>()
                .join(","),
            AuditFormat::Text => fields
                .iter()
                .map(|f| f.replace(['\r', '\n'], " "))
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Appends records to a shared remote log object.
///
/// The store has no append primitive, so every append reads the whole object
/// and writes it back. Appends to the same log path are serialized inside this
/// process; separate processes writing the same log can still lose lines.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn RemoteStore>,
    log_path: String,
    format: AuditFormat,
    locks: KeyedMutex,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn RemoteStore>, log_path: String, format: AuditFormat) -> Self {
        Self {
            store,
            log_path,
            format,
            locks: KeyedMutex::new(),
        }
    }

    pub fn log_path(&self) -> &str {
        &self.log_path
    }

    pub async fn append(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let _guard = self.locks.lock(&self.log_path).await;

        let current = match self.store.read_file(&self.log_path).await {
            Ok(bytes) => bytes.to_vec(),
            Err(StoreError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        let content = self.appended(current, record);
        self.store
            .write_file(&self.log_path, Bytes::from(content), true)
            .await?;

        info!(
            target: "audit",
            bezirk = %record.district,
            bkz = %record.precinct,
            container = %record.category,
            remote_path = %record.remote_path,
            "Upload recorded"
        );
        Ok(())
    }

    /// Existing bytes are kept as they are, whatever their encoding.
    fn appended(&self, mut content: Vec<u8>, record: &AuditRecord) -> Vec<u8> {
        if self.format == AuditFormat::Csv && !content.starts_with(CSV_HEADER.as_bytes()) {
            let mut with_header = format!("{}\n", CSV_HEADER).into_bytes();
            with_header.append(&mut content);
            content = with_header;
        }
        if !content.is_empty() && !content.ends_with(b"\n") {
            content.push(b'\n');
        }
        content.extend_from_slice(record.to_line(self.format).as_bytes());
        content.push(b'\n');
        content
    }
}
