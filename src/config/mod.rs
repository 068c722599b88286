use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::audit::AuditFormat;
use crate::services::naming::NamingPolicy;
use crate::services::transfer::{Backoff, RetryPolicy};

/// Runtime configuration of the upload relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// WebDAV endpoint of the remote store, e.g. `https://cloud.example.org/remote.php/dav/files/wahl`
    pub webdav_url: String,
    pub webdav_user: String,
    pub webdav_password: String,

    /// Remote folder all district folders live under (default: "/")
    pub base_path: String,

    /// Port for the HTTP server (default: 3000)
    pub port: u16,

    /// Maximum size of a single uploaded file in bytes (default: 50 MB)
    pub max_file_size: usize,

    /// Maximum number of files per request (default: 3)
    pub max_files: usize,

    /// Concurrent transfers per request, 0 means unbounded (default: 3)
    pub upload_concurrency: usize,

    /// Write attempts per file (default: 3)
    pub retry_attempts: u32,

    /// Backoff between write attempts
    pub retry_backoff: Backoff,

    /// Deadline for a single write attempt (default: 30 s)
    pub transfer_timeout: Duration,

    pub naming_policy: NamingPolicy,

    /// Append a record per stored file to a remote log object (default: false)
    pub audit_log_enabled: bool,
    pub audit_log_format: AuditFormat,
    pub audit_log_name: String,

    /// Local directory used to stage multipart files before the transfer
    pub temp_dir: PathBuf,

    /// Allowed CORS origins (comma separated, "*" for any)
    pub allowed_origins: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            webdav_url: "http://localhost:8080/remote.php/dav/files/admin".to_string(),
            webdav_user: String::new(),
            webdav_password: String::new(),
            base_path: "/".to_string(),
            port: 3000,
            max_file_size: 50 * 1024 * 1024, // 50 MB
            max_files: 3,
            upload_concurrency: 3,
            retry_attempts: 3,
            retry_backoff: Backoff::Fixed(Duration::from_millis(500)),
            transfer_timeout: Duration::from_secs(30),
            naming_policy: NamingPolicy::CheckThenTimestamp,
            audit_log_enabled: false,
            audit_log_format: AuditFormat::Csv,
            audit_log_name: "upload-log.csv".to_string(),
            temp_dir: env::temp_dir().join("uploads"),
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        let backoff_ms: u64 = env::var("UPLOAD_RETRY_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        Self {
            webdav_url: env::var("NEXTCLOUD_URL").unwrap_or(default.webdav_url),
            webdav_user: env::var("NEXTCLOUD_USER").unwrap_or(default.webdav_user),
            webdav_password: env::var("NEXTCLOUD_PASSWORD").unwrap_or(default.webdav_password),
            base_path: env::var("NEXTCLOUD_BASE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.base_path),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            max_files: env::var("MAX_FILES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_files),

            upload_concurrency: env::var("UPLOAD_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.upload_concurrency),

            retry_attempts: env::var("UPLOAD_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.retry_attempts),

            retry_backoff: env::var("UPLOAD_RETRY_BACKOFF")
                .ok()
                .and_then(|v| Backoff::parse(&v, Duration::from_millis(backoff_ms)))
                .unwrap_or(Backoff::Fixed(Duration::from_millis(backoff_ms))),

            transfer_timeout: env::var("UPLOAD_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.transfer_timeout),

            naming_policy: env::var("NAMING_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.naming_policy),

            audit_log_enabled: env::var("AUDIT_LOG_ENABLED")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.audit_log_enabled),

            audit_log_format: env::var("AUDIT_LOG_FORMAT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.audit_log_format),

            audit_log_name: env::var("AUDIT_LOG_NAME").unwrap_or(default.audit_log_name),

            temp_dir: env::var("UPLOAD_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.temp_dir),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for local development (no backoff, audit log on)
    pub fn development() -> Self {
        Self {
            retry_backoff: Backoff::None,
            audit_log_enabled: true,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
            ..Self::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            backoff: self.retry_backoff,
            attempt_timeout: self.transfer_timeout,
        }
    }

    /// Remote path of the shared audit log object
    pub fn audit_log_path(&self) -> String {
        crate::services::storage::remote_join(&self.base_path, &[&self.audit_log_name])
    }

    /// Upper bound for a whole multipart request body
    pub fn body_limit(&self) -> usize {
        self.max_file_size * self.max_files.max(1) + 10 * 1024 * 1024 // multipart overhead
    }
}
