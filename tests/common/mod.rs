#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use bytes::Bytes;
use election_upload_relay::config::RelayConfig;
use election_upload_relay::services::memory_store::MemoryStore;
use election_upload_relay::services::storage::{RemoteEntry, RemoteStore, StoreError};
use election_upload_relay::services::transfer::Backoff;
use election_upload_relay::{AppState, create_app};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

/// Memory store that counts calls and injects failures
#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    calls: AtomicUsize,
    write_calls: AtomicUsize,
    /// The next N non-overwriting writes fail with 503
    failing_writes: AtomicU32,
    /// Writes to paths containing one of these always fail with 503
    broken_paths: Mutex<Vec<String>>,
    fail_create_directory: AtomicBool,
    write_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn fail_next_writes(&self, n: u32) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    pub fn break_path(&self, fragment: &str) {
        self.broken_paths.lock().unwrap().push(fragment.to_string());
    }

    pub fn fail_create_directory(&self) {
        self.fail_create_directory.store(true, Ordering::SeqCst);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = delay;
    }

    fn unavailable(path: &str) -> StoreError {
        StoreError::Status {
            status: 503,
            path: path.to_string(),
        }
    }
}

#[async_trait]
impl RemoteStore for RecordingStore {
    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(path).await
    }

    async fn create_directory(&self, path: &str) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create_directory.load(Ordering::SeqCst) {
            return Err(Self::unavailable(path));
        }
        self.inner.create_directory(path).await
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_directory(path).await
    }

    async fn read_file(&self, path: &str) -> Result<Bytes, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.read_file(path).await
    }

    async fn write_file(
        &self,
        path: &str,
        data: Bytes,
        overwrite: bool,
    ) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.write_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if !overwrite {
            let pending = self.failing_writes.load(Ordering::SeqCst);
            if pending > 0 {
                self.failing_writes.store(pending - 1, Ordering::SeqCst);
                return Err(Self::unavailable(path));
            }
        }
        if self
            .broken_paths
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
        {
            return Err(Self::unavailable(path));
        }

        self.inner.write_file(path, data, overwrite).await
    }
}

pub fn test_config(temp_dir: &std::path::Path) -> RelayConfig {
    RelayConfig {
        retry_backoff: Backoff::None,
        temp_dir: temp_dir.to_path_buf(),
        ..RelayConfig::default()
    }
}

pub fn test_app(store: Arc<RecordingStore>, config: RelayConfig) -> Router {
    create_app(AppState::new(store, config))
}

/// Builds a multipart body; every file is sent as a `files` part.
pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (filename, content) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub fn staged_file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
