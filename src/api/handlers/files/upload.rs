use axum::{
    Json,
    extract::{Multipart, State, multipart::Field},
};
use futures::TryStreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

use super::types::*;
use crate::api::error::AppError;
use crate::config::RelayConfig;
use crate::services::upload_service::{FileItem, UploadRequest, discard};

fn multipart_error(err_msg: String) -> AppError {
    if err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(err_msg)
    }
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(
        content = UploadForm,
        content_type = "multipart/form-data",
        description = "Fields `bezirk`, `bkz`, one `containers` label per file and the `files` parts"
    ),
    responses(
        (status = 200, description = "Files processed, see per-file status", body = UploadResponse),
        (status = 400, description = "Missing bezirk/bkz or no files", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Remote folder could not be prepared", body = ErrorResponse)
    ),
    tag = "upload"
)]
pub async fn upload_files(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut request = UploadRequest::default();

    // Capture errors so the rest of the multipart stream can still be consumed
    let parsed: Result<(), AppError> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();

            match name.as_str() {
                "bezirk" => {
                    request.district = field
                        .text()
                        .await
                        .map_err(|e| multipart_error(e.to_string()))?;
                }
                "bkz" => {
                    request.precinct = field
                        .text()
                        .await
                        .map_err(|e| multipart_error(e.to_string()))?;
                }
                "containers" | "containers[]" => {
                    let label = field
                        .text()
                        .await
                        .map_err(|e| multipart_error(e.to_string()))?;
                    request.containers.push(label);
                }
                "files" | "files[]" | "file" => {
                    if request.files.len() >= state.config.max_files {
                        return Err(AppError::BadRequest(format!(
                            "At most {} files per upload",
                            state.config.max_files
                        )));
                    }
                    let original_name = field.file_name().unwrap_or("unnamed").to_string();
                    let item = stage_file(&state.config, original_name, field).await?;
                    request.files.push(item);
                }
                other => tracing::debug!("Ignoring unknown form field {}", other),
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = parsed {
        tracing::warn!("Upload rejected early: {}. Consuming remaining stream...", e);
        while let Ok(Some(mut field)) = multipart.next_field().await {
            while let Ok(Some(_)) = field.chunk().await {}
        }
        discard(request.files).await;
        return Err(e);
    }

    let files = state.upload_service.process(request).await?;

    Ok(Json(UploadResponse { ok: true, files }))
}

/// Streams one multipart file into a temp file under the configured staging dir.
async fn stage_file(
    config: &RelayConfig,
    original_name: String,
    field: Field<'_>,
) -> Result<FileItem, AppError> {
    tokio::fs::create_dir_all(&config.temp_dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create staging dir: {}", e)))?;

    let staged = tempfile::Builder::new()
        .prefix("upload-")
        .tempfile_in(&config.temp_dir)
        .map_err(|e| AppError::Internal(format!("Failed to create temp file: {}", e)))?;
    let (std_file, temp_path) = staged.into_parts();
    let mut file = tokio::fs::File::from_std(std_file);

    let limit = config.max_file_size as u64;
    let body_with_io_error = field.map_err(std::io::Error::other);
    let mut reader = StreamReader::new(body_with_io_error).take(limit + 1);

    let size = tokio::io::copy(&mut reader, &mut file)
        .await
        .map_err(|e| multipart_error(e.to_string()))?;
    file.flush()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to write temp file: {}", e)))?;

    // `temp_path` is dropped on every early return, removing the file
    if size > limit {
        return Err(AppError::PayloadTooLarge(format!(
            "{} exceeds the maximum file size of {} MB",
            original_name,
            limit / 1024 / 1024
        )));
    }

    tracing::debug!(
        "Staged {} ({} bytes) at {}",
        original_name,
        size,
        temp_path.display()
    );

    Ok(FileItem {
        temp_path,
        original_name,
        size,
    })
}
