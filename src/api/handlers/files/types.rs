use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::storage::RemoteEntry;
use crate::services::upload_service::TransferResult;

/// OpenAPI shape of the upload form
#[derive(ToSchema)]
pub struct UploadForm {
    /// District name
    pub bezirk: String,
    /// Precinct code, digits only
    pub bkz: String,
    /// One category label per file, same order as `files`
    pub containers: Vec<String>,
    #[schema(value_type = Vec<String>, format = Binary)]
    pub files: Vec<Vec<u8>>,
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub ok: bool,
    pub files: Vec<TransferResult>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub ok: bool,
    pub message: String,
}

#[derive(Deserialize)]
pub struct ListFilesQuery {
    pub bezirk: Option<String>,
    pub bkz: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileResponse {
    pub name: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

impl From<RemoteEntry> for RemoteFileResponse {
    fn from(entry: RemoteEntry) -> Self {
        Self {
            name: entry.name,
            last_modified: entry.last_modified,
            size: entry.size,
        }
    }
}
