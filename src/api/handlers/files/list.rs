use axum::{
    Json,
    extract::{Query, State},
};
use validator::Validate;

use super::types::*;
use crate::api::error::AppError;
use crate::services::listing::list_precinct_files;
use crate::utils::validation::RoutingTags;

#[utoipa::path(
    get,
    path = "/api/files",
    params(
        ("bezirk" = String, Query, description = "District"),
        ("bkz" = String, Query, description = "Precinct code")
    ),
    responses(
        (status = 200, description = "Files of the precinct folder, newest first", body = Vec<RemoteFileResponse>),
        (status = 400, description = "Missing bezirk/bkz", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<crate::AppState>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<Vec<RemoteFileResponse>>, AppError> {
    let tags = RoutingTags::sanitized(
        query.bezirk.as_deref().unwrap_or_default(),
        query.bkz.as_deref().unwrap_or_default(),
    );
    tags.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let files = list_precinct_files(state.store.as_ref(), &state.config.base_path, &tags).await?;

    Ok(Json(files.into_iter().map(RemoteFileResponse::from).collect()))
}
