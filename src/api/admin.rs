//! Administrative endpoints: snapshots and exports

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppResult;

use super::AuthenticatedUser;

#[derive(Deserialize, ToSchema)]
pub struct ExportCsvRequest {
    /// File name inside the data directory, defaults to "catalog.csv"
    pub file_name: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ExportCsvResponse {
    pub path: String,
}

#[derive(Serialize, ToSchema)]
pub struct SaveResponse {
    pub saved: bool,
}

/// Persist the library and member snapshots to disk
#[utoipa::path(
    post,
    path = "/admin/save",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Snapshots written", body = SaveResponse),
        (status = 403, description = "Administrator rights required"),
        (status = 500, description = "Write failed")
    )
)]
pub async fn save_snapshots(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<SaveResponse>> {
    claims.require_admin()?;
    state.services.snapshots.save_all().await?;
    Ok(Json(SaveResponse { saved: true }))
}

/// Export the catalog as CSV into the data directory
#[utoipa::path(
    post,
    path = "/admin/export-csv",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = ExportCsvRequest,
    responses(
        (status = 200, description = "Export written", body = ExportCsvResponse),
        (status = 403, description = "Administrator rights required")
    )
)]
pub async fn export_csv(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ExportCsvRequest>,
) -> AppResult<Json<ExportCsvResponse>> {
    claims.require_admin()?;
    let file_name = request.file_name.unwrap_or_else(|| "catalog.csv".to_string());
    let path = state.services.snapshots.export_csv(&file_name).await?;
    Ok(Json(ExportCsvResponse {
        path: path.display().to_string(),
    }))
}
