//! Catalog endpoints: titles, exemplars, reviews

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::title::{Review, StatusCounts, Title},
    store::NewExemplar,
};

use super::AuthenticatedUser;

/// Catalog search filters
#[derive(Deserialize, IntoParams)]
pub struct TitleQueryParams {
    /// Exact title match
    pub title: Option<String>,
    /// Exact author match
    pub author: Option<String>,
}

/// Create title request (seeds the title with one exemplar)
#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateTitleRequest {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub author: String,
    #[validate(length(min = 1))]
    pub isbn: String,
    pub exemplar_id: Option<String>,
    pub genre: Option<String>,
    /// Set for digital titles, e.g. "2MB"
    pub digital_size: Option<String>,
}

/// Add exemplar request
#[derive(Deserialize, ToSchema)]
pub struct CreateExemplarRequest {
    pub exemplar_id: Option<String>,
}

/// Exemplar state transition request
#[derive(Deserialize, ToSchema)]
pub struct SetExemplarStateRequest {
    /// One of: available, borrowed, damaged, lost
    pub state: String,
}

/// Review submission
#[derive(Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    /// 1 to 5
    pub rating: u8,
    pub comment: String,
}

#[derive(Serialize, ToSchema)]
pub struct ExemplarResponse {
    pub exemplar_id: String,
    pub title: Title,
}

/// List or search the catalog
#[utoipa::path(
    get,
    path = "/titles",
    tag = "titles",
    security(("bearer_auth" = [])),
    params(TitleQueryParams),
    responses(
        (status = 200, description = "Matching titles", body = Vec<Title>)
    )
)]
pub async fn list_titles(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(params): Query<TitleQueryParams>,
) -> AppResult<Json<Vec<Title>>> {
    let query = crate::services::catalog::TitleQuery {
        title: params.title,
        author: params.author,
    };
    Ok(Json(state.services.catalog.search(&query).await))
}

/// Create a title (seeded with one exemplar), or add a copy to an existing one
#[utoipa::path(
    post,
    path = "/titles",
    tag = "titles",
    security(("bearer_auth" = [])),
    request_body = CreateTitleRequest,
    responses(
        (status = 201, description = "Title created or copy added", body = ExemplarResponse),
        (status = 409, description = "Exemplar id already in use")
    )
)]
pub async fn create_title(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateTitleRequest>,
) -> AppResult<(StatusCode, Json<ExemplarResponse>)> {
    claims.require_admin()?;
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (exemplar_id, title) = state
        .services
        .catalog
        .add_exemplar(NewExemplar {
            title: request.title,
            author: request.author,
            isbn: request.isbn,
            exemplar_id: request.exemplar_id,
            genre: request.genre,
            digital_size: request.digital_size,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ExemplarResponse { exemplar_id, title })))
}

/// Get one title with its exemplars, reviews and history
#[utoipa::path(
    get,
    path = "/titles/{isbn}",
    tag = "titles",
    security(("bearer_auth" = [])),
    params(("isbn" = String, Path, description = "ISBN")),
    responses(
        (status = 200, description = "Title", body = Title),
        (status = 404, description = "Unknown ISBN")
    )
)]
pub async fn get_title(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(isbn): Path<String>,
) -> AppResult<Json<Title>> {
    Ok(Json(state.services.catalog.get_title(&isbn).await?))
}

/// Delete a title and all its exemplars
#[utoipa::path(
    delete,
    path = "/titles/{isbn}",
    tag = "titles",
    security(("bearer_auth" = [])),
    params(("isbn" = String, Path, description = "ISBN")),
    responses(
        (status = 204, description = "Title deleted"),
        (status = 404, description = "Unknown ISBN")
    )
)]
pub async fn delete_title(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(isbn): Path<String>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.catalog.remove_title(&isbn).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add an exemplar to an existing title
#[utoipa::path(
    post,
    path = "/titles/{isbn}/exemplars",
    tag = "titles",
    security(("bearer_auth" = [])),
    params(("isbn" = String, Path, description = "ISBN")),
    request_body = CreateExemplarRequest,
    responses(
        (status = 201, description = "Exemplar added", body = ExemplarResponse),
        (status = 404, description = "Unknown ISBN")
    )
)]
pub async fn create_exemplar(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(isbn): Path<String>,
    Json(request): Json<CreateExemplarRequest>,
) -> AppResult<(StatusCode, Json<ExemplarResponse>)> {
    claims.require_admin()?;
    // Appending to an existing title only; creation goes through POST /titles
    let existing = state.services.catalog.get_title(&isbn).await?;

    let (exemplar_id, title) = state
        .services
        .catalog
        .add_exemplar(NewExemplar {
            title: existing.title,
            author: existing.author,
            isbn,
            exemplar_id: request.exemplar_id,
            genre: existing.genre,
            digital_size: existing.digital_size,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ExemplarResponse { exemplar_id, title })))
}

/// Transition an exemplar's state (admin only; damaged/lost do not revert)
#[utoipa::path(
    put,
    path = "/exemplars/{id}/state",
    tag = "titles",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Exemplar id")),
    request_body = SetExemplarStateRequest,
    responses(
        (status = 200, description = "Updated per-state counts", body = StatusCounts),
        (status = 404, description = "Unknown exemplar id"),
        (status = 400, description = "Unknown state label")
    )
)]
pub async fn set_exemplar_state(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<SetExemplarStateRequest>,
) -> AppResult<Json<StatusCounts>> {
    claims.require_admin()?;
    let counts = state
        .services
        .catalog
        .set_exemplar_state(&id, &request.state)
        .await?;
    Ok(Json(counts))
}

/// Per-state copy counts for a title
#[utoipa::path(
    get,
    path = "/titles/{isbn}/status",
    tag = "titles",
    security(("bearer_auth" = [])),
    params(("isbn" = String, Path, description = "ISBN")),
    responses(
        (status = 200, description = "Status counts", body = StatusCounts),
        (status = 404, description = "Unknown ISBN")
    )
)]
pub async fn status_counts(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(isbn): Path<String>,
) -> AppResult<Json<StatusCounts>> {
    Ok(Json(state.services.catalog.status_counts(&isbn).await?))
}

/// Review a title as the authenticated member
#[utoipa::path(
    post,
    path = "/titles/{isbn}/reviews",
    tag = "titles",
    security(("bearer_auth" = [])),
    params(("isbn" = String, Path, description = "ISBN")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review added", body = Review),
        (status = 400, description = "Rating out of range"),
        (status = 404, description = "Unknown ISBN")
    )
)]
pub async fn create_review(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(isbn): Path<String>,
    Json(request): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let review = state
        .services
        .catalog
        .add_review(&isbn, &claims.sub, request.rating, request.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}
