//! Statistics and recommendation endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::title::Title,
    services::stats::StatsResponse,
};

use super::AuthenticatedUser;

#[derive(Deserialize, IntoParams)]
pub struct RecommendationParams {
    /// Maximum suggestions to return, defaults to 5
    pub limit: Option<usize>,
}

/// Library-wide statistics
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Borrow counts, active borrowers, overdue loans", body = StatsResponse),
        (status = 403, description = "Administrator rights required")
    )
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<StatsResponse>> {
    claims.require_admin()?;
    let today = Utc::now().date_naive();
    Ok(Json(state.services.stats.compute_stats(today).await))
}

/// Genre-based suggestions for the authenticated member
#[utoipa::path(
    get,
    path = "/recommendations",
    tag = "stats",
    security(("bearer_auth" = [])),
    params(RecommendationParams),
    responses(
        (status = 200, description = "Suggested titles", body = Vec<Title>)
    )
)]
pub async fn get_recommendations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(params): Query<RecommendationParams>,
) -> AppResult<Json<Vec<Title>>> {
    let limit = params.limit.unwrap_or(5);
    let titles = state
        .services
        .lending
        .recommend_for_user(&claims.sub, limit)
        .await?;
    Ok(Json(titles))
}
