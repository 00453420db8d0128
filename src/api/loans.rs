//! Lending endpoints: loans, returns, reservations

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::user::{Loan, Reservation},
    services::lending::ReturnReceipt,
};

use super::AuthenticatedUser;

/// Borrow request. `username` is admin-only (borrow on a member's behalf);
/// members borrow for themselves.
#[derive(Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub isbn: String,
    pub username: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReturnRequest {
    pub exemplar_id: String,
    pub username: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReservationRequest {
    pub isbn: String,
    pub username: Option<String>,
}

fn resolve_subject(claims: &crate::models::UserClaims, requested: Option<String>) -> AppResult<String> {
    match requested {
        Some(username) => {
            claims.require_self_or_admin(&username)?;
            Ok(username)
        }
        None => Ok(claims.sub.clone()),
    }
}

/// Borrow a copy of a title
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Loan opened", body = Loan),
        (status = 404, description = "Unknown title or user"),
        (status = 422, description = "Member not eligible or no copy available")
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let username = resolve_subject(&claims, request.username)?;
    let today = Utc::now().date_naive();
    let loan = state
        .services
        .lending
        .borrow_title(&request.isbn, &username, today)
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed copy
#[utoipa::path(
    post,
    path = "/loans/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Loan closed, penalty charged if overdue", body = ReturnReceipt),
        (status = 404, description = "Unknown user"),
        (status = 409, description = "No active loan for that exemplar")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ReturnRequest>,
) -> AppResult<Json<ReturnReceipt>> {
    let username = resolve_subject(&claims, request.username)?;
    let today = Utc::now().date_naive();
    let receipt = state
        .services
        .lending
        .return_exemplar(&request.exemplar_id, &username, today)
        .await?;
    Ok(Json(receipt))
}

/// Place a hold on a title
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = ReservationRequest,
    responses(
        (status = 201, description = "Hold placed", body = Reservation),
        (status = 404, description = "Unknown title or user"),
        (status = 409, description = "Already holding this title")
    )
)]
pub async fn create_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ReservationRequest>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    let username = resolve_subject(&claims, request.username)?;
    let today = Utc::now().date_naive();
    let reservation = state
        .services
        .lending
        .reserve(&request.isbn, &username, today)
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// Cancel a hold
#[utoipa::path(
    delete,
    path = "/reservations",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = ReservationRequest,
    responses(
        (status = 204, description = "Hold cancelled"),
        (status = 404, description = "No such hold")
    )
)]
pub async fn cancel_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ReservationRequest>,
) -> AppResult<StatusCode> {
    let username = resolve_subject(&claims, request.username)?;
    state
        .services
        .lending
        .cancel_reservation(&request.isbn, &username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
