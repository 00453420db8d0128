//! Member account endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, Loan, UserView},
};

use super::AuthenticatedUser;

#[derive(Deserialize, ToSchema)]
pub struct RenewSubscriptionRequest {
    /// Additional days to add to the expiration date
    pub extra_days: u64,
}

#[derive(Serialize, ToSchema)]
pub struct RenewSubscriptionResponse {
    pub expiration_date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct PayPenaltiesResponse {
    /// Amount cleared from the balance
    #[schema(value_type = String)]
    pub amount_paid: Decimal,
}

/// List all members
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All members", body = Vec<UserView>),
        (status = 403, description = "Administrator rights required")
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<UserView>>> {
    claims.require_admin()?;
    Ok(Json(state.services.users.list_users().await))
}

/// Register a member
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "Member registered", body = UserView),
        (status = 409, description = "Username taken")
    )
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    claims.require_admin()?;
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let today = Utc::now().date_naive();
    let user = state.services.users.create_user(request, today).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Fetch a member's profile
#[utoipa::path(
    get,
    path = "/users/{username}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Profile", body = UserView),
        (status = 404, description = "Unknown member")
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(username): Path<String>,
) -> AppResult<Json<UserView>> {
    claims.require_self_or_admin(&username)?;
    Ok(Json(state.services.users.get_user(&username).await?))
}

/// Remove a member and their queued holds
#[utoipa::path(
    delete,
    path = "/users/{username}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 204, description = "Member removed"),
        (status = 404, description = "Unknown member")
    )
)]
pub async fn delete_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(username): Path<String>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.users.delete_user(&username).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A member's full loan ledger, open and closed
#[utoipa::path(
    get,
    path = "/users/{username}/loans",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Loan ledger", body = Vec<Loan>),
        (status = 404, description = "Unknown member")
    )
)]
pub async fn get_user_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(username): Path<String>,
) -> AppResult<Json<Vec<Loan>>> {
    claims.require_self_or_admin(&username)?;
    Ok(Json(state.services.users.get_user_loans(&username).await?))
}

/// Extend a member's subscription
#[utoipa::path(
    post,
    path = "/users/{username}/subscription/renew",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("username" = String, Path, description = "Username")),
    request_body = RenewSubscriptionRequest,
    responses(
        (status = 200, description = "New expiration date", body = RenewSubscriptionResponse),
        (status = 409, description = "Member has no subscription")
    )
)]
pub async fn renew_subscription(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(username): Path<String>,
    Json(request): Json<RenewSubscriptionRequest>,
) -> AppResult<Json<RenewSubscriptionResponse>> {
    claims.require_self_or_admin(&username)?;
    let expiration_date = state
        .services
        .users
        .renew_subscription(&username, request.extra_days)
        .await?;
    Ok(Json(RenewSubscriptionResponse { expiration_date }))
}

/// Settle a member's penalty balance
#[utoipa::path(
    post,
    path = "/users/{username}/penalties/pay",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Balance cleared", body = PayPenaltiesResponse),
        (status = 404, description = "Unknown member")
    )
)]
pub async fn pay_penalties(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(username): Path<String>,
) -> AppResult<Json<PayPenaltiesResponse>> {
    claims.require_self_or_admin(&username)?;
    let amount_paid = state.services.users.pay_penalties(&username).await?;
    Ok(Json(PayPenaltiesResponse { amount_paid }))
}
