//! User management and authentication service

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{CreateUser, Loan, User, UserClaims, UserView},
    policy::SubscriptionTier,
    store::Store,
};

/// Successful login: a bearer token plus the notifications that queued up
/// since the member's last visit (drained on delivery).
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub user: UserView,
    pub notifications: Vec<String>,
}

#[derive(Clone)]
pub struct UsersService {
    store: Arc<Store>,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(store: Arc<Store>, config: AuthConfig) -> Self {
        Self { store, config }
    }

    /// Authenticate by username/password and mint a JWT. Pending
    /// notifications are delivered exactly once, here.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<LoginOutcome> {
        let mut state = self.store.write().await;
        let user = state.users.get_mut(username).ok_or_else(|| {
            AppError::Authentication("Invalid username or password".to_string())
        })?;

        if !verify_password(&user.password_hash, password) {
            return Err(AppError::Authentication(
                "Invalid username or password".to_string(),
            ));
        }

        let notifications = std::mem::take(&mut user.notifications);

        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);
        let claims = UserClaims {
            sub: user.username.clone(),
            is_admin: user.is_admin,
            exp,
            iat: now,
        };
        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok(LoginOutcome {
            token,
            user: UserView::from(&*user),
            notifications,
        })
    }

    /// Register a member. The tier label falls back to basic when unknown.
    pub async fn create_user(&self, request: CreateUser, today: NaiveDate) -> AppResult<UserView> {
        let mut state = self.store.write().await;
        if state.users.contains_key(&request.username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                request.username
            )));
        }

        let tier = request
            .tier
            .as_deref()
            .map(SubscriptionTier::parse_or_basic)
            .unwrap_or_default();
        let hash = hash_password(&request.password)?;
        let user = User::new(&request.username, hash, tier, request.is_admin, today);
        let view = UserView::from(&user);
        state.users.insert(request.username.clone(), user);
        tracing::info!(user = %request.username, tier = %tier, "User created");
        Ok(view)
    }

    pub async fn get_user(&self, username: &str) -> AppResult<UserView> {
        let state = self.store.read().await;
        Ok(UserView::from(state.user(username)?))
    }

    pub async fn list_users(&self) -> Vec<UserView> {
        let state = self.store.read().await;
        state.users.values().map(UserView::from).collect()
    }

    /// Delete a user and drop their queue entries so no title keeps a hold
    /// for a username that no longer exists.
    pub async fn delete_user(&self, username: &str) -> AppResult<()> {
        let mut state = self.store.write().await;
        if state.users.shift_remove(username).is_none() {
            return Err(AppError::NotFound(format!("No user named {}", username)));
        }
        let held: Vec<String> = state
            .library
            .reservations
            .iter()
            .filter(|(_, q)| q.iter().any(|u| u == username))
            .map(|(isbn, _)| isbn.clone())
            .collect();
        for isbn in held {
            state.library.cancel(&isbn, username);
        }
        tracing::info!(user = %username, "User deleted");
        Ok(())
    }

    pub async fn get_user_loans(&self, username: &str) -> AppResult<Vec<Loan>> {
        let state = self.store.read().await;
        Ok(state.user(username)?.loans.clone())
    }

    /// Extend a subscription by `extra_days`; refused when the user has no
    /// subscription to renew.
    pub async fn renew_subscription(
        &self,
        username: &str,
        extra_days: u64,
    ) -> AppResult<NaiveDate> {
        let mut state = self.store.write().await;
        let user = state.user_mut(username)?;
        user.renew_subscription(extra_days).ok_or_else(|| {
            AppError::State(format!("{} has no subscription to renew", username))
        })
    }

    /// Clear the penalty balance; returns the amount cleared.
    pub async fn pay_penalties(&self, username: &str) -> AppResult<Decimal> {
        let mut state = self.store.write().await;
        let user = state.user_mut(username)?;
        let cleared = user.pay_penalties();
        tracing::info!(user = %username, amount = %cleared, "Penalties paid");
        Ok(cleared)
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::State;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn service() -> UsersService {
        UsersService::new(
            Arc::new(Store::new(State::new("test"))),
            AuthConfig::default(),
        )
    }

    fn create_request(name: &str, tier: Option<&str>) -> CreateUser {
        CreateUser {
            username: name.to_string(),
            password: "s3cret".to_string(),
            tier: tier.map(String::from),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_create_login_and_notification_drain() {
        let svc = service();
        svc.create_user(create_request("alice", Some("premium")), today())
            .await
            .unwrap();

        // Queue a notification out of band
        {
            let mut state = svc.store.write().await;
            state
                .user_mut("alice")
                .unwrap()
                .notifications
                .push("hold ready".to_string());
        }

        let outcome = svc.authenticate("alice", "s3cret").await.unwrap();
        assert!(!outcome.token.is_empty());
        assert_eq!(outcome.notifications, vec!["hold ready".to_string()]);

        // Drained: a second login has nothing pending
        let outcome = svc.authenticate("alice", "s3cret").await.unwrap();
        assert!(outcome.notifications.is_empty());
    }

    #[tokio::test]
    async fn test_bad_credentials_rejected() {
        let svc = service();
        svc.create_user(create_request("alice", None), today())
            .await
            .unwrap();
        assert!(matches!(
            svc.authenticate("alice", "wrong").await.unwrap_err(),
            AppError::Authentication(_)
        ));
        assert!(matches!(
            svc.authenticate("nobody", "s3cret").await.unwrap_err(),
            AppError::Authentication(_)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let svc = service();
        svc.create_user(create_request("alice", None), today())
            .await
            .unwrap();
        let err = svc
            .create_user(create_request("alice", None), today())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unknown_tier_falls_back_to_basic() {
        let svc = service();
        let view = svc
            .create_user(create_request("bob", Some("platinum")), today())
            .await
            .unwrap();
        assert_eq!(view.subscription.unwrap().tier, SubscriptionTier::Basic);
    }

    #[tokio::test]
    async fn test_delete_user_clears_queue_entries() {
        let svc = service();
        svc.create_user(create_request("bob", None), today())
            .await
            .unwrap();
        {
            let mut state = svc.store.write().await;
            state
                .library
                .add_exemplar(crate::store::NewExemplar {
                    title: "T".to_string(),
                    author: "A".to_string(),
                    isbn: "I1".to_string(),
                    exemplar_id: None,
                    genre: None,
                    digital_size: None,
                })
                .unwrap();
            state.library.reserve("I1", "bob").unwrap();
        }

        svc.delete_user("bob").await.unwrap();
        let state = svc.store.read().await;
        assert!(state.library.peek_head("I1").is_none());
    }
}
