//! User model, loan ledger and JWT claims.
//!
//! The loan ledger lives directly on the user: loans, accumulated penalties
//! and the monthly borrow counter are only ever mutated by operations about
//! that user, so the methods here take `&mut self` and a caller-supplied
//! `today` (tests control the clock, handlers pass the current date).

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::policy::SubscriptionTier;

/// Subscription attached to a user. Replaced wholesale on tier change;
/// renewal extends the expiration date rather than recomputing it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    pub tier: SubscriptionTier,
    pub start_date: NaiveDate,
    pub expiration_date: NaiveDate,
}

impl Subscription {
    pub fn renew(&mut self, extra_days: u64) {
        self.expiration_date = self
            .expiration_date
            .checked_add_days(Days::new(extra_days))
            .unwrap_or(self.expiration_date);
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiration_date < today
    }
}

/// One borrow-to-return episode. Never deleted; a set return date makes it
/// terminal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Loan {
    pub isbn: String,
    pub exemplar_id: String,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_date: Option<NaiveDate>,
    /// Penalty accrued on this loan; 0 until returned late
    #[serde(default)]
    pub penalty: Decimal,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.returned_date.is_none()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_open() && self.due_date < today
    }
}

/// User-side mirror of a title-side reservation queue entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Reservation {
    pub isbn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exemplar_id: Option<String>,
    pub reserved_on: NaiveDate,
}

/// Library member or administrator, keyed by immutable username
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub subscription: Option<Subscription>,
    #[serde(default)]
    pub loans: Vec<Loan>,
    #[serde(default)]
    pub reservations: Vec<Reservation>,
    #[serde(default)]
    pub penalty_balance: Decimal,
    /// Pending notification strings, drained at next login
    #[serde(default)]
    pub notifications: Vec<String>,
    #[serde(default)]
    pub monthly_borrows: u32,
    /// Month the monthly counter was last reset (stored as its first day)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reset: Option<NaiveDate>,
}

impl User {
    /// Create a user with a fresh subscription. Initial expiration is twelve
    /// loan-durations out.
    pub fn new(
        username: &str,
        password_hash: String,
        tier: SubscriptionTier,
        is_admin: bool,
        today: NaiveDate,
    ) -> Self {
        let duration = tier.policy().loan_days as u64;
        let expiration = today
            .checked_add_days(Days::new(duration * 12))
            .unwrap_or(today);
        Self {
            username: username.to_string(),
            password_hash,
            is_admin,
            subscription: Some(Subscription {
                tier,
                start_date: today,
                expiration_date: expiration,
            }),
            loans: Vec::new(),
            reservations: Vec::new(),
            penalty_balance: Decimal::ZERO,
            notifications: Vec::new(),
            monthly_borrows: 0,
            last_reset: None,
        }
    }

    pub fn tier(&self) -> SubscriptionTier {
        self.subscription
            .as_ref()
            .map(|s| s.tier)
            .unwrap_or_default()
    }

    pub fn active_loan_count(&self) -> usize {
        self.loans.iter().filter(|l| l.is_open()).count()
    }

    pub fn open_loan_index(&self, exemplar_id: &str) -> Option<usize> {
        self.loans
            .iter()
            .position(|l| l.is_open() && l.exemplar_id == exemplar_id)
    }

    /// Reset the monthly borrow counter when the calendar month has changed
    /// since the last check.
    fn refresh_monthly_counter(&mut self, today: NaiveDate) {
        let same_month = self
            .last_reset
            .map(|d| (d.year(), d.month()) == (today.year(), today.month()))
            .unwrap_or(false);
        if !same_month {
            self.monthly_borrows = 0;
            self.last_reset = today.with_day(1);
        }
    }

    /// Check every borrow precondition, reporting the first one that fails.
    /// Each refusal carries its own message so callers can tell a penalty
    /// block from an expired subscription from a quota.
    pub fn check_can_borrow(&mut self, today: NaiveDate) -> AppResult<()> {
        if self.penalty_balance > Decimal::ZERO {
            return Err(AppError::Eligibility(format!(
                "outstanding penalties of {} must be paid before borrowing",
                self.penalty_balance
            )));
        }
        let subscription = self
            .subscription
            .as_ref()
            .ok_or_else(|| AppError::Eligibility("no active subscription".to_string()))?;
        if subscription.is_expired(today) {
            return Err(AppError::Eligibility(format!(
                "subscription expired on {}",
                subscription.expiration_date
            )));
        }

        self.refresh_monthly_counter(today);

        let policy = self.tier().policy();
        if self.active_loan_count() as u32 >= policy.max_loans {
            return Err(AppError::Eligibility(format!(
                "concurrent loan limit of {} reached",
                policy.max_loans
            )));
        }
        if self.monthly_borrows >= policy.max_loans {
            return Err(AppError::Eligibility(format!(
                "monthly borrow quota of {} reached",
                policy.max_loans
            )));
        }
        Ok(())
    }

    pub fn can_borrow(&mut self, today: NaiveDate) -> bool {
        self.check_can_borrow(today).is_ok()
    }

    /// Record a loan. The due date is fixed from the tier duration at borrow
    /// time; later tier changes do not move it.
    pub fn borrow(
        &mut self,
        isbn: &str,
        exemplar_id: &str,
        today: NaiveDate,
    ) -> AppResult<Loan> {
        self.check_can_borrow(today)?;
        let policy = self.tier().policy();
        let due_date = today
            .checked_add_days(Days::new(policy.loan_days as u64))
            .unwrap_or(today);
        let loan = Loan {
            isbn: isbn.to_string(),
            exemplar_id: exemplar_id.to_string(),
            borrow_date: today,
            due_date,
            returned_date: None,
            penalty: Decimal::ZERO,
        };
        self.loans.push(loan.clone());
        self.monthly_borrows += 1;
        Ok(loan)
    }

    /// Close the loan at `index` and charge any late penalty. Idempotent: an
    /// already-returned loan charges nothing and stays untouched.
    pub fn return_loan(&mut self, index: usize, today: NaiveDate) -> Decimal {
        let rate = self.tier().policy().daily_penalty;
        let loan = &mut self.loans[index];
        if loan.returned_date.is_some() {
            return Decimal::ZERO;
        }
        loan.returned_date = Some(today);
        if today > loan.due_date {
            let days_late = (today - loan.due_date).num_days();
            let amount = Decimal::from(days_late) * rate;
            loan.penalty = amount;
            self.penalty_balance += amount;
            return amount;
        }
        Decimal::ZERO
    }

    /// Extend the subscription. Returns the new expiration date, or None when
    /// there is no subscription to renew.
    pub fn renew_subscription(&mut self, extra_days: u64) -> Option<NaiveDate> {
        let subscription = self.subscription.as_mut()?;
        subscription.renew(extra_days);
        Some(subscription.expiration_date)
    }

    /// Clear the penalty balance (trust based, no payment gateway). Returns
    /// the amount cleared.
    pub fn pay_penalties(&mut self) -> Decimal {
        std::mem::replace(&mut self.penalty_balance, Decimal::ZERO)
    }
}

/// Public representation of a user (no credential hash)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserView {
    pub username: String,
    pub is_admin: bool,
    pub subscription: Option<Subscription>,
    pub penalty_balance: Decimal,
    pub active_loans: usize,
    pub reservations: Vec<Reservation>,
    pub monthly_borrows: u32,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            is_admin: user.is_admin,
            subscription: user.subscription.clone(),
            penalty_balance: user.penalty_balance,
            active_loans: user.active_loan_count(),
            reservations: user.reservations.clone(),
            monthly_borrows: user.monthly_borrows,
        }
    }
}

/// Create user request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 4))]
    pub password: String,
    /// Tier label; unknown labels fall back to basic
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

/// JWT claims for authenticated requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Username
    pub sub: String,
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Administrator rights required".to_string(),
            ))
        }
    }

    /// Members may act on their own account; admins on any account.
    pub fn require_self_or_admin(&self, username: &str) -> Result<(), AppError> {
        if self.is_admin || self.sub == username {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Not allowed to act on another user's account".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn member(tier: SubscriptionTier) -> User {
        User::new("alice", "hash".into(), tier, false, date(2024, 3, 1))
    }

    #[test]
    fn test_borrow_sets_due_date_from_tier() {
        let mut u = member(SubscriptionTier::Basic);
        let loan = u.borrow("I1", "ex1", date(2024, 3, 1)).unwrap();
        assert_eq!(loan.due_date, date(2024, 3, 15));
        assert_eq!(u.monthly_borrows, 1);
    }

    #[test]
    fn test_concurrency_cap_blocks_second_borrow() {
        let mut u = member(SubscriptionTier::Basic);
        u.borrow("I1", "ex1", date(2024, 3, 1)).unwrap();
        let err = u.borrow("I2", "ex2", date(2024, 3, 2)).unwrap_err();
        assert!(matches!(err, AppError::Eligibility(ref m) if m.contains("concurrent loan limit")));
    }

    #[test]
    fn test_monthly_quota_resets_on_new_month() {
        let mut u = member(SubscriptionTier::Basic);
        u.borrow("I1", "ex1", date(2024, 3, 1)).unwrap();
        let idx = u.open_loan_index("ex1").unwrap();
        u.return_loan(idx, date(2024, 3, 5));
        // Same month: the quota still counts the returned loan
        let err = u.borrow("I2", "ex2", date(2024, 3, 10)).unwrap_err();
        assert!(matches!(err, AppError::Eligibility(ref m) if m.contains("monthly borrow quota")));
        // New month: counter resets
        assert!(u.borrow("I2", "ex2", date(2024, 4, 1)).is_ok());
        assert_eq!(u.last_reset, Some(date(2024, 4, 1)));
    }

    #[test]
    fn test_late_return_charges_whole_days() {
        let mut u = member(SubscriptionTier::Basic);
        u.borrow("I3", "ex3", date(2024, 3, 1)).unwrap();
        let idx = u.open_loan_index("ex3").unwrap();
        // Due 2024-03-15, returned 3 days late at 0.50/day
        let charged = u.return_loan(idx, date(2024, 3, 18));
        assert_eq!(charged, Decimal::new(150, 2));
        assert_eq!(u.penalty_balance, Decimal::new(150, 2));
        assert_eq!(u.loans[idx].penalty, Decimal::new(150, 2));
    }

    #[test]
    fn test_on_time_return_charges_nothing() {
        let mut u = member(SubscriptionTier::Premium);
        u.borrow("I1", "ex1", date(2024, 3, 1)).unwrap();
        let idx = u.open_loan_index("ex1").unwrap();
        assert_eq!(u.return_loan(idx, date(2024, 3, 22)), Decimal::ZERO);
        assert_eq!(u.penalty_balance, Decimal::ZERO);
    }

    #[test]
    fn test_return_is_idempotent() {
        let mut u = member(SubscriptionTier::Basic);
        u.borrow("I3", "ex3", date(2024, 3, 1)).unwrap();
        let idx = 0;
        let first = u.return_loan(idx, date(2024, 3, 18));
        let second = u.return_loan(idx, date(2024, 3, 25));
        assert_eq!(first, Decimal::new(150, 2));
        assert_eq!(second, Decimal::ZERO);
        assert_eq!(u.penalty_balance, Decimal::new(150, 2));
        assert_eq!(u.loans[idx].returned_date, Some(date(2024, 3, 18)));
    }

    #[test]
    fn test_penalty_blocks_borrowing_until_paid() {
        let mut u = member(SubscriptionTier::Basic);
        u.borrow("I3", "ex3", date(2024, 3, 1)).unwrap();
        u.return_loan(0, date(2024, 3, 18));
        let err = u.check_can_borrow(date(2024, 4, 1)).unwrap_err();
        assert!(matches!(err, AppError::Eligibility(ref m) if m.contains("penalties")));
        assert_eq!(u.pay_penalties(), Decimal::new(150, 2));
        assert!(u.can_borrow(date(2024, 4, 1)));
    }

    #[test]
    fn test_expired_subscription_blocks_and_renewal_restores() {
        let mut u = member(SubscriptionTier::Basic);
        u.subscription.as_mut().unwrap().expiration_date = date(2024, 2, 28);
        let err = u.check_can_borrow(date(2024, 3, 1)).unwrap_err();
        assert!(matches!(err, AppError::Eligibility(ref m) if m.contains("expired")));
        let new_exp = u.renew_subscription(30).unwrap();
        assert_eq!(new_exp, date(2024, 3, 29));
        assert!(u.can_borrow(date(2024, 3, 1)));
    }

    #[test]
    fn test_renew_without_subscription_is_none() {
        let mut u = member(SubscriptionTier::Basic);
        u.subscription = None;
        assert!(u.renew_subscription(30).is_none());
        assert!(!u.can_borrow(date(2024, 3, 1)));
    }
}
