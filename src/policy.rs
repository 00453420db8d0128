//! Subscription tiers and the static lending policy table.
//!
//! The table is pure data: a tier maps to a concurrent-loan cap, a loan
//! duration and a daily late-return penalty rate. The monthly borrow quota
//! reuses the concurrent-loan cap.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Subscription tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Basic,
    Premium,
    Vip,
}

impl SubscriptionTier {
    /// Parse a tier label, falling back to Basic for anything unknown.
    pub fn parse_or_basic(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "premium" => SubscriptionTier::Premium,
            "vip" => SubscriptionTier::Vip,
            _ => SubscriptionTier::Basic,
        }
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SubscriptionTier::Basic => "basic",
            SubscriptionTier::Premium => "premium",
            SubscriptionTier::Vip => "vip",
        };
        write!(f, "{}", label)
    }
}

/// Lending limits attached to a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    /// Max concurrent open loans; also the monthly borrow quota
    pub max_loans: u32,
    /// Loan duration in days
    pub loan_days: i64,
    /// Penalty charged per whole day late
    pub daily_penalty: Decimal,
}

impl SubscriptionTier {
    pub fn policy(self) -> TierPolicy {
        match self {
            SubscriptionTier::Basic => TierPolicy {
                max_loans: 1,
                loan_days: 14,
                daily_penalty: Decimal::new(50, 2),
            },
            SubscriptionTier::Premium => TierPolicy {
                max_loans: 3,
                loan_days: 21,
                daily_penalty: Decimal::new(50, 2),
            },
            SubscriptionTier::Vip => TierPolicy {
                max_loans: 10,
                loan_days: 28,
                daily_penalty: Decimal::new(30, 2),
            },
        }
    }
}
