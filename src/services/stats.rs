//! Library statistics service

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::store::Store;

/// Per-title figures: popularity from the flattened loan history plus
/// current copy counts
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TitleStats {
    pub isbn: String,
    pub title: String,
    /// Total historical borrow count
    pub borrow_count: usize,
    pub total: u32,
    pub available: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Most borrowed first
    pub titles: Vec<TitleStats>,
    /// Users with at least one open loan
    pub active_borrowers: usize,
    /// Open loans past their due date
    pub overdue_loans: usize,
}

#[derive(Clone)]
pub struct StatsService {
    store: Arc<Store>,
}

impl StatsService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn compute_stats(&self, today: NaiveDate) -> StatsResponse {
        let state = self.store.read().await;

        let mut titles: Vec<TitleStats> = state
            .library
            .titles
            .values()
            .map(|t| TitleStats {
                isbn: t.isbn.clone(),
                title: t.title.clone(),
                borrow_count: t.history.len(),
                total: t.total,
                available: t.available,
            })
            .collect();
        titles.sort_by(|a, b| b.borrow_count.cmp(&a.borrow_count));

        let active_borrowers = state
            .users
            .values()
            .filter(|u| u.active_loan_count() > 0)
            .count();
        let overdue_loans = state
            .users
            .values()
            .flat_map(|u| u.loans.iter())
            .filter(|l| l.is_overdue(today))
            .count();

        StatsResponse {
            titles,
            active_borrowers,
            overdue_loans,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::User;
    use crate::policy::SubscriptionTier;
    use crate::services::lending::LendingService;
    use crate::store::{NewExemplar, State, Store};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_popularity_active_and_overdue() {
        let store = Arc::new(Store::new(State::new("test")));
        let lending = LendingService::new(store.clone());
        let stats = StatsService::new(store.clone());
        let start = date(2024, 3, 1);

        {
            let mut state = store.write().await;
            for isbn in ["I1", "I2"] {
                for _ in 0..2 {
                    state
                        .library
                        .add_exemplar(NewExemplar {
                            title: format!("Title {}", isbn),
                            author: "A".to_string(),
                            isbn: isbn.to_string(),
                            exemplar_id: None,
                            genre: None,
                            digital_size: None,
                        })
                        .unwrap();
                }
            }
            for name in ["alice", "bob"] {
                let user = User::new(name, "h".into(), SubscriptionTier::Vip, false, start);
                state.users.insert(name.to_string(), user);
            }
        }

        // I2 borrowed twice, I1 once; alice keeps hers past the due date
        let l1 = lending.borrow_title("I2", "alice", start).await.unwrap();
        lending
            .return_exemplar(&l1.exemplar_id, "alice", date(2024, 3, 2))
            .await
            .unwrap();
        lending.borrow_title("I2", "bob", start).await.unwrap();
        lending.borrow_title("I1", "alice", start).await.unwrap();

        // VIP loans run 28 days; 2024-05-01 is past both due dates
        let report = stats.compute_stats(date(2024, 5, 1)).await;
        assert_eq!(report.titles[0].isbn, "I2");
        assert_eq!(report.titles[0].borrow_count, 2);
        assert_eq!(report.titles[1].borrow_count, 1);
        assert_eq!(report.active_borrowers, 2);
        assert_eq!(report.overdue_loans, 2);
    }
}
