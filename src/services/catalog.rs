//! Catalog management service: inventory admin and reviews

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::title::{ExemplarState, Review, StatusCounts, Title},
    store::{NewExemplar, Store},
};

/// Search filters for catalog listings
#[derive(Debug, Default)]
pub struct TitleQuery {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<Store>,
}

impl CatalogService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// List titles, optionally filtered by exact title or author
    pub async fn search(&self, query: &TitleQuery) -> Vec<Title> {
        let state = self.store.read().await;
        match (&query.title, &query.author) {
            (Some(t), _) => state.library.search_by_title(t).into_iter().cloned().collect(),
            (_, Some(a)) => state.library.search_by_author(a).into_iter().cloned().collect(),
            _ => state.library.titles.values().cloned().collect(),
        }
    }

    pub async fn get_title(&self, isbn: &str) -> AppResult<Title> {
        let state = self.store.read().await;
        state.library.title(isbn).cloned()
    }

    /// Add one exemplar, creating the title when needed. Returns the
    /// exemplar id and the updated title.
    pub async fn add_exemplar(&self, req: NewExemplar) -> AppResult<(String, Title)> {
        let mut state = self.store.write().await;
        let isbn = req.isbn.clone();
        let id = state.library.add_exemplar(req)?;
        let title = state.library.title(&isbn)?.clone();
        tracing::info!(isbn = %isbn, exemplar = %id, "Exemplar added");
        Ok((id, title))
    }

    pub async fn remove_title(&self, isbn: &str) -> AppResult<Title> {
        let mut state = self.store.write().await;
        let removed = state.library.remove_title(isbn)?;
        tracing::info!(isbn = %isbn, "Title removed");
        Ok(removed)
    }

    pub async fn set_exemplar_state(
        &self,
        exemplar_id: &str,
        state_label: &str,
    ) -> AppResult<StatusCounts> {
        let new_state: ExemplarState = state_label
            .parse()
            .map_err(AppError::Validation)?;
        let mut state = self.store.write().await;
        let isbn = state.library.set_exemplar_state(exemplar_id, new_state)?;
        state.library.status_counts(&isbn)
    }

    pub async fn status_counts(&self, isbn: &str) -> AppResult<StatusCounts> {
        let state = self.store.read().await;
        state.library.status_counts(isbn)
    }

    /// Append a member review. Rating must be 1 to 5.
    pub async fn add_review(
        &self,
        isbn: &str,
        username: &str,
        rating: u8,
        comment: String,
    ) -> AppResult<Review> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        let mut state = self.store.write().await;
        state.user(username)?;
        let review = Review {
            username: username.to_string(),
            rating,
            comment,
        };
        state.library.title_mut(isbn)?.reviews.push(review.clone());
        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::User;
    use crate::policy::SubscriptionTier;
    use crate::store::State;
    use chrono::NaiveDate;

    fn service() -> CatalogService {
        let mut state = State::new("test");
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        state.users.insert(
            "alice".to_string(),
            User::new("alice", "hash".into(), SubscriptionTier::Basic, false, today),
        );
        CatalogService::new(Arc::new(Store::new(state)))
    }

    fn new_exemplar(isbn: &str) -> NewExemplar {
        NewExemplar {
            title: format!("Title {}", isbn),
            author: "Author".to_string(),
            isbn: isbn.to_string(),
            exemplar_id: None,
            genre: None,
            digital_size: None,
        }
    }

    #[tokio::test]
    async fn test_add_and_search() {
        let svc = service();
        svc.add_exemplar(new_exemplar("I1")).await.unwrap();
        svc.add_exemplar(new_exemplar("I1")).await.unwrap();
        let title = svc.get_title("I1").await.unwrap();
        assert_eq!(title.total, 2);

        let hits = svc
            .search(&TitleQuery {
                title: Some("Title I1".to_string()),
                author: None,
            })
            .await;
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_review_rating_bounds() {
        let svc = service();
        svc.add_exemplar(new_exemplar("I1")).await.unwrap();
        let err = svc
            .add_review("I1", "alice", 6, "great".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        svc.add_review("I1", "alice", 5, "great".into()).await.unwrap();
        assert_eq!(svc.get_title("I1").await.unwrap().reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_set_state_by_label() {
        let svc = service();
        let (id, _) = svc.add_exemplar(new_exemplar("I1")).await.unwrap();
        let counts = svc.set_exemplar_state(&id, "damaged").await.unwrap();
        assert_eq!(counts.available, 0);
        assert_eq!(counts.damaged, 1);

        let err = svc.set_exemplar_state(&id, "mangled").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
