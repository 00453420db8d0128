//! Lending engine: orchestrates borrow/return/reserve/cancel across the
//! inventory, the reservation queues and the per-user loan ledger.
//!
//! Every operation takes the store's write lock once and does its whole
//! read-then-write span under it, restoring the `available == count of
//! Available exemplars` invariant before the guard drops.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::title::{ExemplarState, HistoryEntry, Title},
    models::user::{Loan, Reservation},
    store::Store,
};

/// Outcome of a return: the closed loan and what it cost
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnReceipt {
    pub loan: Loan,
    pub penalty_charged: Decimal,
}

#[derive(Clone)]
pub struct LendingService {
    store: Arc<Store>,
}

impl LendingService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Borrow one copy of a title.
    ///
    /// Queue priority comes first: while the title's reservation queue is
    /// non-empty, only its head may borrow, regardless of availability.
    /// The exemplar is flipped to Borrowed before the ledger runs and rolled
    /// back to Available if the ledger refuses.
    pub async fn borrow_title(
        &self,
        isbn: &str,
        username: &str,
        today: NaiveDate,
    ) -> AppResult<Loan> {
        let mut guard = self.store.write().await;
        let state = &mut *guard;

        state.library.title(isbn)?;
        state.user(username)?;

        if let Some(head) = state.library.peek_head(isbn) {
            if head != username {
                return Err(AppError::Eligibility(format!(
                    "Title {} is reserved; another member holds priority",
                    isbn
                )));
            }
        }

        // Select a copy: a real exemplar record when the title tracks them,
        // a synthesized id for aggregate-only titles.
        let exemplar_id = {
            let title = state.library.title_mut(isbn)?;
            if title.has_exemplar_records() {
                let Some(exemplar) = title
                    .exemplars
                    .iter_mut()
                    .find(|e| e.state == ExemplarState::Available)
                else {
                    return Err(AppError::Eligibility(format!(
                        "No copies of {} currently available",
                        isbn
                    )));
                };
                exemplar.state = ExemplarState::Borrowed;
                let id = exemplar.id.clone();
                title.recompute_counts();
                id
            } else {
                if title.available == 0 {
                    return Err(AppError::Eligibility(format!(
                        "No copies of {} currently available",
                        isbn
                    )));
                }
                title.available -= 1;
                format!("{}-agg{}", isbn, title.history.len() + 1)
            }
        };

        let ledger_result = state.user_mut(username)?.borrow(isbn, &exemplar_id, today);
        let loan = match ledger_result {
            Ok(loan) => loan,
            Err(refusal) => {
                // Roll the copy back before propagating the refusal
                let title = state.library.title_mut(isbn)?;
                if let Some(exemplar) = title.exemplar_mut(&exemplar_id) {
                    exemplar.state = ExemplarState::Available;
                } else {
                    title.available += 1;
                }
                title.recompute_counts();
                return Err(refusal);
            }
        };

        let title = state.library.title_mut(isbn)?;
        title.history.push(HistoryEntry {
            username: username.to_string(),
            isbn: isbn.to_string(),
            exemplar_id: exemplar_id.clone(),
            borrow_date: loan.borrow_date,
            due_date: loan.due_date,
        });

        state.library.pop_head_if(isbn, username);
        state
            .user_mut(username)?
            .reservations
            .retain(|r| r.isbn != isbn);

        tracing::info!(isbn = %isbn, user = %username, exemplar = %exemplar_id, "Borrowed");
        Ok(loan)
    }

    /// Return a borrowed copy.
    ///
    /// Locates the member's open loan by exemplar id, charges any late
    /// penalty, and puts the copy back in circulation unless its state
    /// diverged to Damaged or Lost in the meantime. When other members are
    /// queued, the new head gets a notification delivered at next login.
    pub async fn return_exemplar(
        &self,
        exemplar_id: &str,
        username: &str,
        today: NaiveDate,
    ) -> AppResult<ReturnReceipt> {
        let mut guard = self.store.write().await;
        let state = &mut *guard;

        let user = state.user_mut(username)?;
        let index = user.open_loan_index(exemplar_id).ok_or_else(|| {
            AppError::State(format!(
                "No active loan for exemplar {} by {}",
                exemplar_id, username
            ))
        })?;
        let penalty_charged = user.return_loan(index, today);
        let loan = user.loans[index].clone();

        // The title may have been deleted while the loan was out; the
        // return still closes cleanly, there is just no inventory to update.
        let notify = match state.library.title_mut(&loan.isbn) {
            Ok(title) => {
                if let Some(exemplar) = title.exemplar_mut(exemplar_id) {
                    if exemplar.state == ExemplarState::Borrowed {
                        exemplar.state = ExemplarState::Available;
                    }
                } else {
                    title.available += 1;
                }
                title.recompute_counts();
                Some(title.title.clone())
            }
            Err(_) => None,
        };

        if let Some(title_name) = notify {
            if let Some(head) = state.library.peek_head(&loan.isbn).map(str::to_string) {
                let message = format!(
                    "A copy of '{}' ({}) is now available for you",
                    title_name, loan.isbn
                );
                if let Ok(head_user) = state.user_mut(&head) {
                    head_user.notifications.push(message);
                }
            }
        }

        tracing::info!(
            isbn = %loan.isbn,
            user = %username,
            exemplar = %exemplar_id,
            penalty = %penalty_charged,
            "Returned"
        );
        Ok(ReturnReceipt {
            loan,
            penalty_charged,
        })
    }

    /// Place a hold. Allowed while copies are available: the hold claims
    /// the next vacancy. A duplicate hold by the same member is a conflict.
    pub async fn reserve(
        &self,
        isbn: &str,
        username: &str,
        today: NaiveDate,
    ) -> AppResult<Reservation> {
        let mut guard = self.store.write().await;
        let state = &mut *guard;

        state.user(username)?;
        let added = state.library.reserve(isbn, username)?;
        if !added {
            return Err(AppError::Conflict(format!(
                "{} already reserved {}",
                username, isbn
            )));
        }
        let reservation = Reservation {
            isbn: isbn.to_string(),
            exemplar_id: None,
            reserved_on: today,
        };
        state.user_mut(username)?.reservations.push(reservation.clone());
        Ok(reservation)
    }

    /// Drop a hold from both the title-side queue and the user-side mirror.
    pub async fn cancel_reservation(&self, isbn: &str, username: &str) -> AppResult<()> {
        let mut guard = self.store.write().await;
        let state = &mut *guard;

        let removed_from_queue = state.library.cancel(isbn, username);
        let user = state.user_mut(username)?;
        let before = user.reservations.len();
        user.reservations.retain(|r| r.isbn != isbn);
        let removed_mirror = user.reservations.len() != before;

        if removed_from_queue || removed_mirror {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "No reservation on {} by {}",
                isbn, username
            )))
        }
    }

    /// Suggest titles from the member's most-read genres: genres ranked by
    /// frequency across the whole loan history, titles the member has not
    /// borrowed yet, unavailable ones skipped. A member with no history gets
    /// arbitrary available titles instead.
    pub async fn recommend_for_user(
        &self,
        username: &str,
        limit: usize,
    ) -> AppResult<Vec<Title>> {
        let state = self.store.read().await;
        let user = state.user(username)?;

        let mut genre_freq: IndexMap<String, usize> = IndexMap::new();
        for loan in &user.loans {
            if let Some(genre) = state
                .library
                .titles
                .get(&loan.isbn)
                .and_then(|t| t.genre.as_ref())
            {
                *genre_freq.entry(genre.clone()).or_default() += 1;
            }
        }

        if genre_freq.is_empty() {
            return Ok(state
                .library
                .titles
                .values()
                .filter(|t| t.available > 0)
                .take(limit)
                .cloned()
                .collect());
        }

        let borrowed: HashSet<&str> = user.loans.iter().map(|l| l.isbn.as_str()).collect();
        let mut ranked: Vec<(String, usize)> = genre_freq.into_iter().collect();
        // Stable sort keeps first-seen order between equally frequent genres
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let mut picks = Vec::new();
        for (genre, _) in &ranked {
            for title in state.library.titles.values() {
                if picks.len() >= limit {
                    return Ok(picks);
                }
                if title.genre.as_ref() == Some(genre)
                    && !borrowed.contains(title.isbn.as_str())
                    && title.available > 0
                {
                    picks.push(title.clone());
                }
            }
        }
        Ok(picks)
    }
}
