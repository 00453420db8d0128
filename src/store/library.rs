//! Library aggregate: titles keyed by ISBN plus the per-title reservation
//! queues. Insertion order is preserved for both, so catalog listings and
//! queue priority are stable across snapshot round trips.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::title::{Exemplar, ExemplarState, StatusCounts, Title};
use crate::models::user::User;

/// Request to add a copy (creating the title when it does not exist yet)
#[derive(Debug, Clone)]
pub struct NewExemplar {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub exemplar_id: Option<String>,
    pub genre: Option<String>,
    pub digital_size: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    pub titles: IndexMap<String, Title>,
    /// ISBN -> usernames in priority order, duplicates forbidden
    #[serde(default)]
    pub reservations: IndexMap<String, Vec<String>>,
}

impl Library {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            titles: IndexMap::new(),
            reservations: IndexMap::new(),
        }
    }

    pub fn title(&self, isbn: &str) -> AppResult<&Title> {
        self.titles
            .get(isbn)
            .ok_or_else(|| AppError::NotFound(format!("No title with ISBN {}", isbn)))
    }

    pub fn title_mut(&mut self, isbn: &str) -> AppResult<&mut Title> {
        self.titles
            .get_mut(isbn)
            .ok_or_else(|| AppError::NotFound(format!("No title with ISBN {}", isbn)))
    }

    // -----------------------------------------------------------------
    // Inventory
    // -----------------------------------------------------------------

    /// Add one exemplar, creating the title if absent. Returns the exemplar
    /// id (synthesized when the caller did not provide one).
    pub fn add_exemplar(&mut self, req: NewExemplar) -> AppResult<String> {
        if let Some(ref id) = req.exemplar_id {
            if self.find_exemplar(id).is_some() {
                return Err(AppError::Conflict(format!(
                    "Exemplar id '{}' already exists",
                    id
                )));
            }
        }
        let id = match req.exemplar_id {
            Some(id) => id,
            None => self.synthesize_exemplar_id(&req.isbn),
        };

        let title = self.titles.entry(req.isbn.clone()).or_insert_with(|| {
            let mut t = Title::new(&req.isbn, &req.title, &req.author);
            t.genre = req.genre.clone();
            t.digital_size = req.digital_size.clone();
            t
        });
        title.exemplars.push(Exemplar {
            id: id.clone(),
            state: ExemplarState::Available,
        });
        title.recompute_counts();
        Ok(id)
    }

    /// Delete a title with all its exemplars, unconditionally, and drop its
    /// reservation queue. No in-flight-loan check is performed.
    pub fn remove_title(&mut self, isbn: &str) -> AppResult<Title> {
        let removed = self
            .titles
            .shift_remove(isbn)
            .ok_or_else(|| AppError::NotFound(format!("No title with ISBN {}", isbn)))?;
        self.reservations.shift_remove(isbn);
        Ok(removed)
    }

    /// Transition a single exemplar; `available` is recomputed, never
    /// adjusted in place. Returns the owning ISBN.
    pub fn set_exemplar_state(
        &mut self,
        exemplar_id: &str,
        state: ExemplarState,
    ) -> AppResult<String> {
        for (isbn, title) in self.titles.iter_mut() {
            if let Some(exemplar) = title.exemplar_mut(exemplar_id) {
                exemplar.state = state;
                title.recompute_counts();
                return Ok(isbn.clone());
            }
        }
        Err(AppError::NotFound(format!(
            "No exemplar with id {}",
            exemplar_id
        )))
    }

    pub fn status_counts(&self, isbn: &str) -> AppResult<StatusCounts> {
        Ok(self.title(isbn)?.status_counts())
    }

    pub fn find_exemplar(&self, exemplar_id: &str) -> Option<(&Title, &Exemplar)> {
        self.titles.values().find_map(|t| {
            t.exemplar(exemplar_id).map(|e| (t, e))
        })
    }

    /// Exemplar ids are unique across the whole library, so synthesized ids
    /// are checked against every title, not just the target one.
    fn synthesize_exemplar_id(&self, isbn: &str) -> String {
        let mut n = self
            .titles
            .get(isbn)
            .map(|t| t.exemplars.len() + 1)
            .unwrap_or(1);
        loop {
            let candidate = format!("{}-ex{}", isbn, n);
            if self.find_exemplar(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn search_by_title(&self, needle: &str) -> Vec<&Title> {
        self.titles
            .values()
            .filter(|t| t.title.eq_ignore_ascii_case(needle))
            .collect()
    }

    pub fn search_by_author(&self, needle: &str) -> Vec<&Title> {
        self.titles
            .values()
            .filter(|t| t.author.eq_ignore_ascii_case(needle))
            .collect()
    }

    // -----------------------------------------------------------------
    // Reservation queue
    // -----------------------------------------------------------------

    /// Append a hold for `username`. Reserving while copies are still
    /// available is allowed: a hold claims the next vacancy, it is not a
    /// blocking precondition. Returns false when the user is already queued.
    pub fn reserve(&mut self, isbn: &str, username: &str) -> AppResult<bool> {
        self.title(isbn)?;
        let queue = self.reservations.entry(isbn.to_string()).or_default();
        if queue.iter().any(|u| u == username) {
            return Ok(false);
        }
        queue.push(username.to_string());
        Ok(true)
    }

    /// Remove a hold; returns whether one was removed. Empty queues are
    /// dropped so they never persist as stale entries.
    pub fn cancel(&mut self, isbn: &str, username: &str) -> bool {
        let Some(queue) = self.reservations.get_mut(isbn) else {
            return false;
        };
        let before = queue.len();
        queue.retain(|u| u != username);
        let removed = queue.len() != before;
        if queue.is_empty() {
            self.reservations.shift_remove(isbn);
        }
        removed
    }

    pub fn peek_head(&self, isbn: &str) -> Option<&str> {
        self.reservations
            .get(isbn)
            .and_then(|q| q.first())
            .map(String::as_str)
    }

    /// Pop the queue head if it is `username`.
    pub fn pop_head_if(&mut self, isbn: &str, username: &str) {
        if self.peek_head(isbn) == Some(username) {
            self.cancel(isbn, username);
        }
    }

    /// Heal divergence between the title-side queues and the user-side
    /// reservation mirrors. Run once at load time: drops queue entries for
    /// usernames absent from the user set, then re-adds reservations listed
    /// on a user record but missing from the queue.
    pub fn reconcile<'a>(&mut self, users: impl Iterator<Item = &'a User> + Clone) {
        let valid: Vec<&str> = users.clone().map(|u| u.username.as_str()).collect();
        for queue in self.reservations.values_mut() {
            queue.retain(|name| valid.contains(&name.as_str()));
        }
        self.reservations.retain(|_, queue| !queue.is_empty());

        for user in users {
            for reservation in &user.reservations {
                if !self.titles.contains_key(&reservation.isbn) {
                    continue;
                }
                let queue = self
                    .reservations
                    .entry(reservation.isbn.clone())
                    .or_default();
                if !queue.iter().any(|u| u == &user.username) {
                    queue.push(user.username.clone());
                }
            }
        }
    }
}
