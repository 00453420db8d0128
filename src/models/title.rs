//! Title (catalog entry) model and related types.
//!
//! A title either carries per-exemplar records (each copy individually
//! trackable) or is aggregate-only, in which case `total`/`available` are the
//! only copy bookkeeping. Digital titles are the same struct with
//! `digital_size` set; there is no class hierarchy behind this, just
//! nullable-field flattening.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Exemplar lifecycle state.
///
/// Available ⇄ Borrowed happens through borrow/return; Damaged and Lost are
/// admin transitions that do not reverse automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExemplarState {
    Available,
    Borrowed,
    Damaged,
    Lost,
}

impl std::str::FromStr for ExemplarState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "available" => Ok(ExemplarState::Available),
            "borrowed" => Ok(ExemplarState::Borrowed),
            "damaged" => Ok(ExemplarState::Damaged),
            "lost" => Ok(ExemplarState::Lost),
            other => Err(format!("unknown exemplar state '{}'", other)),
        }
    }
}

impl std::fmt::Display for ExemplarState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ExemplarState::Available => "available",
            ExemplarState::Borrowed => "borrowed",
            ExemplarState::Damaged => "damaged",
            ExemplarState::Lost => "lost",
        };
        write!(f, "{}", label)
    }
}

/// One physical (or logical) copy of a title
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Exemplar {
    /// Identifier, unique across the whole library
    pub id: String,
    pub state: ExemplarState,
}

/// Member review attached to a title
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub username: String,
    /// 1 to 5
    pub rating: u8,
    pub comment: String,
}

/// Flattened record of a past or current loan, kept on the title for
/// popularity statistics
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    pub username: String,
    pub isbn: String,
    pub exemplar_id: String,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// Catalog entry keyed by ISBN
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Title {
    pub isbn: String,
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// Set for digital titles (e.g. "2MB"); absent for physical ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digital_size: Option<String>,
    #[serde(default)]
    pub exemplars: Vec<Exemplar>,
    /// Derived: exemplar count, or the aggregate copy count when no
    /// per-exemplar records exist
    pub total: u32,
    /// Derived: count of exemplars in state Available. Never set directly,
    /// only recomputed (aggregate-only titles stay within 0..=total).
    pub available: u32,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Per-state copy counts for a title
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub total: u32,
    pub available: u32,
    pub borrowed: u32,
    pub damaged: u32,
    pub lost: u32,
}

impl Title {
    pub fn new(isbn: &str, title: &str, author: &str) -> Self {
        Self {
            isbn: isbn.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            genre: None,
            digital_size: None,
            exemplars: Vec::new(),
            total: 0,
            available: 0,
            reviews: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn is_digital(&self) -> bool {
        self.digital_size.is_some()
    }

    /// True when this title tracks individual copies
    pub fn has_exemplar_records(&self) -> bool {
        !self.exemplars.is_empty()
    }

    /// Restore the derived counts from the exemplar list. Aggregate-only
    /// titles are clamped into 0..=total instead.
    pub fn recompute_counts(&mut self) {
        if self.has_exemplar_records() {
            self.total = self.exemplars.len() as u32;
            self.available = self
                .exemplars
                .iter()
                .filter(|e| e.state == ExemplarState::Available)
                .count() as u32;
        } else {
            self.available = self.available.min(self.total);
        }
        debug_assert!(self.available <= self.total, "available exceeds total");
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts {
            total: self.total,
            ..StatusCounts::default()
        };
        if self.has_exemplar_records() {
            for ex in &self.exemplars {
                match ex.state {
                    ExemplarState::Available => counts.available += 1,
                    ExemplarState::Borrowed => counts.borrowed += 1,
                    ExemplarState::Damaged => counts.damaged += 1,
                    ExemplarState::Lost => counts.lost += 1,
                }
            }
        } else {
            counts.available = self.available;
            counts.borrowed = self.total - self.available;
        }
        counts
    }

    pub fn exemplar(&self, exemplar_id: &str) -> Option<&Exemplar> {
        self.exemplars.iter().find(|e| e.id == exemplar_id)
    }

    pub fn exemplar_mut(&mut self, exemplar_id: &str) -> Option<&mut Exemplar> {
        self.exemplars.iter_mut().find(|e| e.id == exemplar_id)
    }
}
