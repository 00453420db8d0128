//! In-memory state shared by all services.
//!
//! One snapshot per run: the whole state sits behind a single RwLock and
//! every orchestrator operation holds the write guard for its full
//! read-then-write span. Borrow, return and reserve all read aggregate
//! counts and queue heads before mutating them, so interleaving two of them
//! on the same title could double-allocate the last copy; a global lock is
//! the unit of serialization at this scale.

pub mod library;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{AppError, AppResult};
use crate::models::user::User;
pub use library::{Library, NewExemplar};

/// Everything the server knows, as one snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub library: Library,
    pub users: IndexMap<String, User>,
}

impl State {
    pub fn new(library_name: &str) -> Self {
        Self {
            library: Library::new(library_name),
            users: IndexMap::new(),
        }
    }

    pub fn user(&self, username: &str) -> AppResult<&User> {
        self.users
            .get(username)
            .ok_or_else(|| AppError::NotFound(format!("No user named {}", username)))
    }

    pub fn user_mut(&mut self, username: &str) -> AppResult<&mut User> {
        self.users
            .get_mut(username)
            .ok_or_else(|| AppError::NotFound(format!("No user named {}", username)))
    }
}

/// Shared handle to the state
#[derive(Debug)]
pub struct Store {
    state: RwLock<State>,
}

impl Store {
    pub fn new(state: State) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().await
    }
}
