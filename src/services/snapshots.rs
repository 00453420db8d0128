//! Snapshot service: bridges the in-memory state and the persistence
//! collaborator. Saving is a coarse step taken outside lending operations,
//! never as part of one.

use std::path::PathBuf;
use std::sync::Arc;

use crate::{error::AppResult, storage::Storage, store::Store};

#[derive(Clone)]
pub struct SnapshotService {
    store: Arc<Store>,
    storage: Arc<Storage>,
}

impl SnapshotService {
    pub fn new(store: Arc<Store>, storage: Arc<Storage>) -> Self {
        Self { store, storage }
    }

    /// Write both snapshot files (each atomically, see `storage`)
    pub async fn save_all(&self) -> AppResult<()> {
        let state = self.store.read().await;
        self.storage.save(&state)
    }

    /// Export the catalog to a CSV file in the data directory
    pub async fn export_csv(&self, file_name: &str) -> AppResult<PathBuf> {
        let state = self.store.read().await;
        self.storage.export_csv(&state.library, file_name)
    }
}
