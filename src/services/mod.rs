//! Business logic services

pub mod catalog;
pub mod lending;
pub mod snapshots;
pub mod stats;
pub mod users;

use std::sync::Arc;

use crate::{config::AuthConfig, storage::Storage, store::Store};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub lending: lending::LendingService,
    pub users: users::UsersService,
    pub stats: stats::StatsService,
    pub snapshots: snapshots::SnapshotService,
}

impl Services {
    /// Create all services over the shared store
    pub fn new(store: Arc<Store>, storage: Arc<Storage>, auth_config: AuthConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(store.clone()),
            lending: lending::LendingService::new(store.clone()),
            users: users::UsersService::new(store.clone(), auth_config),
            stats: stats::StatsService::new(store.clone()),
            snapshots: snapshots::SnapshotService::new(store, storage),
        }
    }
}
