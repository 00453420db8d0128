//! Lutrin Library Lending System
//!
//! A Rust lending and reservation engine for small libraries, exposing a
//! REST JSON API over an in-memory catalog with JSON snapshot persistence.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod policy;
pub mod services;
pub mod storage;
pub mod store;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
