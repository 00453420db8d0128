//! Snapshot persistence collaborator.
//!
//! The engine never reasons about encoding: it hands fully-typed snapshots
//! to this module and gets fully-decoded ones back. Writes are atomic per
//! file (serialize to a `.tmp` sibling, then rename into place). The
//! combined save is two independent atomic replaces; a crash between them
//! can leave the two files from different snapshots. There is no recovery
//! path for that window — `reconcile` at load heals the reservation mirrors,
//! nothing more.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::StorageConfig;
use crate::error::AppResult;
use crate::store::{Library, State};

/// Users snapshot document
#[derive(Debug, Serialize, Deserialize)]
struct UsersSnapshot {
    users: Vec<crate::models::User>,
}

/// CSV export row: one flat line per title
#[derive(Debug, Serialize)]
struct CatalogRow<'a> {
    kind: &'a str,
    title: &'a str,
    author: &'a str,
    isbn: &'a str,
    genre: &'a str,
    digital_size: &'a str,
    total: u32,
    available: u32,
}

#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
    library_path: PathBuf,
    users_path: PathBuf,
}

impl Storage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            library_path: config.library_path(),
            users_path: config.users_path(),
        }
    }

    /// Load both snapshots. Returns None when neither file exists yet (first
    /// run); a malformed or unreadable file is an error, not an empty state.
    pub fn load(&self) -> AppResult<Option<State>> {
        let library_exists = self.library_path.exists();
        let users_exists = self.users_path.exists();
        if !library_exists && !users_exists {
            return Ok(None);
        }

        let library: Library = if library_exists {
            serde_json::from_slice(&fs::read(&self.library_path)?)?
        } else {
            Library::new("lutrin")
        };

        let users = if users_exists {
            let snapshot: UsersSnapshot = serde_json::from_slice(&fs::read(&self.users_path)?)?;
            snapshot
                .users
                .into_iter()
                .map(|u| (u.username.clone(), u))
                .collect()
        } else {
            Default::default()
        };

        Ok(Some(State { library, users }))
    }

    /// Write both snapshots, each with its own atomic replace. Best effort:
    /// not a transaction across the two files.
    pub fn save(&self, state: &State) -> AppResult<()> {
        fs::create_dir_all(&self.data_dir)?;

        let library_json = serde_json::to_vec_pretty(&state.library)?;
        write_atomic(&self.library_path, &library_json)?;

        let snapshot = UsersSnapshot {
            users: state.users.values().cloned().collect(),
        };
        let users_json = serde_json::to_vec_pretty(&snapshot)?;
        write_atomic(&self.users_path, &users_json)?;

        tracing::debug!(
            library = %self.library_path.display(),
            users = %self.users_path.display(),
            "Snapshots written"
        );
        Ok(())
    }

    /// Export the catalog as one flat CSV row per title. Returns the path
    /// written.
    pub fn export_csv(&self, library: &Library, file_name: &str) -> AppResult<PathBuf> {
        fs::create_dir_all(&self.data_dir)?;
        let path = self.data_dir.join(file_name);
        let mut writer = csv::Writer::from_path(&path)?;
        for title in library.titles.values() {
            writer.serialize(CatalogRow {
                kind: if title.is_digital() { "digital" } else { "print" },
                title: &title.title,
                author: &title.author,
                isbn: &title.isbn,
                genre: title.genre.as_deref().unwrap_or(""),
                digital_size: title.digital_size.as_deref().unwrap_or(""),
                total: title.total,
                available: title.available,
            })?;
        }
        writer.flush()?;
        Ok(path)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::models::user::User;
    use crate::policy::SubscriptionTier;
    use crate::store::NewExemplar;
    use chrono::NaiveDate;

    fn storage_in(dir: &Path) -> Storage {
        Storage::new(&StorageConfig {
            data_dir: dir.to_path_buf(),
            library_file: "library.json".to_string(),
            users_file: "users.json".to_string(),
        })
    }

    fn sample_state() -> State {
        let mut state = State::new("test");
        state
            .library
            .add_exemplar(NewExemplar {
                title: "1984".to_string(),
                author: "George Orwell".to_string(),
                isbn: "I1".to_string(),
                exemplar_id: Some("ex1".to_string()),
                genre: Some("dystopia".to_string()),
                digital_size: None,
            })
            .unwrap();
        state.library.reserve("I1", "alice").unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let alice = User::new("alice", "hash".into(), SubscriptionTier::Premium, false, today);
        state.users.insert("alice".to_string(), alice);
        state
    }

    #[test]
    fn test_missing_files_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());
        let state = sample_state();
        storage.save(&state).unwrap();

        let reloaded = storage.load().unwrap().expect("state should exist");
        assert_eq!(reloaded.library.titles.len(), 1);
        assert_eq!(reloaded.library.peek_head("I1"), Some("alice"));
        let alice = reloaded.user("alice").unwrap();
        assert_eq!(alice.tier(), SubscriptionTier::Premium);
        // No stray temp files left behind
        assert!(!dir.path().join("library.tmp").exists());
    }

    #[test]
    fn test_malformed_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());
        fs::write(dir.path().join("library.json"), b"{ not json").unwrap();
        assert!(storage.load().is_err());
    }

    #[test]
    fn test_csv_export_shape() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());
        let state = sample_state();
        let path = storage.export_csv(&state.library, "catalog.csv").unwrap();
        let contents = fs::read_to_string(path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "kind,title,author,isbn,genre,digital_size,total,available"
        );
        assert_eq!(lines.next().unwrap(), "print,1984,George Orwell,I1,dystopia,,1,1");
    }
}
