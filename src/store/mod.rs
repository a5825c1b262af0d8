//! Roster persistence.
//!
//! A store reads all three collections at startup and writes all three back
//! in full after every mutation.

mod csv_file;
#[cfg(test)]
mod memory;
mod sqlite;

pub use csv_file::{encode_collection, CsvStore};
#[cfg(test)]
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StorageBackend;
use crate::models::Collection;
use crate::roster::Roster;

/// Errors raised while reading or writing the roster.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV error in {file}: {source}")]
    Csv { file: String, source: csv::Error },

    #[error("Invalid timestamp '{value}' for player {player_id} in {collection} list")]
    Timestamp {
        collection: Collection,
        player_id: String,
        value: String,
    },
}

/// Load/save contract for the three collections.
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// Short human-readable location, used in logs.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<Roster, StoreError>;

    async fn save(&self, roster: &Roster) -> Result<(), StoreError>;
}

/// Open the configured backend.
pub async fn open_store(backend: &StorageBackend) -> Result<Arc<dyn RosterStore>, StoreError> {
    let store: Arc<dyn RosterStore> = match backend {
        StorageBackend::Csv { data_dir } => Arc::new(CsvStore::new(data_dir.clone())),
        StorageBackend::Sqlite { db_path } => Arc::new(SqliteStore::open(db_path).await?),
    };
    tracing::info!("Roster storage: {}", store.describe());
    Ok(store)
}
