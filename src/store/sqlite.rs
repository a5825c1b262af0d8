//! SQLite store: one table per collection.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::{RosterStore, StoreError};
use crate::models::{parse_timestamp, Collection, PlayerRecord};
use crate::roster::Roster;

/// Roster stored in the `active_players`, `banned_players` and
/// `former_players` tables.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    location: String,
}

impl SqliteStore {
    /// Open (or create) the database and its tables.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        let pool = init_database(db_path).await?;
        Ok(Self {
            pool,
            location: db_path.display().to_string(),
        })
    }

    async fn read_collection(&self, collection: Collection) -> Result<Vec<PlayerRecord>, StoreError> {
        let sql = format!(
            "SELECT player_id, name, timestamp FROM {} ORDER BY position",
            collection.table_name()
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let player_id: String = row.get("player_id");
                let raw_ts: String = row.get("timestamp");
                let timestamp = parse_timestamp(&raw_ts).ok_or_else(|| StoreError::Timestamp {
                    collection,
                    player_id: player_id.clone(),
                    value: raw_ts.clone(),
                })?;
                let name: String = row.get("name");
                Ok(PlayerRecord::new(name, player_id, timestamp))
            })
            .collect()
    }
}

#[async_trait]
impl RosterStore for SqliteStore {
    fn describe(&self) -> String {
        format!("SQLite database {}", self.location)
    }

    async fn load(&self) -> Result<Roster, StoreError> {
        let active = self.read_collection(Collection::Active).await?;
        let banned = self.read_collection(Collection::Banned).await?;
        let former = self.read_collection(Collection::Former).await?;
        Ok(Roster::from_collections(active, banned, former))
    }

    /// Replace all three tables in one transaction.
    async fn save(&self, roster: &Roster) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for collection in Collection::ALL {
            let table = collection.table_name();
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;

            let insert = format!(
                "INSERT INTO {} (player_id, name, timestamp, position) VALUES (?, ?, ?, ?)",
                table
            );
            for (position, record) in roster.collection(collection).iter().enumerate() {
                sqlx::query(&insert)
                    .bind(&record.player_id)
                    .bind(&record.name)
                    .bind(record.timestamp.to_rfc3339())
                    .bind(position as i64)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        tracing::debug!("Saved {} players to {}", roster.len(), self.location);
        Ok(())
    }
}

/// Initialize the database connection pool and run migrations.
async fn init_database(db_path: &Path) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for collection in Collection::ALL {
        let table = collection.table_name();
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                player_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                position INTEGER NOT NULL
            );
            "#
        ))
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_name ON {table}(name);"
        ))
        .execute(pool)
        .await?;
    }

    Ok(())
}
