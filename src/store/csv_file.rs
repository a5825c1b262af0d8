//! Flat-file store: one CSV file per collection.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};

use super::{RosterStore, StoreError};
use crate::models::{format_storage_timestamp, parse_timestamp, Collection, PlayerRecord};
use crate::roster::Roster;

/// Roster stored as `active_players.csv`, `banned_players.csv` and
/// `former_players.csv` inside a data directory.
#[derive(Debug, Clone)]
pub struct CsvStore {
    data_dir: PathBuf,
}

impl CsvStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn path(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.file_name())
    }

    async fn read_collection(&self, collection: Collection) -> Result<Vec<PlayerRecord>, StoreError> {
        let path = self.path(collection);
        match tokio::fs::read(&path).await {
            Ok(bytes) => decode_collection(collection, &bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn tmp_path(&self, collection: Collection) -> PathBuf {
        self.path(collection).with_extension("csv.tmp")
    }

    /// Write every collection to its `.tmp` file. On failure the staged
    /// files are removed and the live files are left as they were.
    async fn stage(&self, roster: &Roster) -> Result<(), StoreError> {
        let mut staged: Vec<PathBuf> = Vec::new();
        for collection in Collection::ALL {
            let result = match encode_collection(collection, roster.collection(collection)) {
                Ok(bytes) => {
                    let tmp = self.tmp_path(collection);
                    tokio::fs::write(&tmp, &bytes)
                        .await
                        .map_err(|e| io_error(&tmp, e))
                }
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                for tmp in staged {
                    if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                        tracing::warn!("Could not remove {}: {}", tmp.display(), cleanup);
                    }
                }
                return Err(e);
            }
            staged.push(self.tmp_path(collection));
        }
        Ok(())
    }
}

#[async_trait]
impl RosterStore for CsvStore {
    fn describe(&self) -> String {
        format!("CSV files in {}", self.data_dir.display())
    }

    async fn load(&self) -> Result<Roster, StoreError> {
        let active = self.read_collection(Collection::Active).await?;
        let banned = self.read_collection(Collection::Banned).await?;
        let former = self.read_collection(Collection::Former).await?;
        Ok(Roster::from_collections(active, banned, former))
    }

    async fn save(&self, roster: &Roster) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| io_error(&self.data_dir, e))?;

        self.stage(roster).await?;
        for collection in Collection::ALL {
            let path = self.path(collection);
            tokio::fs::rename(self.tmp_path(collection), &path)
                .await
                .map_err(|e| io_error(&path, e))?;
        }

        tracing::debug!("Saved {} players to {}", roster.len(), self.data_dir.display());
        Ok(())
    }
}

/// Serialize one collection as CSV with a `Name,ID,<timestamp label>` header.
pub fn encode_collection(collection: Collection, records: &[PlayerRecord]) -> Result<Vec<u8>, StoreError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer
        .write_record(["Name", "ID", collection.timestamp_label()])
        .map_err(|e| csv_error(collection, e))?;
    for record in records {
        writer
            .write_record([
                record.name.as_str(),
                record.player_id.as_str(),
                format_storage_timestamp(&record.timestamp).as_str(),
            ])
            .map_err(|e| csv_error(collection, e))?;
    }

    writer
        .into_inner()
        .map_err(|e| csv_error(collection, e.into_error().into()))
}

/// Parse one collection. Empty input yields an empty collection.
pub fn decode_collection(collection: Collection, bytes: &[u8]) -> Result<Vec<PlayerRecord>, StoreError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| csv_error(collection, e))?
        .clone();
    let name_col = column(&headers, &["name", "player name"], 0);
    let id_col = column(&headers, &["id", "player id", "player_id"], 1);
    let ts_label = collection.timestamp_label().to_lowercase();
    let ts_col = column(&headers, &[ts_label.as_str(), "timestamp", "date"], 2);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| csv_error(collection, e))?;
        if row.iter().all(str::is_empty) {
            continue;
        }

        let player_id = row.get(id_col).unwrap_or_default().to_string();
        let raw_ts = row.get(ts_col).unwrap_or_default();
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| StoreError::Timestamp {
            collection,
            player_id: player_id.clone(),
            value: raw_ts.to_string(),
        })?;

        records.push(PlayerRecord::new(
            row.get(name_col).unwrap_or_default(),
            player_id,
            timestamp,
        ));
    }

    Ok(records)
}

/// Index of the first header matching one of `names`, else `fallback`.
fn column(headers: &StringRecord, names: &[&str], fallback: usize) -> usize {
    headers
        .iter()
        .position(|h| names.contains(&h.to_lowercase().as_str()))
        .unwrap_or(fallback)
}

fn csv_error(collection: Collection, source: csv::Error) -> StoreError {
    StoreError::Csv {
        file: collection.file_name().to_string(),
        source,
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}
