//! Read-only views rendered by the UI.

use serde::{Deserialize, Serialize};

use super::{format_display_timestamp, Collection, PlayerRecord};

/// A player as shown in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub name: String,
    pub player_id: String,
    pub timestamp: String,
    pub display_timestamp: String,
}

impl From<&PlayerRecord> for PlayerView {
    fn from(record: &PlayerRecord) -> Self {
        Self {
            name: record.name.clone(),
            player_id: record.player_id.clone(),
            timestamp: record.timestamp.to_rfc3339(),
            display_timestamp: format_display_timestamp(&record.timestamp),
        }
    }
}

/// All three collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterView {
    pub active: Vec<PlayerView>,
    pub banned: Vec<PlayerView>,
    pub former: Vec<PlayerView>,
}

/// A single collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView {
    pub collection: Collection,
    pub players: Vec<PlayerView>,
}

/// A player together with the collection holding it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLocation {
    pub collection: Collection,
    pub player: PlayerView,
}

/// Outcome of pushing one file to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub file_name: String,
    pub success: bool,
    /// True when the remote file did not exist before.
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncOutcome {
    pub fn uploaded(file_name: &str, created: bool) -> Self {
        Self {
            file_name: file_name.to_string(),
            success: true,
            created,
            error: None,
        }
    }

    pub fn failed(file_name: &str, error: impl Into<String>) -> Self {
        Self {
            file_name: file_name.to_string(),
            success: false,
            created: false,
            error: Some(error.into()),
        }
    }
}
