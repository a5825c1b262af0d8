//! Form actions submitted by the UI and the reports sent back.

use serde::{Deserialize, Serialize};

use super::{Collection, PlayerView, RosterView, SyncOutcome};

/// A roster mutation requested from the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Ban,
    Restore,
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Ban => "ban",
            Action::Restore => "restore",
            Action::Remove => "remove",
        }
    }
}

/// Request body for POST /api/actions.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: Action,
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
impl ActionRequest {
    pub fn new(action: Action, player_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            action,
            player_id: player_id.into(),
            name: name.into(),
        }
    }
}

/// A record moving between collections.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionView {
    pub player: PlayerView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Collection>,
    pub to: Collection,
}

/// Result of a successful action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionReport {
    pub message: String,
    pub transition: TransitionView,
    pub roster: RosterView,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sync: Vec<SyncOutcome>,
}

/// Result of clearing a collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    pub message: String,
    pub collection: Collection,
    pub removed: usize,
    pub roster: RosterView,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sync: Vec<SyncOutcome>,
}
