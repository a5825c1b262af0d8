//! Player record and the collections that can hold it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout used in the flat files.
pub const STORAGE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Timestamp layout shown to people.
pub const DISPLAY_TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Naive layouts accepted when reading older files, tried in order.
const LEGACY_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    DISPLAY_TIMESTAMP_FORMAT,
];

/// One of the three named player lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Active,
    Banned,
    Former,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Active, Collection::Banned, Collection::Former];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Active => "active",
            Collection::Banned => "banned",
            Collection::Former => "former",
        }
    }

    /// File name used by the CSV store and the remote sync.
    pub fn file_name(&self) -> &'static str {
        match self {
            Collection::Active => "active_players.csv",
            Collection::Banned => "banned_players.csv",
            Collection::Former => "former_players.csv",
        }
    }

    /// Table name used by the SQLite store.
    pub fn table_name(&self) -> &'static str {
        match self {
            Collection::Active => "active_players",
            Collection::Banned => "banned_players",
            Collection::Former => "former_players",
        }
    }

    /// Column header for the timestamp; its meaning depends on the list.
    pub fn timestamp_label(&self) -> &'static str {
        match self {
            Collection::Active => "Added On",
            Collection::Banned => "Banned On",
            Collection::Former => "Removed On",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Collection::Active),
            "banned" => Ok(Collection::Banned),
            "former" => Ok(Collection::Former),
            other => Err(format!("Unknown collection '{}'", other)),
        }
    }
}

/// A player held by exactly one collection.
///
/// `timestamp` is the time the record entered its current collection, kept
/// to microseconds so it survives the flat-file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub name: String,
    pub player_id: String,
    pub timestamp: DateTime<Utc>,
}

impl PlayerRecord {
    pub fn new(name: impl Into<String>, player_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            player_id: player_id.into(),
            timestamp: timestamp.trunc_subsecs(6),
        }
    }

    /// Case-insensitive substring match on name or id.
    ///
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.player_id.to_lowercase().contains(needle)
    }
}

pub fn format_storage_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(STORAGE_TIMESTAMP_FORMAT).to_string()
}

pub fn format_display_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(DISPLAY_TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Naive values are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    LEGACY_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
