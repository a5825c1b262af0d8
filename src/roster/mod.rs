//! Roster state machine.
//!
//! Owns the Active, Banned and Former collections and moves records between
//! them. Every lookup is by `player_id`; a given id is held by at most one
//! collection.
//!
//! ```text
//!              add                    ban
//!  Unknown ─────────▶ Active ─────────────────▶ Banned
//!     │                 ▲  ◀───── restore ──────  │ ▲
//!     │ ban             │                         │ │
//!     └─────────────────┼─────────────────────────┘ │
//!                       │ add            remove     │ ban
//!                       │                  │        │
//!                    Former ◀──────────────┴────────┘
//! ```

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{Action, Collection, PlayerRecord, PlayerView, RosterView, TransitionView};

/// Why a requested transition was refused. The roster is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Player {0} is already active")]
    AlreadyActive(String),

    #[error("Player {0} is currently banned, cannot add")]
    CurrentlyBanned(String),

    #[error("Player {0} is already banned")]
    AlreadyBanned(String),

    #[error("Player {0} is not in banned list")]
    NotBanned(String),

    #[error("Player {0} is already removed")]
    AlreadyRemoved(String),

    #[error("Player {0} not found")]
    NotFound(String),
}

impl Rejection {
    /// Stable machine-readable name.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::MissingField(_) => "missing_field",
            Rejection::AlreadyActive(_) => "already_active",
            Rejection::CurrentlyBanned(_) => "currently_banned",
            Rejection::AlreadyBanned(_) => "already_banned",
            Rejection::NotBanned(_) => "not_banned",
            Rejection::AlreadyRemoved(_) => "already_removed",
            Rejection::NotFound(_) => "not_found",
        }
    }
}

/// A successful move of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub action: Action,
    pub record: PlayerRecord,
    /// `None` when the record was created.
    pub from: Option<Collection>,
    pub to: Collection,
}

impl Transition {
    pub fn message(&self) -> String {
        let who = format!("{} ({})", self.record.name, self.record.player_id);
        match self.action {
            Action::Add => format!("{} added to active players", who),
            Action::Ban => format!("{} banned", who),
            Action::Restore => format!("{} restored to active players", who),
            Action::Remove => format!("{} moved to former players", who),
        }
    }

    pub fn view(&self) -> TransitionView {
        TransitionView {
            player: PlayerView::from(&self.record),
            from: self.from,
            to: self.to,
        }
    }
}

/// The three player collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    active: Vec<PlayerRecord>,
    banned: Vec<PlayerRecord>,
    former: Vec<PlayerRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster from stored collections.
    ///
    /// Storage written by older tools may hold the same id more than once.
    /// Only the copy with the latest timestamp survives; on a tie Banned
    /// wins over Active, and Active over Former.
    pub fn from_collections(
        active: Vec<PlayerRecord>,
        banned: Vec<PlayerRecord>,
        former: Vec<PlayerRecord>,
    ) -> Self {
        let loaded = [
            (Collection::Active, active),
            (Collection::Banned, banned),
            (Collection::Former, former),
        ];

        let mut winners: HashMap<&str, (Collection, DateTime<Utc>)> = HashMap::new();
        for (collection, records) in &loaded {
            for record in records {
                let candidate = (*collection, record.timestamp);
                winners
                    .entry(record.player_id.as_str())
                    .and_modify(|current| {
                        if supersedes(candidate, *current) {
                            *current = candidate;
                        }
                    })
                    .or_insert(candidate);
            }
        }

        let mut kept: HashSet<String> = HashSet::new();
        let mut roster = Roster::new();
        for (collection, records) in &loaded {
            for record in records {
                let id = record.player_id.as_str();
                let winner = if id.trim().is_empty() {
                    None
                } else {
                    winners.get(id).copied()
                };

                if winner == Some((*collection, record.timestamp)) && kept.insert(id.to_string()) {
                    roster.collection_mut(*collection).push(record.clone());
                } else {
                    tracing::warn!(
                        player_id = %record.player_id,
                        collection = %collection,
                        "Dropping duplicate or invalid player record"
                    );
                }
            }
        }

        roster
    }

    /// Records of one collection in insertion order.
    pub fn collection(&self, collection: Collection) -> &[PlayerRecord] {
        match collection {
            Collection::Active => &self.active,
            Collection::Banned => &self.banned,
            Collection::Former => &self.former,
        }
    }

    fn collection_mut(&mut self, collection: Collection) -> &mut Vec<PlayerRecord> {
        match collection {
            Collection::Active => &mut self.active,
            Collection::Banned => &mut self.banned,
            Collection::Former => &mut self.former,
        }
    }

    /// Total number of records across all collections.
    pub fn len(&self) -> usize {
        self.active.len() + self.banned.len() + self.former.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the collection holding `player_id`.
    pub fn locate(&self, player_id: &str) -> Option<(Collection, &PlayerRecord)> {
        let player_id = player_id.trim();
        Collection::ALL.into_iter().find_map(|collection| {
            self.collection(collection)
                .iter()
                .find(|r| r.player_id == player_id)
                .map(|r| (collection, r))
        })
    }

    /// Case-insensitive substring search on name or id across all collections.
    pub fn search(&self, query: &str) -> Vec<(Collection, &PlayerRecord)> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        Collection::ALL
            .into_iter()
            .flat_map(|collection| {
                self.collection(collection)
                    .iter()
                    .map(move |record| (collection, record))
            })
            .filter(|(_, record)| record.matches(&needle))
            .collect()
    }

    /// Dispatch a form action.
    pub fn apply(
        &mut self,
        action: Action,
        player_id: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, Rejection> {
        match action {
            Action::Add => self.add(name, player_id, now),
            Action::Ban => self.ban(player_id, name, now),
            Action::Restore => self.restore(player_id, now),
            Action::Remove => self.remove(player_id, now),
        }
    }

    /// Add a new player, or bring a former player back, into Active.
    pub fn add(
        &mut self,
        name: &str,
        player_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, Rejection> {
        let player_id = required(player_id, "player_id")?;
        let name = required(name, "name")?;

        match self.locate(player_id).map(|(c, _)| c) {
            Some(Collection::Active) => Err(Rejection::AlreadyActive(player_id.to_string())),
            Some(Collection::Banned) => Err(Rejection::CurrentlyBanned(player_id.to_string())),
            Some(Collection::Former) | None => {
                let (from, name) = match self.take(player_id) {
                    Some((from, existing)) => (Some(from), existing.name),
                    None => (None, name.to_string()),
                };
                let record = PlayerRecord::new(name, player_id, now);
                Ok(self.place(Action::Add, record, from, Collection::Active))
            }
        }
    }

    /// Ban a player. Unknown ids are created directly in Banned and need a name.
    pub fn ban(
        &mut self,
        player_id: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, Rejection> {
        let player_id = required(player_id, "player_id")?;

        match self.locate(player_id).map(|(c, _)| c) {
            Some(Collection::Banned) => Err(Rejection::AlreadyBanned(player_id.to_string())),
            Some(_) => {
                let (from, existing) = self
                    .take(player_id)
                    .ok_or_else(|| Rejection::NotFound(player_id.to_string()))?;
                let record = PlayerRecord::new(existing.name, player_id, now);
                Ok(self.place(Action::Ban, record, Some(from), Collection::Banned))
            }
            None => {
                let name = required(name, "name")?;
                let record = PlayerRecord::new(name, player_id, now);
                Ok(self.place(Action::Ban, record, None, Collection::Banned))
            }
        }
    }

    /// Move a banned player back to Active.
    pub fn restore(&mut self, player_id: &str, now: DateTime<Utc>) -> Result<Transition, Rejection> {
        let player_id = required(player_id, "player_id")?;

        if !matches!(self.locate(player_id), Some((Collection::Banned, _))) {
            return Err(Rejection::NotBanned(player_id.to_string()));
        }

        let (from, existing) = self
            .take(player_id)
            .ok_or_else(|| Rejection::NotBanned(player_id.to_string()))?;
        let record = PlayerRecord::new(existing.name, player_id, now);
        Ok(self.place(Action::Restore, record, Some(from), Collection::Active))
    }

    /// Move an active or banned player to Former.
    pub fn remove(&mut self, player_id: &str, now: DateTime<Utc>) -> Result<Transition, Rejection> {
        let player_id = required(player_id, "player_id")?;

        match self.locate(player_id).map(|(c, _)| c) {
            Some(Collection::Former) => Err(Rejection::AlreadyRemoved(player_id.to_string())),
            None => Err(Rejection::NotFound(player_id.to_string())),
            Some(_) => {
                let (from, existing) = self
                    .take(player_id)
                    .ok_or_else(|| Rejection::NotFound(player_id.to_string()))?;
                let record = PlayerRecord::new(existing.name, player_id, now);
                Ok(self.place(Action::Remove, record, Some(from), Collection::Former))
            }
        }
    }

    /// Delete every record in `collection`, returning how many were removed.
    pub fn clear(&mut self, collection: Collection) -> usize {
        let records = self.collection_mut(collection);
        let removed = records.len();
        records.clear();
        removed
    }

    pub fn view(&self) -> RosterView {
        RosterView {
            active: self.active.iter().map(PlayerView::from).collect(),
            banned: self.banned.iter().map(PlayerView::from).collect(),
            former: self.former.iter().map(PlayerView::from).collect(),
        }
    }

    /// Strip `player_id` from every collection, returning the first copy found.
    fn take(&mut self, player_id: &str) -> Option<(Collection, PlayerRecord)> {
        let mut found = None;
        for collection in Collection::ALL {
            let records = self.collection_mut(collection);
            if let Some(pos) = records.iter().position(|r| r.player_id == player_id) {
                let record = records.remove(pos);
                records.retain(|r| r.player_id != player_id);
                found.get_or_insert((collection, record));
            }
        }
        found
    }

    fn place(
        &mut self,
        action: Action,
        record: PlayerRecord,
        from: Option<Collection>,
        to: Collection,
    ) -> Transition {
        self.collection_mut(to).push(record.clone());
        Transition {
            action,
            record,
            from,
            to,
        }
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, Rejection> {
    let value = value.trim();
    if value.is_empty() {
        Err(Rejection::MissingField(field))
    } else {
        Ok(value)
    }
}

fn precedence(collection: Collection) -> u8 {
    match collection {
        Collection::Banned => 0,
        Collection::Active => 1,
        Collection::Former => 2,
    }
}

fn supersedes(
    candidate: (Collection, DateTime<Utc>),
    current: (Collection, DateTime<Utc>),
) -> bool {
    candidate.1 > current.1
        || (candidate.1 == current.1 && precedence(candidate.0) < precedence(current.0))
}
