//! Roster service: one transition, one full write, then the optional push.
//!
//! The mutex is held across the transition, the save and the sync so a
//! second action is only accepted once the first is persisted.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::errors::{AppError, AppErrorWithRevision};
use crate::models::{
    ActionReport, ActionRequest, ClearReport, Collection, CollectionView, PlayerLocation,
    PlayerView, RosterView, SyncOutcome,
};
use crate::roster::Roster;
use crate::store::{RosterStore, StoreError};
use crate::sync::RemoteSync;

struct Inner {
    roster: Roster,
    revision_id: i64,
}

/// Shared owner of the in-memory roster.
pub struct RosterService {
    inner: Mutex<Inner>,
    store: Arc<dyn RosterStore>,
    sync: Option<Arc<RemoteSync>>,
}

impl RosterService {
    /// Load the roster from `store`.
    pub async fn open(
        store: Arc<dyn RosterStore>,
        sync: Option<Arc<RemoteSync>>,
    ) -> Result<Self, StoreError> {
        let roster = store.load().await?;
        if roster.is_empty() {
            tracing::info!("Starting with an empty roster");
        }
        tracing::info!(
            "Loaded roster: {} active, {} banned, {} former",
            roster.collection(Collection::Active).len(),
            roster.collection(Collection::Banned).len(),
            roster.collection(Collection::Former).len()
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                roster,
                revision_id: 0,
            }),
            store,
            sync,
        })
    }

    pub async fn revision_id(&self) -> i64 {
        self.inner.lock().await.revision_id
    }

    /// All three collections and the current revision.
    pub async fn snapshot(&self) -> (RosterView, i64) {
        let inner = self.inner.lock().await;
        (inner.roster.view(), inner.revision_id)
    }

    pub async fn collection(&self, collection: Collection) -> (CollectionView, i64) {
        let inner = self.inner.lock().await;
        let view = CollectionView {
            collection,
            players: inner
                .roster
                .collection(collection)
                .iter()
                .map(PlayerView::from)
                .collect(),
        };
        (view, inner.revision_id)
    }

    pub async fn locate(&self, player_id: &str) -> (Option<PlayerLocation>, i64) {
        let inner = self.inner.lock().await;
        let location = inner
            .roster
            .locate(player_id)
            .map(|(collection, record)| PlayerLocation {
                collection,
                player: PlayerView::from(record),
            });
        (location, inner.revision_id)
    }

    pub async fn search(&self, query: &str) -> (Vec<PlayerLocation>, i64) {
        let inner = self.inner.lock().await;
        let hits = inner
            .roster
            .search(query)
            .into_iter()
            .map(|(collection, record)| PlayerLocation {
                collection,
                player: PlayerView::from(record),
            })
            .collect();
        (hits, inner.revision_id)
    }

    /// Apply a form action and persist the result.
    ///
    /// Errors carry the revision observed under the same lock.
    pub async fn apply(
        &self,
        request: &ActionRequest,
    ) -> Result<(ActionReport, i64), AppErrorWithRevision> {
        let mut inner = self.inner.lock().await;
        let revision_id = inner.revision_id;

        let mut next = inner.roster.clone();
        let transition = next
            .apply(request.action, &request.player_id, &request.name, Utc::now())
            .map_err(|rejection| {
                tracing::info!(
                    action = request.action.as_str(),
                    player_id = %request.player_id.trim(),
                    "Rejected: {}",
                    rejection
                );
                AppErrorWithRevision {
                    error: AppError::Rejected(rejection),
                    revision_id,
                }
            })?;

        self.commit(&mut inner, next).await?;
        tracing::info!(
            action = request.action.as_str(),
            player_id = %transition.record.player_id,
            "{}",
            transition.message()
        );

        let sync = self.sync_after_save(&inner.roster).await;
        let report = ActionReport {
            message: transition.message(),
            transition: transition.view(),
            roster: inner.roster.view(),
            sync,
        };
        Ok((report, inner.revision_id))
    }

    /// Delete every record of one collection and persist the result.
    pub async fn clear(
        &self,
        collection: Collection,
    ) -> Result<(ClearReport, i64), AppErrorWithRevision> {
        let mut inner = self.inner.lock().await;

        let mut next = inner.roster.clone();
        let removed = next.clear(collection);

        self.commit(&mut inner, next).await?;
        tracing::info!("Cleared {} {} players", removed, collection);

        let sync = self.sync_after_save(&inner.roster).await;
        let report = ClearReport {
            message: format!("Cleared {} players from the {} list", removed, collection),
            collection,
            removed,
            roster: inner.roster.view(),
            sync,
        };
        Ok((report, inner.revision_id))
    }

    /// Push the current roster to the remote store now.
    pub async fn push_remote(&self) -> Result<(Vec<SyncOutcome>, i64), AppErrorWithRevision> {
        let inner = self.inner.lock().await;
        let Some(sync) = &self.sync else {
            return Err(AppErrorWithRevision {
                error: AppError::BadRequest("Remote sync is not configured".to_string()),
                revision_id: inner.revision_id,
            });
        };

        Ok((sync.push(&inner.roster).await, inner.revision_id))
    }

    /// Save `next` and make it current. On failure nothing changes.
    async fn commit(&self, inner: &mut Inner, next: Roster) -> Result<(), AppErrorWithRevision> {
        if let Err(e) = self.store.save(&next).await {
            return Err(AppErrorWithRevision {
                error: e.into(),
                revision_id: inner.revision_id,
            });
        }
        inner.roster = next;
        inner.revision_id += 1;
        Ok(())
    }

    async fn sync_after_save(&self, roster: &Roster) -> Vec<SyncOutcome> {
        match &self.sync {
            Some(sync) if sync.on_save() => sync.push(roster).await,
            _ => Vec::new(),
        }
    }
}
