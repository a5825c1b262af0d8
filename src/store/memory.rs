//! In-memory store for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{RosterStore, StoreError};
use crate::roster::Roster;

#[derive(Default)]
pub struct MemoryStore {
    roster: Mutex<Roster>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn with_roster(roster: Roster) -> Self {
        Self {
            roster: Mutex::new(roster),
            ..Self::default()
        }
    }

    /// Last roster written.
    pub fn saved(&self) -> Roster {
        self.roster.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every following `save` fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RosterStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> Result<Roster, StoreError> {
        Ok(self.saved())
    }

    async fn save(&self, roster: &Roster) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: "memory".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        *self.roster.lock().unwrap() = roster.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
