//! Player list: display names and avatars keyed by player id
//!
//! Independent of the participant table; the server may list players that
//! never negotiate audio with us.

use log::debug;
use network::protocol::{PlayerEntries, PlayerEntry};
use voice_core::{ListenerId, Observable, PlayerId};

/// Shared handle to the roster. Clones observe the same list.
#[derive(Clone)]
pub struct PlayerList {
    entries: Observable<PlayerEntries>,
}

impl Default for PlayerList {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerList {
    pub fn new() -> Self {
        Self {
            entries: Observable::new(PlayerEntries::new()),
        }
    }

    /// Snapshot of every entry
    pub fn entries(&self) -> PlayerEntries {
        self.entries.get()
    }

    pub fn entry(&self, player_id: &PlayerId) -> Option<PlayerEntry> {
        self.entries.get().get(player_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace entries, notifying once
    pub fn set_entries(&self, entries: PlayerEntries) {
        debug!("Setting {} player list entries", entries.len());
        self.entries.update(|list| list.extend(entries));
    }

    /// Remove entries. Notifies, and returns `true`, only if something was removed.
    pub fn remove_entries(&self, player_ids: &[PlayerId]) -> bool {
        let mut list = self.entries.get();
        let before = list.len();
        for id in player_ids {
            list.remove(id);
        }
        if list.len() == before {
            return false;
        }
        debug!("Removed {} player list entries", before - list.len());
        self.entries.set(list);
        true
    }

    /// Listen for list changes
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PlayerEntries) + Send + Sync + 'static,
    {
        self.entries.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.entries.unsubscribe(id)
    }
}
