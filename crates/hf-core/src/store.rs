//! Rule store
//!
//! Holds block rules and hide counters for tags and authors. Every mutation
//! writes the full snapshot back through the backend immediately. Write
//! failures are logged and swallowed: the in-memory state stays
//! authoritative and the next successful save catches the backend up.
//!
//! Timed blocks expire lazily. Nothing runs on a timer; an expired block is
//! noticed and cleared the next time [`RuleStore::is_blocked`] is asked
//! about that exact name.

use log::{debug, info, warn};
use serde::Serialize;

use crate::clock::Clock;
use crate::storage::{self, BackendError, FormatError, KeyValueBackend, Settings, StoreData, STORAGE_KEY};
use crate::types::{BlockDuration, BlockEntry, Category, Millis};

/// Error type for store persistence and import.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read persisted rules: {0}")]
    Read(#[source] BackendError),
    #[error("persisted rules are corrupt: {0}")]
    Corrupt(#[source] FormatError),
    #[error("failed to write rules: {0}")]
    Save(#[source] BackendError),
    #[error("failed to encode rules: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("import rejected: {0}")]
    Import(#[source] FormatError),
}

/// One named entry in a panel listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedEntry {
    pub name: String,
    #[serde(flatten)]
    pub entry: BlockEntry,
}

/// Data shown by the control panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelSummary {
    pub total_hidden: u64,
    /// Number of active blocks across both categories
    pub badge_count: usize,
    pub blocked_tags: Vec<NamedEntry>,
    pub blocked_authors: Vec<NamedEntry>,
    /// Unblocked names that hid something in the past
    pub inactive_tags: Vec<NamedEntry>,
    pub inactive_authors: Vec<NamedEntry>,
}

/// Block rules plus hide counters, persisted through `B`.
pub struct RuleStore<B, C> {
    backend: B,
    clock: C,
    data: StoreData,
}

impl<B: KeyValueBackend, C: Clock> RuleStore<B, C> {
    /// Load the store from `backend`.
    ///
    /// Missing data starts an empty store; unreadable or corrupt data is
    /// logged and also starts an empty store.
    pub fn open(backend: B, clock: C) -> Self {
        let data = match load_data(&backend, clock.now_ms()) {
            Ok(data) => data,
            Err(e) => {
                warn!("{e}; starting with an empty rule store");
                StoreData::empty(clock.now_ms())
            }
        };
        Self { backend, clock, data }
    }

    /// Load the store, failing instead of falling back to defaults.
    pub fn try_open(backend: B, clock: C) -> Result<Self, StoreError> {
        let data = load_data(&backend, clock.now_ms())?;
        Ok(Self { backend, clock, data })
    }

    /// Re-read the persisted blob, dropping in-memory state.
    pub fn reload(&mut self) {
        self.data = match load_data(&self.backend, self.clock.now_ms()) {
            Ok(data) => data,
            Err(e) => {
                warn!("{e}; reloading as an empty rule store");
                StoreData::empty(self.clock.now_ms())
            }
        };
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Block `name`, keeping its hide counter.
    pub fn add_block(&mut self, category: Category, name: &str, duration: BlockDuration) {
        let now = self.clock.now_ms();
        let entry = self.data.entries_mut(category).entry(name.to_string()).or_default();
        entry.blocked = true;
        entry.blocked_at = Some(now);
        entry.duration = Some(duration);
        debug!("blocked {category} {name:?} ({duration})");
        self.persist();
    }

    /// Lift the block on `name`. Unknown names are ignored.
    pub fn remove_block(&mut self, category: Category, name: &str) {
        match self.data.entries_mut(category).get_mut(name) {
            Some(entry) => {
                entry.blocked = false;
                debug!("unblocked {category} {name:?}");
            }
            None => return,
        }
        self.persist();
    }

    /// Count one more hidden item for `name`.
    pub fn increment_hidden(&mut self, category: Category, name: &str) {
        let entry = self.data.entries_mut(category).entry(name.to_string()).or_default();
        entry.hidden = entry.hidden.saturating_add(1);
        self.data.stats.total_hidden = self.data.stats.total_hidden.saturating_add(1);
        self.persist();
    }

    /// Change the user toggles and persist them.
    pub fn update_settings(&mut self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.data.settings);
        self.persist();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether `name` is blocked right now.
    ///
    /// An expired timed block is cleared (and persisted) here.
    pub fn is_blocked(&mut self, category: Category, name: &str) -> bool {
        let now = self.clock.now_ms();
        let expired = match self.data.entries(category).get(name) {
            Some(entry) if entry.blocked => entry.is_expired(now),
            _ => return false,
        };
        if expired {
            debug!("block on {category} {name:?} expired");
            self.remove_block(category, name);
            return false;
        }
        true
    }

    /// Stored entry for `name`, or a zeroed one.
    pub fn get_stats(&self, category: Category, name: &str) -> BlockEntry {
        self.data.entries(category).get(name).cloned().unwrap_or_default()
    }

    pub fn total_hidden(&self) -> u64 {
        self.data.stats.total_hidden
    }

    pub fn settings(&self) -> &Settings {
        &self.data.settings
    }

    pub fn data(&self) -> &StoreData {
        &self.data
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn now_ms(&self) -> Millis {
        self.clock.now_ms()
    }

    /// Listings for the control panel.
    ///
    /// Reads the stored `blocked` flag; blocks past their expiry that were
    /// not queried since still show as active.
    pub fn summary(&self) -> PanelSummary {
        let collect = |category: Category, active: bool| -> Vec<NamedEntry> {
            self.data
                .entries(category)
                .iter()
                .filter(|(_, e)| if active { e.blocked } else { !e.blocked && e.hidden > 0 })
                .map(|(name, e)| NamedEntry { name: name.clone(), entry: e.clone() })
                .collect()
        };

        let blocked_tags = collect(Category::Tags, true);
        let blocked_authors = collect(Category::Authors, true);
        PanelSummary {
            total_hidden: self.data.stats.total_hidden,
            badge_count: blocked_tags.len() + blocked_authors.len(),
            blocked_tags,
            blocked_authors,
            inactive_tags: collect(Category::Tags, false),
            inactive_authors: collect(Category::Authors, false),
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Indented JSON of the whole store.
    pub fn export_snapshot(&self) -> Result<String, StoreError> {
        storage::encode_pretty(&self.data).map_err(StoreError::Encode)
    }

    /// Replace the whole store with `text`.
    ///
    /// On error nothing changes, in memory or in the backend.
    pub fn import_snapshot(&mut self, text: &str) -> Result<(), StoreError> {
        let data = storage::decode(text, self.clock.now_ms()).map_err(StoreError::Import)?;
        info!(
            "imported {} tag and {} author entries",
            data.tags.len(),
            data.authors.len()
        );
        self.data = data;
        self.persist();
        Ok(())
    }

    /// Write the full snapshot to the backend.
    pub fn save(&mut self) -> Result<(), StoreError> {
        let previous = self.data.stats.last_update;
        self.data.stats.last_update = self.clock.now_ms();
        let result = storage::encode(&self.data)
            .map_err(StoreError::Encode)
            .and_then(|text| self.backend.set(STORAGE_KEY, &text).map_err(StoreError::Save));
        if result.is_err() {
            self.data.stats.last_update = previous;
        }
        result
    }

    fn persist(&mut self) {
        if let Err(e) = self.save() {
            warn!("{e}; keeping changes in memory");
        }
    }
}

fn load_data<B: KeyValueBackend>(backend: &B, now: Millis) -> Result<StoreData, StoreError> {
    match backend.get(STORAGE_KEY).map_err(StoreError::Read)? {
        Some(text) => storage::decode(&text, now).map_err(StoreError::Corrupt),
        None => Ok(StoreData::empty(now)),
    }
}
