//! Persisted store schema
//!
//! The whole store lives in one JSON blob under [`STORAGE_KEY`]:
//!
//! ```text
//! {
//!   "version":  1,
//!   "tags":     { "<name>": BlockEntry, ... },
//!   "authors":  { "<name>": BlockEntry, ... },
//!   "settings": { "showStats", "animateHiding", "showPreview", "focusMode" },
//!   "stats":    { "totalHidden", "lastUpdate" },
//!   ...         unknown keys, kept verbatim
//! }
//! ```
//!
//! Decoding merges the blob over a default skeleton one field at a time, so
//! blobs written by older versions (no `version`, missing settings) load
//! cleanly.

use std::collections::BTreeMap;

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{BlockEntry, Category, Millis};

/// Storage key of the persisted blob.
pub const STORAGE_KEY: &str = "habrFilterData";

/// Schema version written by this crate. Blobs without a version are v0.
pub const SCHEMA_VERSION: u32 = 1;

/// Error type for decoding a persisted or imported blob.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("top-level value is not an object")]
    NotAnObject,
    #[error("unsupported schema version: {0}")]
    UnsupportedVersion(u32),
    #[error("invalid field `{field}`: {source}")]
    InvalidField {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Settings
// =============================================================================

/// User toggles. Not consulted by the store or evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub show_stats: bool,
    pub animate_hiding: bool,
    pub show_preview: bool,
    pub focus_mode: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_stats: true,
            animate_hiding: true,
            show_preview: true,
            focus_mode: false,
            extra: Map::new(),
        }
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Global counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    /// Sum of all `hidden` counters, maintained incrementally
    pub total_hidden: u64,
    /// Time of the last successful save
    pub last_update: Millis,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStats {
    #[serde(default)]
    total_hidden: Option<u64>,
    #[serde(default)]
    last_update: Option<Millis>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

// =============================================================================
// Store Data
// =============================================================================

/// Full persisted state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreData {
    pub version: u32,
    pub tags: BTreeMap<String, BlockEntry>,
    pub authors: BTreeMap<String, BlockEntry>,
    pub settings: Settings,
    pub stats: StatsSummary,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoreData {
    /// Default skeleton: no rules, default settings, zero counters.
    pub fn empty(now: Millis) -> Self {
        Self {
            version: SCHEMA_VERSION,
            tags: BTreeMap::new(),
            authors: BTreeMap::new(),
            settings: Settings::default(),
            stats: StatsSummary {
                total_hidden: 0,
                last_update: now,
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    pub fn entries(&self, category: Category) -> &BTreeMap<String, BlockEntry> {
        match category {
            Category::Tags => &self.tags,
            Category::Authors => &self.authors,
        }
    }

    pub fn entries_mut(&mut self, category: Category) -> &mut BTreeMap<String, BlockEntry> {
        match category {
            Category::Tags => &mut self.tags,
            Category::Authors => &mut self.authors,
        }
    }
}

/// Decode a blob, merging it field by field over [`StoreData::empty`].
///
/// Missing or `null` fields take their defaults. A known field holding a
/// value of the wrong shape is an error, except for single rule entries:
/// a `null` or malformed entry is skipped and its siblings still load.
pub fn decode(text: &str, now: Millis) -> Result<StoreData, FormatError> {
    let mut root = match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => map,
        _ => return Err(FormatError::NotAnObject),
    };

    let mut data = StoreData::empty(now);

    if let Some(value) = take_field(&mut root, "version") {
        let version: u32 = decode_field("version", value)?;
        if version > SCHEMA_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }
    }

    if let Some(value) = take_field(&mut root, "tags") {
        data.tags = decode_entries("tags", value)?;
    }
    if let Some(value) = take_field(&mut root, "authors") {
        data.authors = decode_entries("authors", value)?;
    }
    if let Some(value) = take_field(&mut root, "settings") {
        data.settings = decode_field("settings", value)?;
    }
    if let Some(value) = take_field(&mut root, "stats") {
        let raw: RawStats = decode_field("stats", value)?;
        if let Some(total_hidden) = raw.total_hidden {
            data.stats.total_hidden = total_hidden;
        }
        if let Some(last_update) = raw.last_update {
            data.stats.last_update = last_update;
        }
        data.stats.extra = raw.extra;
    }

    data.extra = root;
    Ok(data)
}

/// Compact encoding used for persistence.
pub fn encode(data: &StoreData) -> Result<String, serde_json::Error> {
    serde_json::to_string(data)
}

/// Indented encoding used for export.
pub fn encode_pretty(data: &StoreData) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}

fn take_field(root: &mut Map<String, Value>, key: &str) -> Option<Value> {
    root.remove(key).filter(|value| !value.is_null())
}

fn decode_field<T: DeserializeOwned>(field: &'static str, value: Value) -> Result<T, FormatError> {
    serde_json::from_value(value).map_err(|source| FormatError::InvalidField { field, source })
}

fn decode_entries(
    field: &'static str,
    value: Value,
) -> Result<BTreeMap<String, BlockEntry>, FormatError> {
    let raw: Map<String, Value> = decode_field(field, value)?;
    let mut entries = BTreeMap::new();
    for (name, value) in raw {
        if value.is_null() {
            warn!("skipping empty {field} entry {name:?}");
            continue;
        }
        match serde_json::from_value::<BlockEntry>(value) {
            Ok(entry) => {
                entries.insert(name, entry);
            }
            Err(e) => warn!("skipping malformed {field} entry {name:?}: {e}"),
        }
    }
    Ok(entries)
}
