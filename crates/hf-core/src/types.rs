//! Core type definitions for the content filter
//!
//! These types map directly to the persisted JSON blob and are used
//! throughout the store and the evaluator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wall-clock milliseconds since the Unix epoch.
pub type Millis = u64;

// =============================================================================
// Categories
// =============================================================================

/// Which mapping of the store a rule lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Hub/tag links on an article, keyed lower-cased
    Tags,
    /// Article author, keyed as displayed
    Authors,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Tags, Category::Authors];

    /// Key of this category inside the persisted blob.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Authors => "authors",
        }
    }

    /// Prefix used when rendering a hide reason.
    pub fn reason_label(self) -> &'static str {
        match self {
            Self::Tags => "тег",
            Self::Authors => "автор",
        }
    }

    /// Canonical store key for a raw name scraped from the page.
    pub fn normalize(self, raw: &str) -> String {
        let trimmed = raw.trim();
        match self {
            Self::Tags => trimmed.to_lowercase(),
            Self::Authors => trimmed.to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognised category or duration names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    #[error("unknown block duration: {0}")]
    UnknownDuration(String),
    #[error("malformed hide reason: {0}")]
    MalformedReason(String),
}

impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tags" | "tag" => Ok(Self::Tags),
            "authors" | "author" => Ok(Self::Authors),
            _ => Err(ParseError::UnknownCategory(s.to_string())),
        }
    }
}

// =============================================================================
// Block Durations
// =============================================================================

const DAY_MS: Millis = 86_400_000;
const WEEK_MS: Millis = 604_800_000;
const MONTH_MS: Millis = 2_592_000_000;

/// Expiry policy of a block rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockDuration {
    Day,
    Week,
    Month,
    /// Never expires. Unknown durations in stored data land here too.
    #[default]
    #[serde(other)]
    Permanent,
}

impl BlockDuration {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Permanent => "permanent",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Lifetime of the block, `None` for permanent blocks.
    pub fn ttl_ms(self) -> Option<Millis> {
        match self {
            Self::Permanent => None,
            Self::Day => Some(DAY_MS),
            Self::Week => Some(WEEK_MS),
            Self::Month => Some(MONTH_MS),
        }
    }
}

impl FromStr for BlockDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permanent" => Ok(Self::Permanent),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err(ParseError::UnknownDuration(s.to_string())),
        }
    }
}

impl fmt::Display for BlockDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Block Entry
// =============================================================================

/// Per-name block state and hide counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEntry {
    /// How many times content matching this name was hidden
    #[serde(default)]
    pub hidden: u64,
    /// Whether a block rule is currently active
    #[serde(default)]
    pub blocked: bool,
    /// When the current block was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<Millis>,
    /// Expiry policy of the current block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<BlockDuration>,
    /// Keys this version does not know, written back unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlockEntry {
    /// Whether a timed block has outlived its duration at `now`.
    ///
    /// Blocks without a creation time never expire.
    pub fn is_expired(&self, now: Millis) -> bool {
        let ttl = match self.duration.and_then(BlockDuration::ttl_ms) {
            Some(ttl) => ttl,
            None => return false,
        };
        match self.blocked_at {
            Some(at) => now.saturating_sub(at) > ttl,
            None => false,
        }
    }
}

// =============================================================================
// Hide Reasons
// =============================================================================

/// A blocked (category, name) pair that caused an item to be hidden.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HideReason {
    pub category: Category,
    pub name: String,
}

impl HideReason {
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self { category, name: name.into() }
    }
}

impl fmt::Display for HideReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category.reason_label(), self.name)
    }
}

impl FromStr for HideReason {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, name) = s
            .split_once(": ")
            .ok_or_else(|| ParseError::MalformedReason(s.to_string()))?;
        let category = Category::ALL
            .into_iter()
            .find(|c| c.reason_label() == label)
            .ok_or_else(|| ParseError::MalformedReason(s.to_string()))?;
        Ok(Self::new(category, name))
    }
}
