//! Habr Content Filter Core Library
//!
//! This crate provides the rule store and content evaluator behind the Habr
//! content filter: users block tags or authors, optionally for a limited
//! time, and articles carrying a blocked name are hidden.
//!
//! # Architecture
//!
//! A [`RuleStore`] is constructed once at startup over a string key-value
//! backend and a clock, and passed by reference to whoever needs it. The
//! page glue scrapes [`Candidate`]s from an article, [`evaluate`]s them,
//! and feeds the result to a [`HideTracker`] which bumps hide counters once
//! per item and reason.
//!
//! # Modules
//!
//! - `types`: categories, durations, block entries, hide reasons
//! - `clock`: wall-clock sources
//! - `storage`: key-value backends and the persisted JSON schema
//! - `store`: the rule store with lazy expiry
//! - `evaluator`: per-item hide decision
//! - `tracker`: per-item hide counting

pub mod clock;
pub mod evaluator;
pub mod storage;
pub mod store;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use evaluator::{evaluate, Candidate, CandidateResult, Evaluation};
pub use storage::{BackendError, FileBackend, FormatError, KeyValueBackend, MemoryBackend, STORAGE_KEY};
pub use store::{NamedEntry, PanelSummary, RuleStore, StoreError};
pub use tracker::{HideTracker, TrackOutcome, Transition};
pub use types::{BlockDuration, BlockEntry, Category, HideReason, Millis, ParseError};
