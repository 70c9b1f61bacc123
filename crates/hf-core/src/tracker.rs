//! Hide counting side table
//!
//! Items get re-evaluated whenever rules change or the page re-renders.
//! The tracker remembers, per stable item id, whether the item is hidden
//! and which reasons were already counted for it, so each
//! `(item, reason)` pair bumps the store counters at most once.

use std::collections::{HashMap, HashSet};

use crate::clock::Clock;
use crate::evaluator::Evaluation;
use crate::storage::KeyValueBackend;
use crate::store::RuleStore;
use crate::types::HideReason;

/// Visibility change of an item between two evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BecameHidden,
    StayedHidden,
    BecameVisible,
    StayedVisible,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BecameHidden => "becameHidden",
            Self::StayedHidden => "stayedHidden",
            Self::BecameVisible => "becameVisible",
            Self::StayedVisible => "stayedVisible",
        }
    }

    pub fn is_hidden(self) -> bool {
        matches!(self, Self::BecameHidden | Self::StayedHidden)
    }
}

/// Result of [`HideTracker::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOutcome {
    pub transition: Transition,
    /// Reasons whose counters were bumped by this call
    pub counted: Vec<HideReason>,
}

#[derive(Debug, Default)]
struct ItemState {
    hidden: bool,
    counted: HashSet<HideReason>,
}

/// Per-item hide state, keyed by a stable item id.
#[derive(Debug, Default)]
pub struct HideTracker {
    items: HashMap<String, ItemState>,
}

impl HideTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest evaluation of `item_id`.
    ///
    /// Counters move only when the item goes from visible (or unseen) to
    /// hidden, and only for reasons not yet counted for this item.
    pub fn apply<B, C>(
        &mut self,
        store: &mut RuleStore<B, C>,
        item_id: &str,
        evaluation: &Evaluation,
    ) -> TrackOutcome
    where
        B: KeyValueBackend,
        C: Clock,
    {
        let state = self.items.entry(item_id.to_string()).or_default();
        let transition = match (state.hidden, evaluation.should_hide) {
            (false, true) => Transition::BecameHidden,
            (true, true) => Transition::StayedHidden,
            (true, false) => Transition::BecameVisible,
            (false, false) => Transition::StayedVisible,
        };
        state.hidden = evaluation.should_hide;

        let mut counted = Vec::new();
        if transition == Transition::BecameHidden {
            for reason in &evaluation.hide_reasons {
                if state.counted.insert(reason.clone()) {
                    store.increment_hidden(reason.category, &reason.name);
                    counted.push(reason.clone());
                }
            }
        }

        TrackOutcome { transition, counted }
    }

    /// Drop everything known about `item_id`.
    pub fn forget(&mut self, item_id: &str) -> bool {
        self.items.remove(item_id).is_some()
    }

    pub fn is_hidden(&self, item_id: &str) -> bool {
        self.items.get(item_id).map_or(false, |s| s.hidden)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
