//! Content evaluator
//!
//! Decides whether a single content item should be hidden, given the tag
//! and author names scraped from it. Evaluation never counts anything;
//! hide counters are the job of [`crate::tracker::HideTracker`].

use crate::clock::Clock;
use crate::storage::KeyValueBackend;
use crate::store::RuleStore;
use crate::types::{BlockEntry, Category, HideReason};

/// A (category, name) pair scraped from a content item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub category: Category,
    pub name: String,
}

impl Candidate {
    /// Normalised candidate, `None` when the name is blank.
    pub fn new(category: Category, raw: &str) -> Option<Self> {
        let name = category.normalize(raw);
        if name.is_empty() {
            return None;
        }
        Some(Self { category, name })
    }

    pub fn tag(raw: &str) -> Option<Self> {
        Self::new(Category::Tags, raw)
    }

    pub fn author(raw: &str) -> Option<Self> {
        Self::new(Category::Authors, raw)
    }

    /// Candidates for an item with the given tags and optional author.
    pub fn for_item<'a>(tags: impl IntoIterator<Item = &'a str>, author: Option<&str>) -> Vec<Self> {
        tags.into_iter()
            .filter_map(Self::tag)
            .chain(author.and_then(Self::author))
            .collect()
    }
}

/// Per-candidate result, used for badges next to the scraped links.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateResult {
    pub name: String,
    pub stats: BlockEntry,
    pub blocked: bool,
}

/// Outcome of evaluating one item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub should_hide: bool,
    /// Distinct blocked tags in document order, then the author
    pub hide_reasons: Vec<HideReason>,
    /// One result per tag candidate, duplicates included
    pub tag_results: Vec<CandidateResult>,
    pub author_result: Option<CandidateResult>,
}

impl Evaluation {
    /// Reasons rendered as `тег: <name>` / `автор: <name>`.
    pub fn reason_strings(&self) -> Vec<String> {
        self.hide_reasons.iter().map(ToString::to_string).collect()
    }
}

/// Evaluate an item's candidates against `store`.
///
/// Only the first author candidate counts. Stats are read after the block
/// check, so a block that just expired already shows as unblocked.
pub fn evaluate<B, C>(store: &mut RuleStore<B, C>, candidates: &[Candidate]) -> Evaluation
where
    B: KeyValueBackend,
    C: Clock,
{
    let mut evaluation = Evaluation::default();
    let mut author_reason = None;

    for candidate in candidates {
        if candidate.category == Category::Authors && evaluation.author_result.is_some() {
            log::debug!("ignoring extra author candidate {:?}", candidate.name);
            continue;
        }

        let blocked = store.is_blocked(candidate.category, &candidate.name);
        let result = CandidateResult {
            name: candidate.name.clone(),
            stats: store.get_stats(candidate.category, &candidate.name),
            blocked,
        };

        match candidate.category {
            Category::Tags => {
                if blocked {
                    let reason = HideReason::new(Category::Tags, candidate.name.as_str());
                    if !evaluation.hide_reasons.contains(&reason) {
                        evaluation.hide_reasons.push(reason);
                    }
                }
                evaluation.tag_results.push(result);
            }
            Category::Authors => {
                if blocked {
                    author_reason = Some(HideReason::new(Category::Authors, candidate.name.as_str()));
                }
                evaluation.author_result = Some(result);
            }
        }
    }

    evaluation.hide_reasons.extend(author_reason);
    evaluation.should_hide = !evaluation.hide_reasons.is_empty();
    evaluation
}
