//! Deduplication, whitelist classification and the in-memory pipeline.
//!
//! Runs after every fetch has completed, single-threaded:
//! `Extract -> Dedup+Classify -> Numbering`. Persisting and uploading the
//! resulting [`OutputSet`]s is left to the caller.

use std::collections::HashSet;

use crate::error::WlmergeError;
use crate::identity::{identity_key, DedupKey, DedupStrategy};
use crate::output::{OutputKind, OutputSet};
use crate::renumber::Renumberer;
use crate::runlog::RunLog;
use crate::utils::format_count;
use crate::whitelist::WhitelistSet;

/// What happened to one candidate offered to a [`Deduplicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Kept,
    /// Same exact string as an earlier candidate (or empty).
    ExactDuplicate,
    /// Identity key collides with an already kept candidate.
    IdentityDuplicate,
}

/// First-seen-wins dedup state for one run.
#[derive(Debug)]
pub struct Deduplicator {
    strategy: DedupStrategy,
    seen_exact: HashSet<String>,
    seen_keys: HashSet<DedupKey>,
    unidentified: usize,
}

impl Deduplicator {
    pub fn new(strategy: DedupStrategy) -> Self {
        Self {
            strategy,
            seen_exact: HashSet::new(),
            seen_keys: HashSet::new(),
            unidentified: 0,
        }
    }

    /// Offer a candidate. It is trimmed before comparison.
    ///
    /// Candidates without an extractable endpoint are kept unless they are
    /// exact duplicates.
    pub fn admit(&mut self, candidate: &str) -> Admission {
        let candidate = candidate.trim();
        if candidate.is_empty() || !self.seen_exact.insert(candidate.to_string()) {
            return Admission::ExactDuplicate;
        }

        match identity_key(candidate, self.strategy) {
            Some(key) => {
                if self.seen_keys.insert(key) {
                    Admission::Kept
                } else {
                    Admission::IdentityDuplicate
                }
            }
            None => {
                self.unidentified += 1;
                Admission::Kept
            }
        }
    }

    /// Kept candidates that had no identity key.
    pub fn unidentified(&self) -> usize {
        self.unidentified
    }

    pub fn strategy(&self) -> DedupStrategy {
        self.strategy
    }
}

/// Survivors of [`merge_and_deduplicate`] plus drop counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Trimmed survivors in arrival order.
    pub unique: Vec<String>,
    pub exact_duplicates: usize,
    pub identity_duplicates: usize,
    /// Survivors kept without an identity key.
    pub unidentified: usize,
}

impl MergeOutcome {
    pub fn dropped(&self) -> usize {
        self.exact_duplicates + self.identity_duplicates
    }
}

/// Deduplicate candidates in arrival order.
///
/// A candidate is dropped if its exact (trimmed) string was already seen, or
/// if its identity key under `strategy` belongs to an already kept
/// candidate. Empty lines are dropped and counted as exact duplicates.
pub fn merge_and_deduplicate<S: AsRef<str>>(
    candidates: &[S],
    strategy: DedupStrategy,
) -> MergeOutcome {
    let mut dedup = Deduplicator::new(strategy);
    let mut outcome = MergeOutcome::default();

    for candidate in candidates {
        let candidate = candidate.as_ref();
        match dedup.admit(candidate) {
            Admission::Kept => outcome.unique.push(candidate.trim().to_string()),
            Admission::ExactDuplicate => outcome.exact_duplicates += 1,
            Admission::IdentityDuplicate => outcome.identity_duplicates += 1,
        }
    }

    outcome.unidentified = dedup.unidentified();
    outcome
}

/// Whitelisted subset of `links`, in the same relative order.
pub fn classify_whitelist(links: &[String], whitelist: &WhitelistSet) -> Vec<String> {
    links
        .iter()
        .filter(|link| whitelist.is_whitelisted(link))
        .cloned()
        .collect()
}

/// Result of one [`Pipeline::run`].
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// All survivors (`merged.txt`).
    pub merged: OutputSet,
    /// Whitelisted survivors (`wl.txt`).
    pub whitelist: OutputSet,
    /// Candidates offered to dedup.
    pub candidates: usize,
    pub exact_duplicates: usize,
    pub identity_duplicates: usize,
    pub unidentified: usize,
}

impl PipelineOutput {
    pub fn duplicates(&self) -> usize {
        self.exact_duplicates + self.identity_duplicates
    }
}

/// Dedup, classification and optional renumbering over fetched candidates.
#[derive(Debug, Clone)]
pub struct Pipeline {
    strategy: DedupStrategy,
    whitelist: WhitelistSet,
    renumberer: Option<Renumberer>,
}

impl Pipeline {
    pub fn new(
        strategy: DedupStrategy,
        whitelist: WhitelistSet,
        renumberer: Option<Renumberer>,
    ) -> Self {
        Self {
            strategy,
            whitelist,
            renumberer,
        }
    }

    pub fn whitelist(&self) -> &WhitelistSet {
        &self.whitelist
    }

    /// Run the in-memory stages.
    ///
    /// Classification happens on the survivors before renumbering; each
    /// output set is numbered from 1 independently.
    ///
    /// # Errors
    /// [`WlmergeError::NoCandidates`] if `candidates` is empty, the only
    /// condition that stops a run.
    pub fn run(&self, candidates: &[String], log: &RunLog) -> Result<PipelineOutput, WlmergeError> {
        if candidates.is_empty() {
            return Err(WlmergeError::NoCandidates);
        }

        log.push(format!(
            "Deduplicating {} candidates by {}",
            format_count(candidates.len()),
            self.strategy
        ));
        let outcome = merge_and_deduplicate(candidates, self.strategy);
        log.push(format!(
            "After dedup: {} unique ({} exact, {} identity duplicates, {} without endpoint)",
            outcome.unique.len(),
            outcome.exact_duplicates,
            outcome.identity_duplicates,
            outcome.unidentified
        ));

        let whitelisted = classify_whitelist(&outcome.unique, &self.whitelist);
        log.push(format!(
            "Whitelisted: {} of {} ({} subnets)",
            whitelisted.len(),
            outcome.unique.len(),
            self.whitelist.len()
        ));

        let (merged, whitelisted) = match &self.renumberer {
            Some(renumberer) => (
                renumberer.renumber(&outcome.unique),
                renumberer.renumber(&whitelisted),
            ),
            None => (outcome.unique.clone(), whitelisted),
        };

        Ok(PipelineOutput {
            merged: OutputSet::new(OutputKind::Merged, merged),
            whitelist: OutputSet::new(OutputKind::Whitelist, whitelisted),
            candidates: candidates.len(),
            exact_duplicates: outcome.exact_duplicates,
            identity_duplicates: outcome.identity_duplicates,
            unidentified: outcome.unidentified,
        })
    }
}
