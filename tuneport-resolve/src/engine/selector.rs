//! Candidate Selector
//!
//! Per strategy the engine walks this state machine:
//!
//! ```text
//! Searching(strategy) -> Scored -> AutoAccepted      -> Matched
//!                              -> AmbiguousPending  -> Matched | Skipped
//!                              -> StrategyExhausted -> Searching(next) | Unresolved
//! ```
//!
//! The selector owns the `Scored -> {..}` decision; the engine owns the
//! transitions that need I/O (search, disambiguation).

use crate::types::{ScoredCandidate, StrategyTag};
use tuneport_common::ResolverSettings;

/// Scores closer than this are treated as equal when comparing to thresholds
const SCORE_EPSILON: f64 = 1e-9;

/// Non-terminal resolution states for one request
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionState {
    /// Query for this strategy issued (or about to be)
    Searching(StrategyTag),
    /// Candidates ranked, awaiting a decision
    Scored(Vec<ScoredCandidate>),
    /// Top candidate taken without asking anyone
    AutoAccepted(ScoredCandidate),
    /// Several plausible candidates; a human has to choose
    AmbiguousPending(Vec<ScoredCandidate>),
    /// Nothing acceptable from this strategy
    StrategyExhausted,
}

#[derive(Debug, Clone)]
pub struct CandidateSelector {
    accept: f64,
    margin: f64,
    floor: f64,
}

impl CandidateSelector {
    pub fn new(accept: f64, margin: f64, floor: f64) -> Self {
        Self {
            accept,
            margin,
            floor,
        }
    }

    pub fn from_settings(settings: &ResolverSettings) -> Self {
        Self::new(
            settings.accept_threshold,
            settings.margin_threshold,
            settings.floor_threshold,
        )
    }

    /// Decide what a ranked (best-first) list leads to
    ///
    /// Returns `AutoAccepted`, `AmbiguousPending` or `StrategyExhausted`.
    pub fn decide(&self, ranked: Vec<ScoredCandidate>, interactive: bool) -> SelectionState {
        let plausible = ranked
            .iter()
            .take_while(|s| s.score + SCORE_EPSILON >= self.floor)
            .count();

        let Some(top) = ranked.first() else {
            return SelectionState::StrategyExhausted;
        };

        let clear_lead = match ranked.get(1) {
            Some(second) => top.score - second.score + SCORE_EPSILON >= self.margin,
            None => true,
        };
        let confident = top.score + SCORE_EPSILON >= self.accept && clear_lead;

        if confident || plausible == 1 {
            return SelectionState::AutoAccepted(top.clone());
        }

        if interactive && plausible >= 2 {
            let mut choices = ranked;
            choices.truncate(plausible);
            return SelectionState::AmbiguousPending(choices);
        }

        SelectionState::StrategyExhausted
    }
}
