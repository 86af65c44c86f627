//! Dedup Filter
//!
//! Runs after a match: a track already in the target playlist is reported
//! as `Skipped(duplicate)` instead of being appended again.

use crate::types::{ExistingTrackSet, ResolutionResult, SkipReason};

pub fn apply(result: ResolutionResult, existing: &ExistingTrackSet) -> ResolutionResult {
    match result {
        ResolutionResult::Matched { ref candidate, .. } if existing.contains(&candidate.id) => {
            tracing::debug!(track_id = %candidate.id, "Track already in playlist");
            ResolutionResult::Skipped(SkipReason::Duplicate)
        }
        other => other,
    }
}
