//! Most-relevant-run selection.
//!
//! Several runs can exist for the same workflow/branch pair (re-runs,
//! stale attempts, a fresh dispatch racing an old completion). The
//! selector collapses them to the single run a caller should act on:
//! an active run if anything is happening, otherwise a failure (failures
//! are more actionable than silence), otherwise the newest completion.

use std::cmp::Ordering;

use crate::run::{RunHandle, RunStatus};

/// Total order used for ties within a priority tier: newest creation
/// time wins, then highest id, so selection is deterministic even when
/// two runs share a timestamp.
fn recency(a: &RunHandle, b: &RunHandle) -> Ordering {
    a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
}

/// Pick the single most relevant run. `None` only for an empty input.
pub fn select_most_relevant(runs: &[RunHandle]) -> Option<&RunHandle> {
    if let Some(active) = runs
        .iter()
        .filter(|r| r.is_active())
        .max_by(|a, b| recency(a, b))
    {
        return Some(active);
    }

    if let Some(failed) = runs
        .iter()
        .filter(|r| r.failed())
        .max_by(|a, b| recency(a, b))
    {
        return Some(failed);
    }

    // Statuses are a closed set, so everything left is completed.
    runs.iter()
        .filter(|r| r.status == RunStatus::Completed)
        .max_by(|a, b| recency(a, b))
}
