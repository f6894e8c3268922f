//! Billing-period quota checks and backend reassignment.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use tracing::{error, info, warn};

use spindle_backends::GeneratorClient;
use spindle_domain::entities::{Generator, GeneratorStatus, StoryStatus, Suggestion};
use spindle_domain::{Error, Result};
use spindle_store::Store;

/// Start of the billing period containing `now`: the first instant of the
/// current calendar month, UTC.
pub fn period_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now
        .date_naive()
        .with_day(1)
        .unwrap_or_else(|| now.date_naive());
    let midnight = first.and_hms_opt(0, 0, 0).unwrap_or_else(|| now.naive_utc());
    Utc.from_utc_datetime(&midnight)
}

/// Whether a generator may still serve this period. A negative quota means
/// unlimited; an inactive generator never qualifies.
pub fn within_quota(generator: &Generator, usage: i64) -> bool {
    generator.status == GeneratorStatus::Active
        && (generator.quota < 0 || usage <= generator.quota)
}

/// Move a story to a fresh least-loaded generator of the same type.
///
/// The candidate must accept a snapshot of the story before the assignment
/// swaps; if it refuses, the story is marked failed and a later cache-miss
/// recovery gets to retry the snapshot. Returns `None` only when the story
/// itself has vanished.
pub async fn reassign(
    store: &Store,
    client: &dyn GeneratorClient,
    suggestion: &Suggestion,
    exhausted: &Generator,
) -> Result<Option<Generator>> {
    let story = match store.get_story(&suggestion.story_hash).await? {
        Some(story) => story,
        None => {
            error!(story = %suggestion.story_hash, "story missing during reassignment");
            return Ok(None);
        }
    };

    let mut candidates: Vec<Generator> = store
        .select_least_loaded()
        .await?
        .into_iter()
        .filter(|g| g.suggestion_type == suggestion.suggestion_type && g.id != exhausted.id)
        .collect();
    let candidate = candidates.pop().ok_or_else(|| {
        Error::InsufficientCapacity("no generator available for reassignment".into())
    })?;

    if client
        .snapshot(&candidate, &story.hash, &story.content)
        .await
    {
        store
            .swap_assignment(exhausted.id, candidate.id, &story.hash)
            .await?;
        info!(
            story = %story.hash,
            from = %exhausted.url,
            to = %candidate.url,
            "reassigned story"
        );
    } else {
        store
            .set_story_status(&story.hash, StoryStatus::Failed)
            .await?;
        warn!(
            story = %story.hash,
            to = %candidate.url,
            "reassignment snapshot refused, story marked failed"
        );
    }
    Ok(Some(candidate))
}
