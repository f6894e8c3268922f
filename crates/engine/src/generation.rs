//! The chunked generation state machine.
//!
//! A suggestion grows one range-addressed chunk per round. Each round is
//! an independent task invocation: [`start_suggestion`] resolves the
//! generator (reassigning if the current one is out of quota) and flips
//! the suggestion to `executing`; [`generate_round`] then requests one
//! chunk and either persists a terminal state or hands back the updated
//! suggestion for the next round.

use tracing::{debug, info};

use spindle_backends::GeneratorClient;
use spindle_domain::config::GenerationConfig;
use spindle_domain::entities::{Generator, Suggestion, SuggestionStatus, SuggestionType, TextEntry};
use spindle_domain::range::{next_span, strip_trailing_fragment, trim};
use spindle_domain::{Error, Result};
use spindle_store::Store;

use crate::quota;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Round setup
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolve the suggestion and its generator before the first round.
///
/// Checks the assigned generator against its billing-period quota and
/// reassigns the story when it is exhausted or inactive. Marks the
/// suggestion `executing` on success.
pub async fn start_suggestion(
    store: &Store,
    client: &dyn GeneratorClient,
    story_hash: &str,
    context_hash: &str,
    suggestion_type: SuggestionType,
) -> Result<(Suggestion, Generator)> {
    let (suggestion, assignment) = tokio::join!(
        store.get_suggestion_by_context(story_hash, context_hash, suggestion_type),
        store.get_assignment_for_story(story_hash),
    );
    let mut suggestion = suggestion?
        .ok_or_else(|| Error::Processing(format!("no suggestion for story {story_hash}")))?;
    let assignment = assignment?
        .ok_or_else(|| Error::Processing(format!("no generator assigned to story {story_hash}")))?;
    let generator = store
        .get_generator(assignment.generator_id)
        .await?
        .ok_or_else(|| {
            Error::Processing(format!(
                "assigned generator {} not found",
                assignment.generator_id
            ))
        })?;

    let usage = store
        .generator_usage_since(generator.id, quota::period_start(chrono::Utc::now()))
        .await?;
    let generator = if quota::within_quota(&generator, usage) {
        generator
    } else {
        info!(
            generator = %generator.url,
            usage,
            quota = generator.quota,
            "generator unavailable or over quota, reassigning"
        );
        quota::reassign(store, client, &suggestion, &generator)
            .await?
            .ok_or_else(|| {
                Error::Processing(format!("could not reassign story {story_hash}"))
            })?
    };

    suggestion.status = SuggestionStatus::Executing;
    store
        .set_suggestion_status(suggestion.uuid, SuggestionStatus::Executing)
        .await?;
    Ok((suggestion, generator))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// One round
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one generation round.
///
/// Returns `Ok(None)` when the suggestion reached a terminal `done` state
/// and `Ok(Some(updated))` when another round should be scheduled. A
/// recovered cache miss (404 followed by a successful re-snapshot) returns
/// the suggestion unchanged so the same round runs again. Failures mark
/// the suggestion `failed` before surfacing the error.
pub async fn generate_round(
    store: &Store,
    client: &dyn GeneratorClient,
    config: &GenerationConfig,
    mut suggestion: Suggestion,
    generator: &Generator,
) -> Result<Option<Suggestion>> {
    let cfg = config.clamped();
    let range = next_span(
        suggestion.generated.description(),
        cfg.unit,
        cfg.max_length,
        cfg.chunk_size,
    );
    if range.is_empty() {
        // Already at the cap; nothing left to request.
        suggestion.status = SuggestionStatus::Done;
        store.update_generated(&suggestion).await?;
        return Ok(None);
    }

    debug!(suggestion = %suggestion.uuid, range = %range, "requesting chunk");
    let outcome = client.figment(generator, &suggestion, &range).await;
    debug!(suggestion = %suggestion.uuid, status = outcome.status, "generator responded");

    if outcome.is_success() {
        // A malformed entry is the generator misbehaving, not a transient
        // fault; the validation error is fatal on first occurrence.
        let is_final = outcome.is_final();
        let entry = match TextEntry::from_value(outcome.entry) {
            Ok(entry) => entry,
            Err(e) => {
                fail(store, &suggestion).await?;
                return Err(e);
            }
        };
        let description = entry.description().to_string();
        if description == suggestion.generated.description() {
            fail(store, &suggestion).await?;
            return Err(Error::Processing(format!(
                "generator {} made no progress",
                generator.url
            )));
        }

        let trimmed = trim(&description, cfg.max_length, cfg.unit);
        let complete = is_final || trimmed != description;

        suggestion.generated = entry;
        if complete {
            // Never end a finished suggestion mid-sentence.
            let text = strip_trailing_fragment(&trimmed).to_string();
            suggestion.generated.description = Some(text);
            suggestion.status = SuggestionStatus::Done;
        } else {
            suggestion.generated.description = Some(trimmed);
            suggestion.status = SuggestionStatus::Executing;
        }
        store.update_generated(&suggestion).await?;

        if suggestion.status == SuggestionStatus::Done {
            info!(suggestion = %suggestion.uuid, "suggestion complete");
            Ok(None)
        } else {
            Ok(Some(suggestion))
        }
    } else if outcome.status == 404 {
        // The generator lost its story snapshot. Re-prime it and retry
        // the round with the same state.
        let story = store
            .get_story(&suggestion.story_hash)
            .await?
            .ok_or_else(|| {
                Error::Lookup(format!("cannot find story {}", suggestion.story_hash))
            })?;
        if client.snapshot(generator, &story.hash, &story.content).await {
            info!(story = %story.hash, generator = %generator.url, "snapshot restored");
            Ok(Some(suggestion))
        } else {
            fail(store, &suggestion).await?;
            Err(Error::Processing(format!(
                "generator {} refused a replacement snapshot",
                generator.url
            )))
        }
    } else {
        fail(store, &suggestion).await?;
        Err(Error::Processing(format!(
            "generator {} returned status {}",
            generator.url, outcome.status
        )))
    }
}

async fn fail(store: &Store, suggestion: &Suggestion) -> Result<()> {
    store
        .set_suggestion_status(suggestion.uuid, SuggestionStatus::Failed)
        .await
}
