//! Suggestion intake, lookup, and finalization.

use tracing::debug;
use uuid::Uuid;

use spindle_domain::entities::{Suggestion, SuggestionStatus, SuggestionType, TextEntry};
use spindle_domain::hash::content_hash;
use spindle_domain::{Error, Result};
use spindle_store::Store;

use crate::runner::Runner;

/// Request a suggestion for a story, given the context it should extend.
///
/// Idempotent on `(context, story, type)`: concurrent callers converge on
/// one row, and only the winning insert schedules generation. The context
/// must arrive without a `description` — that field is what generation
/// fills in.
pub async fn get_or_create_suggestion(
    runner: &Runner,
    story_hash: &str,
    context: TextEntry,
    suggestion_type: SuggestionType,
) -> Result<Suggestion> {
    if !context.description().is_empty() {
        return Err(Error::InvalidOperation(
            "suggestion context must not carry a description".into(),
        ));
    }

    let context_value = serde_json::to_value(&context)?;
    let (_, context_hash) = content_hash(&context_value);
    let store = runner.store();

    if let Some(existing) = store
        .get_suggestion_by_context(story_hash, &context_hash, suggestion_type)
        .await?
    {
        return Ok(existing);
    }

    let suggestion = Suggestion {
        uuid: Uuid::new_v4(),
        story_hash: story_hash.to_string(),
        suggestion_type,
        context_hash: context_hash.clone(),
        context: context.clone(),
        generated: context,
        finalized: None,
        status: SuggestionStatus::Pending,
        created_at: chrono::Utc::now(),
    };
    if store.insert_suggestion(&suggestion).await? {
        debug!(suggestion = %suggestion.uuid, story = %story_hash, "created suggestion");
        runner.schedule_create(story_hash.to_string(), context_hash, suggestion_type);
        Ok(suggestion)
    } else {
        // Lost the insert race; the winner's row is the suggestion.
        store
            .get_suggestion_by_context(story_hash, &context_hash, suggestion_type)
            .await?
            .ok_or_else(|| {
                Error::Lookup(format!("suggestion vanished for story {story_hash}"))
            })
    }
}

pub async fn get_suggestion(store: &Store, uuid: Uuid) -> Result<Option<Suggestion>> {
    store.get_suggestion_by_uuid(uuid).await
}

pub async fn get_suggestion_by_context(
    store: &Store,
    story_hash: &str,
    context: &TextEntry,
    suggestion_type: SuggestionType,
) -> Result<Option<Suggestion>> {
    let context_value = serde_json::to_value(context)?;
    let (_, context_hash) = content_hash(&context_value);
    store
        .get_suggestion_by_context(story_hash, &context_hash, suggestion_type)
        .await
}

/// Record the text the user actually kept. Set exactly once.
pub async fn finalize_suggestion(store: &Store, uuid: Uuid, entry: TextEntry) -> Result<()> {
    store
        .get_suggestion_by_uuid(uuid)
        .await?
        .ok_or_else(|| Error::InvalidOperation(format!("unknown suggestion {uuid}")))?;

    if store.finalize_suggestion(uuid, &entry).await? {
        debug!(suggestion = %uuid, "suggestion finalized");
        Ok(())
    } else {
        Err(Error::InvalidOperation(format!(
            "suggestion {uuid} is already finalized"
        )))
    }
}
