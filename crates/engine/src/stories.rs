//! Story intake and preprocessing.

use std::collections::HashSet;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info};

use spindle_backends::GeneratorClient;
use spindle_domain::entities::{Generator, Story, StoryStatus};
use spindle_domain::hash::content_hash;
use spindle_domain::{Error, Result};
use spindle_store::Store;

use crate::runner::Runner;

/// Register story content and schedule preprocessing.
///
/// The content hash is the story's identity, so resubmitting the same
/// content is a no-op returning the same id. A previously failed story is
/// reset to `pending` and preprocessed again. Fails up front with
/// [`Error::InsufficientCapacity`] when no active generator exists.
pub async fn create_story(runner: &Runner, content: Value) -> Result<String> {
    let (_, story_hash) = content_hash(&content);
    let store = runner.store();

    let status = store.get_story_status(&story_hash).await?;
    if status.is_none() || status == Some(StoryStatus::Failed) {
        let candidates = pick_per_type(store.select_least_loaded().await?);
        if candidates.is_empty() {
            return Err(Error::InsufficientCapacity(
                "no active generator can accept a new story".into(),
            ));
        }

        let story = Story {
            hash: story_hash.clone(),
            content,
            status: StoryStatus::Pending,
            created_at: chrono::Utc::now(),
        };
        if status.is_none() {
            debug!(story = %story_hash, "creating story");
            store.insert_story(&story).await?;
        } else {
            debug!(story = %story_hash, "resubmitting failed story");
            store.update_story(&story).await?;
        }
        runner.schedule_preprocess(story_hash.clone(), candidates);
    }
    Ok(story_hash)
}

/// One least-loaded candidate per suggestion type; ties broken by query
/// order.
fn pick_per_type(mut generators: Vec<Generator>) -> Vec<Generator> {
    let mut seen = HashSet::new();
    generators.retain(|g| seen.insert(g.suggestion_type));
    generators
}

/// Preprocess a story on each candidate generator.
///
/// Every generator that accepts the snapshot is recorded as assigned. One
/// refusal fails the whole story; accepted assignments are kept so a later
/// resubmission does not re-snapshot those generators.
pub async fn process_story(
    store: &Store,
    client: &dyn GeneratorClient,
    story_hash: &str,
    generators: &[Generator],
) -> Result<()> {
    let story = store
        .get_story(story_hash)
        .await?
        .ok_or_else(|| Error::Lookup(format!("cannot find story {story_hash}")))?;

    let story = &story;
    let snapshots = join_all(generators.iter().map(|generator| async move {
        let accepted = client
            .snapshot(generator, &story.hash, &story.content)
            .await;
        (generator, accepted)
    }))
    .await;

    let mut status = StoryStatus::Ready;
    for (generator, accepted) in snapshots {
        if accepted {
            store.insert_assignment(generator.id, story_hash).await?;
        } else {
            status = StoryStatus::Failed;
        }
    }
    store.set_story_status(story_hash, status).await?;
    info!(story = %story_hash, status = status.as_str(), "story preprocessed");
    Ok(())
}
