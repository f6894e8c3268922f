//! Suggestion persistence, including the idempotent-create converge and
//! the per-generator billing-period usage aggregate.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use spindle_domain::entities::{Suggestion, SuggestionStatus, SuggestionType, TextEntry};
use spindle_domain::Result;

use crate::records::SuggestionRecord;
use crate::Store;

impl Store {
    /// Insert a suggestion, returning `false` when another writer already
    /// holds the `(context_hash, story_hash, type)` slot. Losers must read
    /// the winner's row instead of erroring.
    pub async fn insert_suggestion(&self, suggestion: &Suggestion) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO suggestions
                (uuid, story_hash, suggestion_type, context_hash,
                 context, generated, finalized, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (context_hash, story_hash, suggestion_type) DO NOTHING
            "#,
        )
        .bind(suggestion.uuid.to_string())
        .bind(&suggestion.story_hash)
        .bind(suggestion.suggestion_type.as_str())
        .bind(&suggestion.context_hash)
        .bind(serde_json::to_string(&suggestion.context)?)
        .bind(serde_json::to_string(&suggestion.generated)?)
        .bind(match &suggestion.finalized {
            Some(entry) => Some(serde_json::to_string(entry)?),
            None => None,
        })
        .bind(suggestion.status.as_str())
        .bind(suggestion.created_at)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_suggestion_by_uuid(&self, uuid: Uuid) -> Result<Option<Suggestion>> {
        let record =
            sqlx::query_as::<_, SuggestionRecord>("SELECT * FROM suggestions WHERE uuid = ?")
                .bind(uuid.to_string())
                .fetch_optional(self.pool())
                .await?;
        record.map(SuggestionRecord::into_suggestion).transpose()
    }

    pub async fn get_suggestion_by_context(
        &self,
        story_hash: &str,
        context_hash: &str,
        suggestion_type: SuggestionType,
    ) -> Result<Option<Suggestion>> {
        let record = sqlx::query_as::<_, SuggestionRecord>(
            r#"
            SELECT * FROM suggestions
            WHERE context_hash = ? AND story_hash = ? AND suggestion_type = ?
            "#,
        )
        .bind(context_hash)
        .bind(story_hash)
        .bind(suggestion_type.as_str())
        .fetch_optional(self.pool())
        .await?;
        record.map(SuggestionRecord::into_suggestion).transpose()
    }

    /// Persist the outcome of a generation round: the accumulated text and
    /// the (possibly unchanged) status.
    pub async fn update_generated(&self, suggestion: &Suggestion) -> Result<()> {
        sqlx::query("UPDATE suggestions SET generated = ?, status = ? WHERE uuid = ?")
            .bind(serde_json::to_string(&suggestion.generated)?)
            .bind(suggestion.status.as_str())
            .bind(suggestion.uuid.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn set_suggestion_status(&self, uuid: Uuid, status: SuggestionStatus) -> Result<()> {
        sqlx::query("UPDATE suggestions SET status = ? WHERE uuid = ?")
            .bind(status.as_str())
            .bind(uuid.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Set `finalized` once. Returns `false` when the suggestion was
    /// already finalized (or does not exist).
    pub async fn finalize_suggestion(&self, uuid: Uuid, entry: &TextEntry) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE suggestions SET finalized = ? WHERE uuid = ? AND finalized IS NULL",
        )
        .bind(serde_json::to_string(entry)?)
        .bind(uuid.to_string())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// How many suggestions were created against stories assigned to this
    /// generator since `since` (the start of the billing period).
    pub async fn generator_usage_since(
        &self,
        generator_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM suggestions AS s
                JOIN generator_for_story AS a ON a.story_hash = s.story_hash
            WHERE a.generator_id = ? AND s.created_at >= ?
            "#,
        )
        .bind(generator_id)
        .bind(since)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use spindle_domain::entities::{GeneratorStatus, Story, StoryStatus};

    fn suggestion(story_hash: &str, context_hash: &str) -> Suggestion {
        let context = TextEntry::default();
        Suggestion {
            uuid: Uuid::new_v4(),
            story_hash: story_hash.to_string(),
            suggestion_type: SuggestionType::SceneEntry,
            context_hash: context_hash.to_string(),
            context: context.clone(),
            generated: context,
            finalized: None,
            status: SuggestionStatus::Pending,
            created_at: Utc::now(),
        }
    }

    async fn seed_story(store: &Store, hash: &str) {
        store
            .insert_story(&Story {
                hash: hash.to_string(),
                content: json!({"n": hash}),
                status: StoryStatus::Ready,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn conflicting_inserts_converge_on_the_winner() {
        let store = Store::in_memory().await.unwrap();
        seed_story(&store, "s1").await;

        let first = suggestion("s1", "ctx");
        let second = suggestion("s1", "ctx");
        assert!(store.insert_suggestion(&first).await.unwrap());
        assert!(!store.insert_suggestion(&second).await.unwrap());

        let row = store
            .get_suggestion_by_context("s1", "ctx", SuggestionType::SceneEntry)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.uuid, first.uuid);
    }

    #[tokio::test]
    async fn fetch_by_uuid_and_context_agree() {
        let store = Store::in_memory().await.unwrap();
        seed_story(&store, "s1").await;
        let created = suggestion("s1", "ctx");
        store.insert_suggestion(&created).await.unwrap();

        let by_uuid = store
            .get_suggestion_by_uuid(created.uuid)
            .await
            .unwrap()
            .unwrap();
        let by_context = store
            .get_suggestion_by_context("s1", "ctx", SuggestionType::SceneEntry)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_uuid.uuid, by_context.uuid);
        assert_eq!(by_uuid.status, SuggestionStatus::Pending);
    }

    #[tokio::test]
    async fn generated_text_and_status_persist() {
        let store = Store::in_memory().await.unwrap();
        seed_story(&store, "s1").await;
        let mut created = suggestion("s1", "ctx");
        store.insert_suggestion(&created).await.unwrap();

        created.generated = TextEntry::with_description("Once upon a time.");
        created.status = SuggestionStatus::Done;
        store.update_generated(&created).await.unwrap();

        let row = store
            .get_suggestion_by_uuid(created.uuid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.generated.description(), "Once upon a time.");
        assert_eq!(row.status, SuggestionStatus::Done);
    }

    #[tokio::test]
    async fn finalize_is_set_once() {
        let store = Store::in_memory().await.unwrap();
        seed_story(&store, "s1").await;
        let created = suggestion("s1", "ctx");
        store.insert_suggestion(&created).await.unwrap();

        let entry = TextEntry::with_description("final text.");
        assert!(store.finalize_suggestion(created.uuid, &entry).await.unwrap());
        assert!(!store.finalize_suggestion(created.uuid, &entry).await.unwrap());

        let row = store
            .get_suggestion_by_uuid(created.uuid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.finalized.unwrap().description(), "final text.");
    }

    #[tokio::test]
    async fn usage_counts_only_the_current_period() {
        let store = Store::in_memory().await.unwrap();
        seed_story(&store, "s1").await;
        let generator = store
            .insert_generator(
                "http://a",
                "a",
                SuggestionType::SceneEntry,
                GeneratorStatus::Active,
                10,
            )
            .await
            .unwrap();
        store.insert_assignment(generator, "s1").await.unwrap();

        let mut current = suggestion("s1", "ctx-now");
        current.created_at = Utc::now();
        store.insert_suggestion(&current).await.unwrap();

        let mut stale = suggestion("s1", "ctx-old");
        stale.created_at = Utc::now() - Duration::days(60);
        store.insert_suggestion(&stale).await.unwrap();

        let since = Utc::now() - Duration::days(30);
        assert_eq!(
            store.generator_usage_since(generator, since).await.unwrap(),
            1
        );
    }
}
