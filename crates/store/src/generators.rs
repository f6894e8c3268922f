//! Generator registry queries: the load balancer and assignment records.

use tracing::debug;

use spindle_domain::entities::{Assignment, Generator, GeneratorStatus, StoryStatus, SuggestionType};
use spindle_domain::Result;

use crate::records::{AssignmentRecord, GeneratorRecord};
use crate::Store;

/// Per-generator assignment counts, per-type minimums, then every active
/// generator sitting at its type's minimum. All ties are returned so the
/// caller may pick any of them.
const LOAD_BALANCE_QUERY: &str = r#"
WITH
    story_totals AS (
        SELECT
            g.id,
            g.url,
            g.name,
            g.suggestion_type,
            g.status,
            g.quota,
            COUNT(a.story_hash) AS story_count
        FROM generators AS g
            LEFT JOIN generator_for_story AS a ON g.id = a.generator_id
        WHERE g.status = 'active'
        GROUP BY g.id
    ),
    min_counts AS (
        SELECT suggestion_type, MIN(story_count) AS min_count
        FROM story_totals
        GROUP BY suggestion_type
    )
SELECT st.id, st.url, st.name, st.suggestion_type, st.status, st.quota
FROM story_totals AS st
    JOIN min_counts AS mc ON mc.suggestion_type = st.suggestion_type
WHERE st.story_count = mc.min_count
"#;

impl Store {
    /// The least-loaded active generators, per suggestion type.
    ///
    /// Runs as a single aggregate query so the counts are read from one
    /// consistent snapshot. Empty when no generator of a type is active —
    /// callers must treat that as "no capacity".
    pub async fn select_least_loaded(&self) -> Result<Vec<Generator>> {
        debug!("selecting least-loaded active generators");
        let records = sqlx::query_as::<_, GeneratorRecord>(LOAD_BALANCE_QUERY)
            .fetch_all(self.pool())
            .await?;
        records
            .into_iter()
            .map(GeneratorRecord::into_generator)
            .collect()
    }

    pub async fn get_generator(&self, id: i64) -> Result<Option<Generator>> {
        let record =
            sqlx::query_as::<_, GeneratorRecord>("SELECT * FROM generators WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        record.map(GeneratorRecord::into_generator).transpose()
    }

    /// Register a generator. Registration is an out-of-band operator
    /// action; the orchestration core only reads these rows.
    pub async fn insert_generator(
        &self,
        url: &str,
        name: &str,
        suggestion_type: SuggestionType,
        status: GeneratorStatus,
        quota: i64,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO generators (url, name, suggestion_type, status, quota)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(url)
        .bind(name)
        .bind(suggestion_type.as_str())
        .bind(status.as_str())
        .bind(quota)
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn set_generator_status(&self, id: i64, status: GeneratorStatus) -> Result<()> {
        sqlx::query("UPDATE generators SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Record that a generator preprocessed a story. Idempotent on the
    /// unique `(generator, story)` pair.
    pub async fn insert_assignment(&self, generator_id: i64, story_hash: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO generator_for_story (generator_id, story_hash) VALUES (?, ?)",
        )
        .bind(generator_id)
        .bind(story_hash)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    // TODO: look up by (story, suggestion_type) once a second suggestion
    // type exists; a story can then hold one assignment per type.
    pub async fn get_assignment_for_story(&self, story_hash: &str) -> Result<Option<Assignment>> {
        let record = sqlx::query_as::<_, AssignmentRecord>(
            "SELECT generator_id, story_hash FROM generator_for_story WHERE story_hash = ?",
        )
        .bind(story_hash)
        .fetch_optional(self.pool())
        .await?;
        Ok(record.map(AssignmentRecord::into_assignment))
    }

    /// Atomically move a story's assignment from one generator to another
    /// and mark the story ready.
    ///
    /// Single transaction: at no point does the story have zero or two
    /// assignments for the same generator.
    pub async fn swap_assignment(
        &self,
        old_generator_id: i64,
        new_generator_id: i64,
        story_hash: &str,
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM generator_for_story WHERE generator_id = ? AND story_hash = ?")
            .bind(old_generator_id)
            .bind(story_hash)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT OR IGNORE INTO generator_for_story (generator_id, story_hash) VALUES (?, ?)",
        )
        .bind(new_generator_id)
        .bind(story_hash)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE stories SET status = ? WHERE hash = ?")
            .bind(StoryStatus::Ready.as_str())
            .bind(story_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use spindle_domain::entities::Story;

    async fn seed_story(store: &Store, hash: &str) {
        store
            .insert_story(&Story {
                hash: hash.to_string(),
                content: json!({"n": hash}),
                status: spindle_domain::entities::StoryStatus::Ready,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    async fn seed_generator(store: &Store, url: &str, status: GeneratorStatus) -> i64 {
        store
            .insert_generator(url, url, SuggestionType::SceneEntry, status, -1)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn least_loaded_returns_minimum_only() {
        let store = Store::in_memory().await.unwrap();
        let a = seed_generator(&store, "http://a", GeneratorStatus::Active).await;
        let b = seed_generator(&store, "http://b", GeneratorStatus::Active).await;
        let c = seed_generator(&store, "http://c", GeneratorStatus::Active).await;

        for hash in ["s1", "s2", "s3"] {
            seed_story(&store, hash).await;
        }
        // A carries two stories, B one, C none.
        store.insert_assignment(a, "s1").await.unwrap();
        store.insert_assignment(a, "s2").await.unwrap();
        store.insert_assignment(b, "s3").await.unwrap();

        let selected = store.select_least_loaded().await.unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, c);
    }

    #[tokio::test]
    async fn least_loaded_returns_all_ties() {
        let store = Store::in_memory().await.unwrap();
        let a = seed_generator(&store, "http://a", GeneratorStatus::Active).await;
        let b = seed_generator(&store, "http://b", GeneratorStatus::Active).await;

        let selected = store.select_least_loaded().await.unwrap();
        let mut ids: Vec<i64> = selected.iter().map(|g| g.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![a, b]);
    }

    #[tokio::test]
    async fn inactive_generators_are_excluded() {
        let store = Store::in_memory().await.unwrap();
        seed_generator(&store, "http://a", GeneratorStatus::Inactive).await;
        assert!(store.select_least_loaded().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn swap_moves_the_assignment_and_readies_the_story() {
        let store = Store::in_memory().await.unwrap();
        let a = seed_generator(&store, "http://a", GeneratorStatus::Active).await;
        let b = seed_generator(&store, "http://b", GeneratorStatus::Active).await;
        seed_story(&store, "s1").await;
        store.insert_assignment(a, "s1").await.unwrap();

        store.swap_assignment(a, b, "s1").await.unwrap();

        let assignment = store.get_assignment_for_story("s1").await.unwrap().unwrap();
        assert_eq!(assignment.generator_id, b);
        assert_eq!(
            store.get_story_status("s1").await.unwrap(),
            Some(spindle_domain::entities::StoryStatus::Ready)
        );
    }

    #[tokio::test]
    async fn duplicate_assignments_are_ignored() {
        let store = Store::in_memory().await.unwrap();
        let a = seed_generator(&store, "http://a", GeneratorStatus::Active).await;
        seed_story(&store, "s1").await;
        store.insert_assignment(a, "s1").await.unwrap();
        store.insert_assignment(a, "s1").await.unwrap();

        let selected = store.select_least_loaded().await.unwrap();
        // Still one assignment: A holds one story.
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, a);
    }
}
