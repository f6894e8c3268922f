//! Story persistence.

use chrono::{DateTime, Utc};
use tracing::debug;

use spindle_domain::entities::{Story, StoryStatus};
use spindle_domain::hash::canonical_json;
use spindle_domain::Result;

use crate::records::StoryRecord;
use crate::Store;

impl Store {
    pub async fn insert_story(&self, story: &Story) -> Result<()> {
        sqlx::query(
            "INSERT INTO stories (hash, content, status, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&story.hash)
        .bind(canonical_json(&story.content))
        .bind(story.status.as_str())
        .bind(story.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Rewrite an existing story row; used when identical content is
    /// re-submitted after a preprocessing failure.
    pub async fn update_story(&self, story: &Story) -> Result<()> {
        sqlx::query(
            "UPDATE stories SET content = ?, status = ?, created_at = ? WHERE hash = ?",
        )
        .bind(canonical_json(&story.content))
        .bind(story.status.as_str())
        .bind(story.created_at)
        .bind(&story.hash)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn set_story_status(&self, hash: &str, status: StoryStatus) -> Result<()> {
        sqlx::query("UPDATE stories SET status = ? WHERE hash = ?")
            .bind(status.as_str())
            .bind(hash)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn get_story(&self, hash: &str) -> Result<Option<Story>> {
        let record = sqlx::query_as::<_, StoryRecord>("SELECT * FROM stories WHERE hash = ?")
            .bind(hash)
            .fetch_optional(self.pool())
            .await?;
        record.map(StoryRecord::into_story).transpose()
    }

    pub async fn get_story_status(&self, hash: &str) -> Result<Option<StoryStatus>> {
        Ok(self.get_story(hash).await?.map(|s| s.status))
    }

    /// Expire abandoned pending stories older than `cutoff` that never got
    /// a suggestion. Returns how many rows were removed.
    pub async fn expire_pending_stories(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM stories
            WHERE status = 'pending'
              AND created_at < ?
              AND hash NOT IN (SELECT DISTINCT story_hash FROM suggestions)
            "#,
        )
        .bind(cutoff)
        .execute(self.pool())
        .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            debug!(removed, "expired abandoned pending stories");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn story(hash: &str, status: StoryStatus) -> Story {
        Story {
            hash: hash.to_string(),
            content: json!({"text": "hello"}),
            status,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_roundtrip() {
        let store = Store::in_memory().await.unwrap();
        store
            .insert_story(&story("h1", StoryStatus::Pending))
            .await
            .unwrap();

        let fetched = store.get_story("h1").await.unwrap().unwrap();
        assert_eq!(fetched.hash, "h1");
        assert_eq!(fetched.status, StoryStatus::Pending);
        assert_eq!(fetched.content, json!({"text": "hello"}));
        assert!(store.get_story("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_transitions_persist() {
        let store = Store::in_memory().await.unwrap();
        store
            .insert_story(&story("h1", StoryStatus::Pending))
            .await
            .unwrap();
        store
            .set_story_status("h1", StoryStatus::Ready)
            .await
            .unwrap();
        assert_eq!(
            store.get_story_status("h1").await.unwrap(),
            Some(StoryStatus::Ready)
        );
    }

    #[tokio::test]
    async fn expire_skips_fresh_and_referenced_stories() {
        let store = Store::in_memory().await.unwrap();
        let mut old = story("old", StoryStatus::Pending);
        old.created_at = Utc::now() - Duration::hours(48);
        store.insert_story(&old).await.unwrap();
        store
            .insert_story(&story("fresh", StoryStatus::Pending))
            .await
            .unwrap();

        let cutoff = Utc::now() - Duration::hours(24);
        let removed = store.expire_pending_stories(cutoff).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_story("old").await.unwrap().is_none());
        assert!(store.get_story("fresh").await.unwrap().is_some());
    }
}
