//! Row records and explicit record ↔ entity mapping.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use spindle_domain::entities::{
    Assignment, Generator, GeneratorStatus, Story, StoryStatus, Suggestion, SuggestionStatus,
    SuggestionType, TextEntry,
};
use spindle_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, FromRow)]
pub struct StoryRecord {
    pub hash: String,
    pub content: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct GeneratorRecord {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub suggestion_type: String,
    pub status: String,
    pub quota: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct AssignmentRecord {
    pub generator_id: i64,
    pub story_hash: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct SuggestionRecord {
    pub id: i64,
    pub uuid: String,
    pub story_hash: String,
    pub suggestion_type: String,
    pub context_hash: String,
    pub context: String,
    pub generated: String,
    pub finalized: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl StoryRecord {
    pub fn into_story(self) -> Result<Story> {
        Ok(Story {
            status: StoryStatus::parse(&self.status)?,
            content: serde_json::from_str(&self.content)?,
            hash: self.hash,
            created_at: self.created_at,
        })
    }
}

impl GeneratorRecord {
    pub fn into_generator(self) -> Result<Generator> {
        Ok(Generator {
            suggestion_type: SuggestionType::parse(&self.suggestion_type)?,
            status: GeneratorStatus::parse(&self.status)?,
            id: self.id,
            url: self.url,
            name: self.name,
            quota: self.quota,
        })
    }
}

impl AssignmentRecord {
    pub fn into_assignment(self) -> Assignment {
        Assignment {
            generator_id: self.generator_id,
            story_hash: self.story_hash,
        }
    }
}

impl SuggestionRecord {
    pub fn into_suggestion(self) -> Result<Suggestion> {
        let uuid = Uuid::parse_str(&self.uuid)
            .map_err(|e| Error::Data(format!("bad suggestion uuid '{}': {e}", self.uuid)))?;
        let context: TextEntry = serde_json::from_str(&self.context)?;
        let generated: TextEntry = serde_json::from_str(&self.generated)?;
        let finalized = match self.finalized {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };

        Ok(Suggestion {
            uuid,
            suggestion_type: SuggestionType::parse(&self.suggestion_type)?,
            status: SuggestionStatus::parse(&self.status)?,
            story_hash: self.story_hash,
            context_hash: self.context_hash,
            context,
            generated,
            finalized,
            created_at: self.created_at,
        })
    }
}
