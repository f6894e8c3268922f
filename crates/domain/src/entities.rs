//! Core entities: stories, generators, assignments, and suggestions.
//!
//! These are explicit, statically declared structs; mapping to and from
//! storage rows lives in the store crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Story
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    Pending,
    Ready,
    Failed,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::Pending => "pending",
            StoryStatus::Ready => "ready",
            StoryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(StoryStatus::Pending),
            "ready" => Ok(StoryStatus::Ready),
            "failed" => Ok(StoryStatus::Failed),
            other => Err(Error::Data(format!("unknown story status '{other}'"))),
        }
    }
}

/// The shared narrative context suggestions are generated against.
/// Created once per unique content; the content hash is the identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub hash: String,
    pub content: Value,
    pub status: StoryStatus,
    pub created_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorStatus {
    Active,
    Inactive,
}

impl GeneratorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorStatus::Active => "active",
            GeneratorStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(GeneratorStatus::Active),
            "inactive" => Ok(GeneratorStatus::Inactive),
            other => Err(Error::Data(format!("unknown generator status '{other}'"))),
        }
    }
}

/// An external backend service that produces suggestion text.
///
/// Registered out-of-band; read-only to the orchestration core except for
/// status flips by operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    pub id: i64,
    /// Base endpoint URL; unique per generator.
    pub url: String,
    pub name: String,
    pub suggestion_type: SuggestionType,
    pub status: GeneratorStatus,
    /// Suggestions allowed per billing period; negative means unlimited.
    pub quota: i64,
}

/// Records that a generator has successfully preprocessed a story and is
/// therefore eligible to generate suggestions for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub generator_id: i64,
    pub story_hash: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Suggestion
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    SceneEntry,
}

impl SuggestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionType::SceneEntry => "scene_entry",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "scene_entry" => Ok(SuggestionType::SceneEntry),
            other => Err(Error::Data(format!("unknown suggestion type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Executing,
    Failed,
    Done,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Executing => "executing",
            SuggestionStatus::Failed => "failed",
            SuggestionStatus::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SuggestionStatus::Pending),
            "executing" => Ok(SuggestionStatus::Executing),
            "failed" => Ok(SuggestionStatus::Failed),
            "done" => Ok(SuggestionStatus::Done),
            other => Err(Error::Data(format!("unknown suggestion status '{other}'"))),
        }
    }
}

/// The text-entry payload exchanged with generator backends.
///
/// Only `description` carries the generated text; any other fields a
/// backend includes are preserved round-trip as opaque JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl TextEntry {
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            extra: serde_json::Map::new(),
        }
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// Decode a backend payload, or fail with a validation error.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::Validation(format!("invalid text entry: {e}")))
    }
}

/// One requested generation task tied to a story and a context snapshot.
///
/// Unique per `(context_hash, story_hash, suggestion_type)`; mutated only
/// by the generation state machine until it reaches `done` or `failed`.
/// `finalized` is set exactly once afterwards by the feedback subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub uuid: Uuid,
    pub story_hash: String,
    pub suggestion_type: SuggestionType,
    pub context_hash: String,
    /// The input span the suggestion was requested against.
    pub context: TextEntry,
    /// The current best generated output span.
    pub generated: TextEntry,
    pub finalized: Option<TextEntry>,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
}
