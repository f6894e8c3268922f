use serde_json::Value;

use spindle_domain::entities::{Generator, Suggestion};
use spindle_domain::range::Range;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of a generation call: an HTTP-style status and the candidate
/// next text entry.
///
/// Connection-level failures surface as a synthetic 503 carrying the
/// suggestion's current `generated` entry, so the caller's no-progress
/// and failure handling apply uniformly.
#[derive(Debug, Clone)]
pub struct FigmentOutcome {
    pub status: u16,
    pub entry: Value,
}

impl FigmentOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the backend signaled a complete (non-partial) result.
    pub fn is_final(&self) -> bool {
        self.status == 200
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every generator transport must implement.
///
/// The production implementation speaks HTTP ([`crate::http`]); tests
/// substitute scripted doubles.
#[async_trait::async_trait]
pub trait GeneratorClient: Send + Sync {
    /// Ask a generator to preprocess a story snapshot. Returns `true` on
    /// success; connection failures count as failure.
    async fn snapshot(&self, generator: &Generator, story_id: &str, story: &Value) -> bool;

    /// Request the next chunk of a suggestion, addressed by `range`.
    async fn figment(
        &self,
        generator: &Generator,
        suggestion: &Suggestion,
        range: &Range,
    ) -> FigmentOutcome;
}
