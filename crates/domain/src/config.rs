use serde::{Deserialize, Serialize};

use crate::range::RangeUnit;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Aggregated engine configuration, passed explicitly into the runner and
/// the orchestration operations. There is no global settings object.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generation limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Limits for a single suggestion: the unit ranges are measured in, the
/// total cap, and how much to request per generation round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_unit")]
    pub unit: RangeUnit,
    /// Maximum suggestion length, in `unit`s.
    #[serde(default = "default_max_length")]
    pub max_length: u64,
    /// How many `unit`s to request from a generator per round.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            unit: default_unit(),
            max_length: default_max_length(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl GenerationConfig {
    /// Clamp the limits to sane minimums (at least one unit per round).
    pub fn clamped(&self) -> Self {
        let chunk_size = self.chunk_size.max(1);
        Self {
            unit: self.unit,
            max_length: self.max_length.max(chunk_size),
            chunk_size,
        }
    }
}

fn default_unit() -> RangeUnit {
    RangeUnit::Words
}

fn default_max_length() -> u64 {
    250
}

fn default_chunk_size() -> u64 {
    50
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task retry policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bounded retry with exponential backoff for retryable task failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per task, including the first. Clamped to `1..`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff before the second attempt; doubles per attempt.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

impl RetryConfig {
    /// Backoff delay before the given (1-based) attempt number.
    pub fn backoff_for(&self, attempt: u32) -> std::time::Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let secs = self.backoff_secs.max(0.0) * f64::from(1u32 << exp);
        std::time::Duration::from_secs_f64(secs)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_secs() -> f64 {
    0.25
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backend HTTP settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Settings for outbound calls to generator backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Story cleanup
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Periodic expiry of abandoned `pending` stories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// How often the cleanup loop runs.
    #[serde(default = "default_cleanup_interval_secs")]
    pub interval_secs: u64,
    /// Age after which a pending story with no suggestions is expired.
    #[serde(default = "default_pending_ttl_secs")]
    pub pending_ttl_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval_secs(),
            pending_ttl_secs: default_pending_ttl_secs(),
        }
    }
}

fn default_cleanup_interval_secs() -> u64 {
    86_400
}

fn default_pending_ttl_secs() -> u64 {
    86_400
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_defaults() {
        let cfg = GenerationConfig::default();
        assert_eq!(cfg.unit, RangeUnit::Words);
        assert_eq!(cfg.max_length, 250);
        assert_eq!(cfg.chunk_size, 50);
    }

    #[test]
    fn retry_defaults() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.backoff_secs, 0.25);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.backoff_for(1).as_millis(), 250);
        assert_eq!(cfg.backoff_for(2).as_millis(), 500);
        assert_eq!(cfg.backoff_for(3).as_millis(), 1000);
    }

    #[test]
    fn clamp_zero_chunk_size() {
        let cfg = GenerationConfig {
            unit: RangeUnit::Words,
            max_length: 0,
            chunk_size: 0,
        }
        .clamped();
        assert_eq!(cfg.chunk_size, 1);
        assert_eq!(cfg.max_length, 1);
    }

    #[test]
    fn deserialize_missing_fields_use_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.generation.max_length, 250);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.backend.request_timeout_secs, 30);
        assert_eq!(cfg.cleanup.pending_ttl_secs, 86_400);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.generation.chunk_size, cfg.generation.chunk_size);
        assert_eq!(back.retry.backoff_secs, cfg.retry.backoff_secs);
    }
}
