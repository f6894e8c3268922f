//! Background task execution with bounded retries.
//!
//! The runner spawns orchestration tasks onto the tokio runtime and keeps
//! their join handles so tests (and graceful shutdown) can wait for the
//! whole task tree with [`Runner::quiesce`]. Retryable failures back off
//! exponentially per [`RetryConfig`]; exhaustion persists a terminal
//! `failed` state so no record is left stuck in flight.
//!
//! [`RetryConfig`]: spindle_domain::config::RetryConfig

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use spindle_backends::GeneratorClient;
use spindle_domain::config::EngineConfig;
use spindle_domain::entities::{
    Generator, StoryStatus, Suggestion, SuggestionStatus, SuggestionType,
};
use spindle_domain::Result;
use spindle_store::Store;

use crate::{generation, stories};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shared handle to the engine's task executor. Cheap to clone.
#[derive(Clone)]
pub struct Runner {
    inner: Arc<Inner>,
}

struct Inner {
    store: Store,
    client: Arc<dyn GeneratorClient>,
    config: EngineConfig,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Runner {
    pub fn new(store: Store, client: Arc<dyn GeneratorClient>, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                client,
                config,
                handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    fn client(&self) -> &dyn GeneratorClient {
        self.inner.client.as_ref()
    }

    fn track(&self, handle: JoinHandle<()>) {
        self.inner.handles.lock().push(handle);
    }

    /// Wait for every in-flight task, including tasks those tasks spawn.
    pub async fn quiesce(&self) {
        loop {
            let drained: Vec<JoinHandle<()>> =
                { self.inner.handles.lock().drain(..).collect() };
            if drained.is_empty() {
                return;
            }
            for handle in drained {
                let _ = handle.await;
            }
        }
    }

    // ── Task scheduling ──

    /// Preprocess a story on its candidate generators. Exhausted retries
    /// leave the story `failed`.
    pub fn schedule_preprocess(&self, story_hash: String, generators: Vec<Generator>) {
        let runner = self.clone();
        self.track(tokio::spawn(async move {
            let outcome = runner
                .with_retries("preprocess_story", || {
                    stories::process_story(
                        runner.store(),
                        runner.client(),
                        &story_hash,
                        &generators,
                    )
                })
                .await;
            if let Err(e) = outcome {
                error!(story = %story_hash, error = %e, "preprocessing failed permanently");
                if let Err(e) = runner
                    .store()
                    .set_story_status(&story_hash, StoryStatus::Failed)
                    .await
                {
                    error!(story = %story_hash, error = %e, "could not mark story failed");
                }
            }
        }));
    }

    /// Start generating a freshly created suggestion. Exhausted retries
    /// leave the suggestion `failed`.
    pub fn schedule_create(
        &self,
        story_hash: String,
        context_hash: String,
        suggestion_type: SuggestionType,
    ) {
        let runner = self.clone();
        self.track(tokio::spawn(async move {
            let outcome = runner
                .with_retries("create_suggestion", || {
                    generation::start_suggestion(
                        runner.store(),
                        runner.client(),
                        &story_hash,
                        &context_hash,
                        suggestion_type,
                    )
                })
                .await;
            match outcome {
                Ok((suggestion, generator)) => runner.schedule_round(suggestion, generator),
                Err(e) => {
                    error!(story = %story_hash, error = %e, "suggestion start failed permanently");
                    runner
                        .mark_suggestion_failed(&story_hash, &context_hash, suggestion_type)
                        .await;
                }
            }
        }));
    }

    /// Run one generation round, then re-enqueue the next while the
    /// suggestion is still growing.
    fn schedule_round(&self, suggestion: Suggestion, generator: Generator) {
        let runner = self.clone();
        self.track(tokio::spawn(async move {
            let outcome = runner
                .with_retries("generate_round", || {
                    generation::generate_round(
                        runner.store(),
                        runner.client(),
                        &runner.inner.config.generation,
                        suggestion.clone(),
                        &generator,
                    )
                })
                .await;
            match outcome {
                Ok(Some(updated)) => runner.schedule_round(updated, generator),
                Ok(None) => {}
                Err(e) => {
                    // generate_round persists the failed status itself;
                    // nothing further to write.
                    error!(suggestion = %suggestion.uuid, error = %e, "generation failed permanently");
                }
            }
        }));
    }

    /// Periodically expire abandoned `pending` stories. The loop runs for
    /// the life of the runtime; the handle is returned for callers that
    /// want to abort it.
    pub fn spawn_cleanup(&self) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move {
            let cfg = runner.inner.config.cleanup.clone();
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
                cfg.interval_secs.max(1),
            ));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let cutoff =
                    chrono::Utc::now() - chrono::Duration::seconds(cfg.pending_ttl_secs as i64);
                match runner.store().expire_pending_stories(cutoff).await {
                    Ok(expired) if expired > 0 => info!(expired, "expired abandoned stories"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "story cleanup failed"),
                }
            }
        })
    }

    // ── Internals ──

    async fn with_retries<T, F, Fut>(&self, task: &str, mut run: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let retry = &self.inner.config.retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match run().await {
                Ok(value) => return Ok(value),
                Err(e) if e.retryable() && attempt < max_attempts => {
                    warn!(task, attempt, error = %e, "task failed, retrying");
                    tokio::time::sleep(retry.backoff_for(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn mark_suggestion_failed(
        &self,
        story_hash: &str,
        context_hash: &str,
        suggestion_type: SuggestionType,
    ) {
        let found = self
            .store()
            .get_suggestion_by_context(story_hash, context_hash, suggestion_type)
            .await;
        match found {
            Ok(Some(suggestion)) => {
                if let Err(e) = self
                    .store()
                    .set_suggestion_status(suggestion.uuid, SuggestionStatus::Failed)
                    .await
                {
                    error!(suggestion = %suggestion.uuid, error = %e, "could not mark suggestion failed");
                }
            }
            Ok(None) => {}
            Err(e) => error!(story = %story_hash, error = %e, "could not load suggestion to fail it"),
        }
    }
}
