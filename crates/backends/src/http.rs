//! HTTP adapter for generator backends.
//!
//! Wire contract: `POST {endpoint}/story/snapshot` primes a story;
//! `POST {endpoint}/figment/{story}/new?suggestion_type=T` requests the
//! next chunk, with the span encoded in a `Range` header. 200 means a
//! final chunk, 206 a partial one, 404 a missing snapshot.

use serde_json::{json, Value};
use tracing::warn;

use spindle_domain::entities::{Generator, Suggestion};
use spindle_domain::range::Range;
use spindle_domain::{config::BackendConfig, Error, Result};

use crate::traits::{FigmentOutcome, GeneratorClient};

pub struct HttpGeneratorClient {
    client: reqwest::Client,
}

impl HttpGeneratorClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { client })
    }

    fn endpoint(generator: &Generator, path: &str) -> String {
        format!("{}/{}", generator.url.trim_end_matches('/'), path)
    }
}

#[async_trait::async_trait]
impl GeneratorClient for HttpGeneratorClient {
    async fn snapshot(&self, generator: &Generator, story_id: &str, story: &Value) -> bool {
        let url = Self::endpoint(generator, "story/snapshot");
        let body = json!({ "story_id": story_id, "story": story });

        match self.client.post(&url).json(&body).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                warn!(generator = %generator.url, error = %e, "snapshot request failed");
                false
            }
        }
    }

    async fn figment(
        &self,
        generator: &Generator,
        suggestion: &Suggestion,
        range: &Range,
    ) -> FigmentOutcome {
        let url = Self::endpoint(
            generator,
            &format!("figment/{}/new", suggestion.story_hash),
        );
        // The current entry never fails to serialize; fall back to an
        // empty object out of caution.
        let fallback = serde_json::to_value(&suggestion.generated).unwrap_or_else(|_| json!({}));

        let request = self
            .client
            .post(&url)
            .query(&[("suggestion_type", suggestion.suggestion_type.as_str())])
            .header("Range", range.to_string())
            .json(&suggestion.generated);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                // Connection-level failure: same treatment as a 503.
                warn!(generator = %generator.url, error = %e, "figment request failed");
                return FigmentOutcome {
                    status: 503,
                    entry: fallback,
                };
            }
        };

        let status = response.status().as_u16();
        match response.json::<Value>().await {
            Ok(entry) => FigmentOutcome { status, entry },
            Err(e) if (200..300).contains(&status) => {
                // A success status with an unreadable body is a transport
                // fault, not a semantic error from the generator.
                warn!(generator = %generator.url, error = %e, "unreadable figment payload");
                FigmentOutcome {
                    status: 503,
                    entry: fallback,
                }
            }
            Err(_) => FigmentOutcome {
                status,
                entry: fallback,
            },
        }
    }
}
