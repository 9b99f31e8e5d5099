//! The relation-candidate generator collaborator.
//!
//! Candidate generation (NER + relation classification) lives outside this
//! system; here we only define its I/O contract and the clients that speak
//! it. Calls may fail transiently — the retry wrapper absorbs a bounded
//! number of failures with exponential backoff before giving up on a pair.

use async_trait::async_trait;
use relgraph_core::{CandidateSource, RelationCandidate};
use std::time::Duration;

/// Tunables for talking to the external generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Inference service endpoint (HTTP generator only).
    pub endpoint: String,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Retries after the first failure.
    pub max_retries: u32,
    /// Base backoff delay; doubles per attempt.
    pub backoff_base: Duration,
    /// Worker-pool width for per-pair fan-out within one iteration.
    pub concurrency: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/predict".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: Duration::from_millis(250),
            concurrency: 4,
        }
    }
}

/// Produces one relation candidate for an entity pair in a sentence.
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    async fn generate(
        &self,
        sentence: &str,
        head: &str,
        tail: &str,
    ) -> anyhow::Result<RelationCandidate>;
}

/// Call the generator with timeout, bounded retries, and exponential
/// backoff. Returns `None` once the budget is exhausted — the pair is
/// dropped with a warning, never fatal to the iteration.
pub async fn generate_with_retry(
    generator: &dyn CandidateGenerator,
    config: &GeneratorConfig,
    sentence: &str,
    head: &str,
    tail: &str,
) -> Option<RelationCandidate> {
    let mut last_error = String::new();
    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            tokio::time::sleep(config.backoff_base * 2u32.pow(attempt - 1)).await;
        }
        match tokio::time::timeout(config.timeout, generator.generate(sentence, head, tail)).await
        {
            Ok(Ok(candidate)) => return Some(candidate),
            Ok(Err(err)) => last_error = err.to_string(),
            Err(_) => last_error = format!("timed out after {:?}", config.timeout),
        }
    }
    tracing::warn!(
        head,
        tail,
        error = %last_error,
        "dropping entity pair after exhausting generator retries"
    );
    None
}

// ============================================================================
// Mock generator (tests, dry runs)
// ============================================================================

/// In-memory generator keyed by `(head, tail)`.
///
/// Pairs missing from the table come back as `"none"`, which reconciliation
/// drops — an empty mock therefore drives the loop straight to convergence.
pub struct MockGenerator {
    relations: std::collections::HashMap<(String, String), (String, f64)>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockGenerator {
    pub fn empty() -> Self {
        Self {
            relations: std::collections::HashMap::new(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn with_relations(
        relations: impl IntoIterator<Item = ((String, String), (String, f64))>,
    ) -> Self {
        Self {
            relations: relations.into_iter().collect(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateGenerator for MockGenerator {
    async fn generate(
        &self,
        sentence: &str,
        head: &str,
        tail: &str,
    ) -> anyhow::Result<RelationCandidate> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let (relation, confidence) = self
            .relations
            .get(&(head.to_string(), tail.to_string()))
            .cloned()
            .unwrap_or_else(|| ("none".to_string(), 0.0));
        Ok(RelationCandidate {
            sentence: sentence.to_string(),
            head: head.to_string(),
            tail: tail.to_string(),
            relation,
            confidence: Some(confidence),
            iteration: 0,
            source: CandidateSource::Generated,
        })
    }
}

// ============================================================================
// HTTP generator (external inference service)
// ============================================================================

#[cfg(feature = "http-generator")]
pub use http::HttpGenerator;

#[cfg(feature = "http-generator")]
mod http {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize)]
    struct PredictRequest<'a> {
        sentence: &'a str,
        head: &'a str,
        tail: &'a str,
    }

    #[derive(Deserialize)]
    struct PredictResponse {
        relation: String,
        #[serde(default)]
        confidence: Option<f64>,
    }

    /// Client for an HTTP relation-prediction service.
    ///
    /// POSTs `{sentence, head, tail}` and expects `{relation, confidence}`.
    pub struct HttpGenerator {
        client: reqwest::Client,
        endpoint: String,
    }

    impl HttpGenerator {
        pub fn new(config: &GeneratorConfig) -> anyhow::Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(config.timeout)
                .build()?;
            Ok(Self {
                client,
                endpoint: config.endpoint.clone(),
            })
        }
    }

    #[async_trait]
    impl CandidateGenerator for HttpGenerator {
        async fn generate(
            &self,
            sentence: &str,
            head: &str,
            tail: &str,
        ) -> anyhow::Result<RelationCandidate> {
            let response = self
                .client
                .post(&self.endpoint)
                .json(&PredictRequest { sentence, head, tail })
                .send()
                .await?
                .error_for_status()?
                .json::<PredictResponse>()
                .await?;

            Ok(RelationCandidate {
                sentence: sentence.to_string(),
                head: head.to_string(),
                tail: tail.to_string(),
                relation: response.relation,
                confidence: response.confidence,
                iteration: 0,
                source: CandidateSource::Generated,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakyGenerator {
        fail_first: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl CandidateGenerator for FlakyGenerator {
        async fn generate(
            &self,
            sentence: &str,
            head: &str,
            tail: &str,
        ) -> anyhow::Result<RelationCandidate> {
            if self
                .fail_first
                .fetch_update(
                    std::sync::atomic::Ordering::SeqCst,
                    std::sync::atomic::Ordering::SeqCst,
                    |n| n.checked_sub(1),
                )
                .is_ok()
            {
                anyhow::bail!("connection reset");
            }
            Ok(RelationCandidate {
                sentence: sentence.to_string(),
                head: head.to_string(),
                tail: tail.to_string(),
                relation: "依赖".to_string(),
                confidence: Some(0.9),
                iteration: 0,
                source: CandidateSource::Generated,
            })
        }
    }

    fn fast_config() -> GeneratorConfig {
        GeneratorConfig {
            backoff_base: Duration::from_millis(1),
            timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failures() {
        let generator = FlakyGenerator {
            fail_first: std::sync::atomic::AtomicU32::new(2),
        };
        let candidate =
            generate_with_retry(&generator, &fast_config(), "s", "数组", "查找").await;
        assert!(candidate.is_some());
    }

    #[tokio::test]
    async fn retry_gives_up_after_budget() {
        let generator = FlakyGenerator {
            fail_first: std::sync::atomic::AtomicU32::new(100),
        };
        let candidate =
            generate_with_retry(&generator, &fast_config(), "s", "数组", "查找").await;
        assert!(candidate.is_none());
    }

    #[tokio::test]
    async fn mock_returns_none_for_unknown_pairs() {
        let generator = MockGenerator::empty();
        let candidate = generator.generate("s", "a", "b").await.unwrap();
        assert_eq!(candidate.relation, "none");
        assert_eq!(generator.call_count(), 1);
    }
}
