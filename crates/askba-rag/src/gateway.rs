//! Model gateway: ordered fallback across generation models

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use askba_core::{Error, GenerationConfig, LLMProvider, ModelFailure, PromptSpec, Result};

/// Text produced by the first model that succeeded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub model_id: String,
    /// Candidates that failed before `model_id` succeeded, in order
    pub failures: Vec<ModelFailure>,
}

/// Fallback traversal over the preference list
#[derive(Debug)]
enum FallbackState {
    Pending {
        remaining: VecDeque<String>,
        failures: Vec<ModelFailure>,
    },
    Success(Generation),
    Exhausted(Vec<ModelFailure>),
}

/// Invokes a provider with an ordered list of model candidates.
///
/// Candidates are tried strictly one after another, each at most once. A
/// candidate failure is logged and recorded, and the next one is tried; only
/// exhaustion of the list or the deadline reaches the caller.
#[derive(Clone)]
pub struct ModelGateway {
    provider: Arc<dyn LLMProvider>,
    models: Vec<String>,
    deadline: Duration,
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn LLMProvider>, models: Vec<String>, deadline: Duration) -> Self {
        Self {
            provider,
            models,
            deadline,
        }
    }

    /// Configured model preference list
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Generate with the configured preference list
    pub async fn generate(&self, prompt: &PromptSpec) -> Result<Generation> {
        self.generate_with_models(prompt, &self.models).await
    }

    /// Generate with an explicit preference list
    pub async fn generate_with_models(&self, prompt: &PromptSpec, models: &[String]) -> Result<Generation> {
        let started = Instant::now();
        let deadline = started + self.deadline;
        let mut state = FallbackState::Pending {
            remaining: models.iter().cloned().collect(),
            failures: Vec::new(),
        };

        loop {
            state = match state {
                FallbackState::Success(generation) => {
                    info!(
                        model = %generation.model_id,
                        verbosity = %prompt.verbosity,
                        failed_candidates = generation.failures.len(),
                        "Generation succeeded"
                    );
                    return Ok(generation);
                }
                FallbackState::Exhausted(failures) => {
                    return Err(Error::GenerationUnavailable { failures });
                }
                FallbackState::Pending { remaining, failures } => {
                    self.step(prompt, remaining, failures, started, deadline).await?
                }
            };
        }
    }

    /// Try the head of the remaining candidates.
    ///
    /// Returns an error only when the deadline passes; every other outcome is
    /// a state transition.
    async fn step(
        &self,
        prompt: &PromptSpec,
        mut remaining: VecDeque<String>,
        mut failures: Vec<ModelFailure>,
        started: Instant,
        deadline: Instant,
    ) -> Result<FallbackState> {
        let Some(model_id) = remaining.pop_front() else {
            return Ok(FallbackState::Exhausted(failures));
        };

        let config = GenerationConfig {
            timeout: deadline.saturating_duration_since(Instant::now()),
            ..GenerationConfig::for_verbosity(model_id.clone(), prompt.verbosity)
        };

        let outcome = match timeout_at(deadline, self.provider.generate(prompt, &config)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(model = %model_id, "Generation deadline exceeded");
                failures.push(ModelFailure::new(model_id, "deadline exceeded"));
                return Err(Error::GenerationTimeout {
                    elapsed: started.elapsed(),
                    failures,
                });
            }
        };

        let reason = match outcome {
            Ok(result) if !result.text.trim().is_empty() => {
                return Ok(FallbackState::Success(Generation {
                    text: result.text.trim().to_string(),
                    model_id,
                    failures,
                }));
            }
            Ok(_) => "empty response".to_string(),
            Err(e) => e.to_string(),
        };

        warn!(
            provider = self.provider.provider_name(),
            model = %model_id,
            error = %reason,
            remaining = remaining.len(),
            "Model candidate failed, trying next"
        );
        failures.push(ModelFailure::new(model_id, reason));

        Ok(FallbackState::Pending { remaining, failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::{sample_prompt, ScriptedProvider};

    fn models(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn gateway(provider: Arc<ScriptedProvider>, ids: &[&str]) -> ModelGateway {
        ModelGateway::new(provider, models(ids), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_first_model_success() {
        let provider = Arc::new(ScriptedProvider::new());
        let generation = gateway(provider.clone(), &["a", "b"])
            .generate(&sample_prompt())
            .await
            .unwrap();

        assert_eq!(generation.model_id, "a");
        assert!(generation.failures.is_empty());
        assert_eq!(provider.calls(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_second_model() {
        let provider = Arc::new(ScriptedProvider::new().failing("a"));
        let generation = gateway(provider.clone(), &["a", "b"])
            .generate(&sample_prompt())
            .await
            .unwrap();

        assert_eq!(generation.model_id, "b");
        assert_eq!(generation.text, "answer from b");
        assert_eq!(generation.failures.len(), 1);
        assert_eq!(generation.failures[0].model_id, "a");
        assert_eq!(provider.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_response_counts_as_failure() {
        let provider = Arc::new(ScriptedProvider::new().empty("a"));
        let generation = gateway(provider, &["a", "b"])
            .generate(&sample_prompt())
            .await
            .unwrap();

        assert_eq!(generation.model_id, "b");
        assert_eq!(generation.failures, vec![ModelFailure::new("a", "empty response")]);
    }

    #[tokio::test]
    async fn test_all_models_failing_aggregates_errors() {
        let provider = Arc::new(ScriptedProvider::new().failing("a").failing("b").failing("c"));
        let result = gateway(provider.clone(), &["a", "b", "c"])
            .generate(&sample_prompt())
            .await;

        match result {
            Err(Error::GenerationUnavailable { failures }) => {
                let ids: Vec<_> = failures.iter().map(|f| f.model_id.as_str()).collect();
                assert_eq!(ids, vec!["a", "b", "c"]);
                assert!(failures.iter().all(|f| f.reason.contains("quota exceeded")));
            }
            other => panic!("expected GenerationUnavailable, got {other:?}"),
        }
        // each candidate tried exactly once
        assert_eq!(provider.calls(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_model_list_is_unavailable() {
        let provider = Arc::new(ScriptedProvider::new());
        let result = gateway(provider.clone(), &[]).generate(&sample_prompt()).await;

        assert!(matches!(result, Err(Error::GenerationUnavailable { failures }) if failures.is_empty()));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_deadline_stops_traversal() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .failing("a")
                .slow("b", Duration::from_secs(30)),
        );
        let gateway = ModelGateway::new(provider.clone(), models(&["a", "b", "c"]), Duration::from_millis(100));

        match gateway.generate(&sample_prompt()).await {
            Err(Error::GenerationTimeout { failures, elapsed }) => {
                assert_eq!(
                    failures.iter().map(|f| f.model_id.as_str()).collect::<Vec<_>>(),
                    vec!["a", "b"]
                );
                assert_eq!(failures[1].reason, "deadline exceeded");
                assert!(elapsed < Duration::from_secs(30));
            }
            other => panic!("expected GenerationTimeout, got {other:?}"),
        }
        assert_eq!(provider.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_explicit_model_list_overrides_configured() {
        let provider = Arc::new(ScriptedProvider::new());
        let generation = gateway(provider, &["a"])
            .generate_with_models(&sample_prompt(), &models(&["z"]))
            .await
            .unwrap();
        assert_eq!(generation.model_id, "z");
    }
}
