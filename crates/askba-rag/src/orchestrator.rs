//! Answer orchestrator: the public entry point of the engine

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use askba_core::{
    AnswerPair, EmbeddingProvider, Error, LLMProvider, Language, PromptSpec, Result, Verbosity,
};

use crate::config::{EngineConfig, VectorizerKind};
use crate::gateway::{Generation, ModelGateway};
use crate::prompt::PromptBuilder;
use crate::retriever::{retrieve, RetrievalResult};
use crate::store::{CorpusSource, DocumentStore};

/// Outcome of both answer legs; a failure in one leaves the other intact
#[derive(Debug)]
pub struct AnswerLegs {
    pub short: Result<Generation>,
    pub detailed: Result<Generation>,
    /// Retrieved context both prompts were built from
    pub context: Vec<RetrievalResult>,
}

impl AnswerLegs {
    /// Both answers, or the first failure (short leg first)
    pub fn into_pair(self) -> Result<AnswerPair> {
        let short = self.short?;
        let detailed = self.detailed?;
        Ok(AnswerPair {
            short: short.text,
            detailed: detailed.text,
        })
    }
}

/// Composes store, retriever, prompt builder and gateway to answer questions.
///
/// The store is built lazily on first use and shared by every later request.
pub struct AnswerOrchestrator {
    config: EngineConfig,
    gateway: ModelGateway,
    prompt_builder: PromptBuilder,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: OnceCell<Arc<DocumentStore>>,
}

impl AnswerOrchestrator {
    /// Create an orchestrator; the configuration is validated up front
    pub fn new(config: EngineConfig, provider: Arc<dyn LLMProvider>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            gateway: ModelGateway::new(provider, config.models.clone(), config.request_timeout),
            prompt_builder: PromptBuilder::new(config.max_context_chars),
            embedder: None,
            store: OnceCell::new(),
            config,
        })
    }

    /// Use remote embeddings for the store and queries
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Use an already built store instead of building one
    pub fn with_store(mut self, store: Arc<DocumentStore>) -> Self {
        self.store = OnceCell::new_with(Some(store));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The shared store, built on first access
    pub async fn store(&self) -> Result<Arc<DocumentStore>> {
        let store = self
            .store
            .get_or_try_init(|| async {
                if self.config.vectorizer == VectorizerKind::Gemini && self.embedder.is_none() {
                    return Err(Error::Configuration(
                        "ASKBA_VECTORIZER=gemini needs an embedding provider".to_string(),
                    ));
                }

                let store = DocumentStore::load_or_build(
                    &CorpusSource::from(&self.config),
                    self.config.snapshot_path.as_deref(),
                    self.embedder.clone(),
                    self.config.vectorizer,
                )
                .await?;
                Ok::<_, Error>(Arc::new(store))
            })
            .await?;

        Ok(store.clone())
    }

    /// Retrieve context and build the short and detailed prompts
    pub async fn prepare(
        &self,
        question: &str,
        language: Language,
    ) -> Result<(Vec<RetrievalResult>, PromptSpec, PromptSpec)> {
        let store = self.store().await?;
        let results = retrieve(&store, question, self.config.top_k).await?;

        let short = self.prompt_builder.build_prompt(
            question,
            &results,
            &store,
            language,
            Verbosity::Short,
        );
        let detailed = self.prompt_builder.build_prompt(
            question,
            &results,
            &store,
            language,
            Verbosity::Detailed,
        );

        Ok((results, short, detailed))
    }

    /// Answer a question, keeping each leg's result separate.
    ///
    /// Fails only for problems shared by both legs: an unsupported language,
    /// a blank question, or an unusable store.
    pub async fn answer_legs(&self, question: &str, language: &str) -> Result<AnswerLegs> {
        let language = Language::from_code(language)?;
        if question.trim().is_empty() {
            return Err(Error::InvalidInput("The question is empty".to_string()));
        }

        let (context, short_prompt, detailed_prompt) = self.prepare(question, language).await?;
        info!(
            language = %language,
            context_documents = context.len(),
            "Answering question"
        );

        let (short, detailed) = tokio::join!(
            self.gateway.generate(&short_prompt),
            self.gateway.generate(&detailed_prompt),
        );

        Ok(AnswerLegs {
            short,
            detailed,
            context,
        })
    }

    /// Answer a question with a short and a detailed answer
    pub async fn answer(&self, question: &str, language: &str) -> Result<AnswerPair> {
        self.answer_legs(question, language).await?.into_pair()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::ScriptedProvider;
    use std::fs;
    use tempfile::TempDir;

    fn engine(provider: Arc<ScriptedProvider>, corpus: &TempDir) -> AnswerOrchestrator {
        let config = EngineConfig {
            corpus_path: corpus.path().to_path_buf(),
            models: vec!["primary".to_string(), "backup".to_string()],
            ..Default::default()
        };
        AnswerOrchestrator::new(config, provider).unwrap()
    }

    fn corpus() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("doc1.txt"),
            "Bildungsgutschein is an education voucher issued by the employment agency.",
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_store_is_built_once() {
        let dir = corpus();
        let engine = engine(Arc::new(ScriptedProvider::new()), &dir);

        let first = engine.store().await.unwrap();
        let second = engine.store().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_unsupported_language_is_rejected() {
        let dir = corpus();
        let provider = Arc::new(ScriptedProvider::new());
        let engine = engine(provider.clone(), &dir);

        let result = engine.answer("Was ist ein Bildungsgutschein?", "fr").await;
        assert!(matches!(result, Err(Error::UnsupportedLanguage(code)) if code == "fr"));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let dir = corpus();
        let engine = engine(Arc::new(ScriptedProvider::new()), &dir);
        assert!(matches!(engine.answer("   ", "de").await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_one_failing_leg_does_not_cancel_the_other() {
        let dir = corpus();
        let provider = Arc::new(
            ScriptedProvider::new()
                .failing_for("primary", Verbosity::Detailed)
                .failing_for("backup", Verbosity::Detailed),
        );
        let engine = engine(provider, &dir);

        let legs = engine.answer_legs("What is a Bildungsgutschein?", "en").await.unwrap();
        assert_eq!(legs.short.as_ref().unwrap().model_id, "primary");
        assert!(matches!(legs.detailed, Err(Error::GenerationUnavailable { .. })));

        assert!(matches!(legs.into_pair(), Err(Error::GenerationUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_missing_corpus_surfaces_setup_error() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig {
            corpus_path: dir.path().join("missing"),
            ..Default::default()
        };
        let engine = AnswerOrchestrator::new(config, Arc::new(ScriptedProvider::new())).unwrap();

        let err = match engine.answer("Frage", "de").await {
            Err(e) => e,
            Ok(pair) => panic!("expected an error, got {pair:?}"),
        };
        assert!(matches!(err, Error::CorpusNotFound(_)));
        assert_eq!(err.class(), askba_core::ErrorClass::Setup);
    }

    #[tokio::test]
    async fn test_gemini_vectorizer_without_embedder_is_a_configuration_error() {
        let dir = corpus();
        let config = EngineConfig {
            corpus_path: dir.path().to_path_buf(),
            vectorizer: VectorizerKind::Gemini,
            ..Default::default()
        };
        let engine = AnswerOrchestrator::new(config, Arc::new(ScriptedProvider::new())).unwrap();
        assert!(matches!(engine.store().await, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            models: Vec::new(),
            ..Default::default()
        };
        assert!(AnswerOrchestrator::new(config, Arc::new(ScriptedProvider::new())).is_err());
    }
}
