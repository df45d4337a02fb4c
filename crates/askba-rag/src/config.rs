//! Engine configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use askba_core::{Error, Result};

/// How document and query vectors are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorizerKind {
    /// Local TF-IDF over the corpus vocabulary
    TfIdf,
    /// Remote Gemini embeddings
    Gemini,
}

impl FromStr for VectorizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tfidf" | "tf-idf" | "local" => Ok(VectorizerKind::TfIdf),
            "gemini" | "remote" => Ok(VectorizerKind::Gemini),
            other => Err(Error::Configuration(format!(
                "Unknown vectorizer {:?} (expected tfidf or gemini)",
                other
            ))),
        }
    }
}

/// Optional splitting of corpus files into overlapping passages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Passage length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive passages
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Configuration of the answering engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub corpus_path: PathBuf,
    /// Generation models in order of preference
    pub models: Vec<String>,
    pub vectorizer: VectorizerKind,
    pub top_k: usize,
    pub max_context_chars: usize,
    /// Deadline for one answer leg, across all fallback candidates
    pub request_timeout: Duration,
    pub chunking: Option<ChunkingConfig>,
    pub snapshot_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("data"),
            models: vec!["gemini-1.5-pro".to_string(), "gemini-1.5-flash".to_string()],
            vectorizer: VectorizerKind::TfIdf,
            top_k: 4,
            max_context_chars: 8000,
            request_timeout: Duration::from_secs(90),
            chunking: None,
            snapshot_path: None,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let corpus_path = env::var("ASKBA_CORPUS_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.corpus_path);

        let models = env::var("ASKBA_MODELS")
            .map(|list| parse_model_list(&list))
            .unwrap_or(defaults.models);

        let vectorizer = match env::var("ASKBA_VECTORIZER") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.vectorizer,
        };

        let top_k = parse_var("ASKBA_TOP_K")?.unwrap_or(defaults.top_k);
        let max_context_chars =
            parse_var("ASKBA_MAX_CONTEXT_CHARS")?.unwrap_or(defaults.max_context_chars);
        let request_timeout = parse_var("ASKBA_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let chunking = match parse_var::<usize>("ASKBA_CHUNK_SIZE")? {
            Some(chunk_size) => Some(ChunkingConfig {
                chunk_size,
                chunk_overlap: parse_var("ASKBA_CHUNK_OVERLAP")?
                    .unwrap_or(ChunkingConfig::default().chunk_overlap),
            }),
            None => None,
        };

        let snapshot_path = env::var("ASKBA_STORE_SNAPSHOT")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let config = Self {
            corpus_path,
            models,
            vectorizer,
            top_k,
            max_context_chars,
            request_timeout,
            chunking,
            snapshot_path,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(Error::Configuration(
                "The model preference list is empty".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(Error::Configuration("top_k must be at least 1".to_string()));
        }
        if self.max_context_chars == 0 {
            return Err(Error::Configuration(
                "max_context_chars must be at least 1".to_string(),
            ));
        }
        if let Some(chunking) = &self.chunking {
            if chunking.chunk_size == 0 || chunking.chunk_overlap >= chunking.chunk_size {
                return Err(Error::Configuration(format!(
                    "Invalid chunking: overlap {} must be smaller than chunk size {}",
                    chunking.chunk_overlap, chunking.chunk_size
                )));
            }
        }
        Ok(())
    }
}

/// Split a comma-separated model list, dropping blanks
pub(crate) fn parse_model_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Configuration(format!("{} has an invalid value: {:?}", name, value))),
        Err(_) => Ok(None),
    }
}
