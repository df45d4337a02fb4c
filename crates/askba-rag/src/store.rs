//! Document store: the indexed corpus and its vector space

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use askba_core::{EmbeddingProvider, Error, Result};

use crate::config::{ChunkingConfig, EngineConfig, VectorizerKind};
use crate::corpus::{load_corpus, LoadedCorpus};
use crate::vectorizer::TfIdfVectorizer;

/// Bumped whenever the snapshot layout changes
const SNAPSHOT_VERSION: u32 = 1;

/// An indexed document (or passage, when chunking is enabled)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source_name: String,
    pub raw_text: String,
    pub vector: Vec<f32>,
}

/// A corpus file left out of the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDocument {
    pub source_name: String,
    pub reason: String,
}

impl SkippedDocument {
    pub fn new(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

/// The fitted vectorization shared by documents and queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Vectorizer {
    TfIdf(TfIdfVectorizer),
    Remote { model_id: String, dimension: usize },
}

impl Vectorizer {
    pub fn kind(&self) -> VectorizerKind {
        match self {
            Vectorizer::TfIdf(_) => VectorizerKind::TfIdf,
            Vectorizer::Remote { .. } => VectorizerKind::Gemini,
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Vectorizer::TfIdf(tfidf) => tfidf.dimension(),
            Vectorizer::Remote { dimension, .. } => *dimension,
        }
    }
}

/// Where and how to read the corpus
#[derive(Debug, Clone)]
pub struct CorpusSource {
    pub path: PathBuf,
    pub chunking: Option<ChunkingConfig>,
}

impl CorpusSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chunking: None,
        }
    }
}

impl From<&EngineConfig> for CorpusSource {
    fn from(config: &EngineConfig) -> Self {
        Self {
            path: config.corpus_path.clone(),
            chunking: config.chunking,
        }
    }
}

/// Read-only index over the corpus.
///
/// Every document vector has the store's dimensionality and was produced by
/// the store's [`Vectorizer`]; [`DocumentStore::embed_query`] applies the
/// same vectorizer to queries.
#[derive(Serialize, Deserialize)]
pub struct DocumentStore {
    version: u32,
    fingerprint: String,
    documents: Vec<Document>,
    skipped: Vec<SkippedDocument>,
    vectorizer: Vectorizer,
    #[serde(skip)]
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

/// Build a store with the local TF-IDF vectorizer
pub fn build_store(source: &CorpusSource) -> Result<DocumentStore> {
    let corpus = load_corpus(&source.path, source.chunking.as_ref())?;
    DocumentStore::from_tfidf(corpus)
}

/// Build a store whose vectors come from a remote embedding provider
pub async fn build_store_with_embedder(
    source: &CorpusSource,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<DocumentStore> {
    let corpus = load_corpus_blocking(source).await?;
    DocumentStore::from_embeddings(corpus, embedder).await
}

/// Run file system or CPU-heavy work off the async worker threads
async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

async fn load_corpus_blocking(source: &CorpusSource) -> Result<LoadedCorpus> {
    let source = source.clone();
    run_blocking(move || load_corpus(&source.path, source.chunking.as_ref())).await
}

impl DocumentStore {
    fn ensure_not_empty(corpus: &LoadedCorpus) -> Result<()> {
        if corpus.passages.is_empty() {
            return Err(Error::CorpusEmpty(corpus.root.clone()));
        }
        Ok(())
    }

    fn from_tfidf(corpus: LoadedCorpus) -> Result<Self> {
        Self::ensure_not_empty(&corpus)?;

        let texts: Vec<&str> = corpus.passages.iter().map(|p| p.text.as_str()).collect();
        let tfidf = TfIdfVectorizer::fit(&texts);

        let documents = corpus
            .passages
            .into_iter()
            .map(|passage| Document {
                vector: tfidf.transform(&passage.text),
                id: passage.id,
                source_name: passage.source_name,
                raw_text: passage.text,
            })
            .collect();

        let store = Self {
            version: SNAPSHOT_VERSION,
            fingerprint: corpus.fingerprint,
            documents,
            skipped: corpus.skipped,
            vectorizer: Vectorizer::TfIdf(tfidf),
            embedder: None,
        };
        store.log_built();
        Ok(store)
    }

    async fn from_embeddings(
        corpus: LoadedCorpus,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        Self::ensure_not_empty(&corpus)?;

        let texts: Vec<String> = corpus.passages.iter().map(|p| p.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(Error::Serialization(format!(
                "Embedding provider returned {} vectors for {} documents",
                vectors.len(),
                texts.len()
            )));
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        if dimension == 0 || vectors.iter().any(|v| v.len() != dimension) {
            return Err(Error::Serialization(
                "Embedding provider returned vectors of inconsistent dimension".to_string(),
            ));
        }

        let documents = corpus
            .passages
            .into_iter()
            .zip(vectors)
            .map(|(passage, vector)| Document {
                id: passage.id,
                source_name: passage.source_name,
                raw_text: passage.text,
                vector,
            })
            .collect();

        let store = Self {
            version: SNAPSHOT_VERSION,
            fingerprint: corpus.fingerprint,
            documents,
            skipped: corpus.skipped,
            vectorizer: Vectorizer::Remote {
                model_id: embedder.model_id().to_string(),
                dimension,
            },
            embedder: Some(embedder),
        };
        store.log_built();
        Ok(store)
    }

    fn log_built(&self) {
        info!(
            documents = self.documents.len(),
            skipped = self.skipped.len(),
            vectorizer = ?self.vectorizer.kind(),
            dimension = self.vectorizer.dimension(),
            "Document store built"
        );
    }

    /// Load the store from a snapshot when it matches the corpus, otherwise
    /// build it and write a fresh snapshot.
    pub async fn load_or_build(
        source: &CorpusSource,
        snapshot: Option<&Path>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        kind: VectorizerKind,
    ) -> Result<Self> {
        let corpus = load_corpus_blocking(source).await?;

        if let Some(path) = snapshot.filter(|p| p.exists()) {
            let snapshot_path = path.to_path_buf();
            let snapshot_embedder = embedder.clone();
            match run_blocking(move || Self::load(&snapshot_path, snapshot_embedder)).await {
                Ok(store) if store.fingerprint == corpus.fingerprint && store.vectorizer.kind() == kind => {
                    info!(path = %path.display(), documents = store.len(), "Loaded store snapshot");
                    return Ok(store);
                }
                Ok(_) => info!(path = %path.display(), "Store snapshot is stale, rebuilding"),
                Err(e) => warn!(path = %path.display(), error = %e, "Ignoring unusable store snapshot"),
            }
        }

        let store = match (kind, embedder) {
            (VectorizerKind::TfIdf, _) => run_blocking(move || Self::from_tfidf(corpus)).await?,
            (VectorizerKind::Gemini, Some(embedder)) => Self::from_embeddings(corpus, embedder).await?,
            (VectorizerKind::Gemini, None) => {
                return Err(Error::Configuration(
                    "Remote embeddings requested but no embedding provider configured".to_string(),
                ))
            }
        };

        match snapshot {
            Some(path) => {
                let snapshot_path = path.to_path_buf();
                let (store, saved) = run_blocking(move || {
                    let saved = store.save(&snapshot_path);
                    Ok((store, saved))
                })
                .await?;
                if let Err(e) = saved {
                    warn!(path = %path.display(), error = %e, "Failed to write store snapshot");
                }
                Ok(store)
            }
            None => Ok(store),
        }
    }

    /// Write the store as a JSON snapshot
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Read a JSON snapshot.
    ///
    /// Snapshots built with remote embeddings need an embedder for the same
    /// model, since queries must be embedded in the same space.
    pub fn load(path: &Path, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut store: DocumentStore = serde_json::from_reader(reader)?;

        if store.version != SNAPSHOT_VERSION {
            return Err(Error::Serialization(format!(
                "Unsupported snapshot version {} (expected {})",
                store.version, SNAPSHOT_VERSION
            )));
        }
        if store.documents.is_empty() {
            return Err(Error::CorpusEmpty(path.to_path_buf()));
        }
        let dimension = store.vectorizer.dimension();
        if store.documents.iter().any(|d| d.vector.len() != dimension) {
            return Err(Error::Serialization(
                "Snapshot vectors do not match the vectorizer dimension".to_string(),
            ));
        }

        if let Vectorizer::Remote { model_id, .. } = &store.vectorizer {
            match &embedder {
                Some(e) if e.model_id() == model_id.as_str() => {}
                Some(e) => {
                    return Err(Error::Configuration(format!(
                        "Snapshot was embedded with {} but the provider uses {}",
                        model_id,
                        e.model_id()
                    )))
                }
                None => {
                    return Err(Error::Configuration(format!(
                        "Snapshot was embedded with {} but no embedding provider is configured",
                        model_id
                    )))
                }
            }
            store.embedder = embedder;
        }

        Ok(store)
    }

    /// Vectorize a query in the documents' vector space
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        match &self.vectorizer {
            Vectorizer::TfIdf(tfidf) => Ok(tfidf.transform(text)),
            Vectorizer::Remote { model_id, dimension } => {
                let embedder = self.embedder.as_ref().ok_or_else(|| {
                    Error::Configuration(format!("No embedding provider for {}", model_id))
                })?;

                let vector = embedder
                    .embed(&[text.to_string()])
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::Serialization("Empty embedding response".to_string()))?;

                if vector.len() != *dimension {
                    return Err(Error::Serialization(format!(
                        "Query embedding has {} dimensions, store has {}",
                        vector.len(),
                        dimension
                    )));
                }
                Ok(vector)
            }
        }
    }

    /// Documents in corpus order
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, index: usize) -> Option<&Document> {
        self.documents.get(index)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Files left out during the build
    pub fn skipped(&self) -> &[SkippedDocument] {
        &self.skipped
    }

    pub fn vectorizer(&self) -> &Vectorizer {
        &self.vectorizer
    }

    /// MD5 over the corpus content this store was built from
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Get statistics about the store
    pub fn stats(&self) -> serde_json::Value {
        json!({
            "documents": self.documents.len(),
            "sources": self.source_count(),
            "skipped": self.skipped,
            "vectorizer": self.vectorizer.kind(),
            "dimension": self.vectorizer.dimension(),
            "fingerprint": self.fingerprint,
        })
    }

    fn source_count(&self) -> usize {
        let mut sources: Vec<&str> = self.documents.iter().map(|d| d.source_name.as_str()).collect();
        sources.dedup();
        sources.len()
    }
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("documents", &self.documents.len())
            .field("skipped", &self.skipped.len())
            .field("vectorizer", &self.vectorizer.kind())
            .field("dimension", &self.vectorizer.dimension())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}
