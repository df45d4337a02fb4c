//! Retrieval-augmented answering engine for askba
//!
//! This crate provides the document store, the retriever, the prompt builder,
//! the model gateway with ordered fallback, and the answer orchestrator that
//! composes them.

mod config;
mod corpus;
mod gateway;
mod orchestrator;
mod prompt;
mod retriever;
mod store;
mod vectorizer;


pub use config::{ChunkingConfig, EngineConfig, VectorizerKind};
pub use corpus::{clean_text, decode_text, split_passages, TextEncoding};
pub use gateway::{Generation, ModelGateway};
pub use orchestrator::{AnswerLegs, AnswerOrchestrator};
pub use prompt::{system_instruction, PromptBuilder};
pub use retriever::{retrieve, RetrievalResult};
pub use store::{
    build_store, build_store_with_embedder, CorpusSource, Document, DocumentStore,
    SkippedDocument, Vectorizer,
};
pub use vectorizer::{cosine_similarity, tokenize, TfIdfVectorizer};

// Re-export core types for convenience
pub use askba_core::{
    AnswerPair, EmbeddingProvider, Error, ErrorClass, LLMProvider, Language, ModelFailure,
    PromptSpec, Result, Verbosity,
};
