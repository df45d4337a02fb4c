//! Core traits and types for askba
//!
//! This crate defines the types shared by the answering engine: supported
//! languages, prompt and answer shapes, the error taxonomy, and the
//! capability-facing traits for generation and embedding providers. Keeping
//! the providers behind traits lets the engine run against fakes in tests.

pub mod embedding;
pub mod error;
pub mod llm;
pub mod types;

pub use embedding::EmbeddingProvider;
pub use error::{Error, ErrorClass, Result};
pub use llm::{GenerationConfig, GenerationResult, LLMProvider};
pub use types::*;
