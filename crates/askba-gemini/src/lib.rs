//! Gemini integration for askba
//!
//! This crate provides the Gemini implementations of the LLMProvider and
//! EmbeddingProvider traits.

mod client;
mod config;
mod embedder;


pub use client::GeminiClient;
pub use config::GeminiConfig;
pub use embedder::GeminiEmbedder;

// Re-export core types for convenience
pub use askba_core::{
    EmbeddingProvider, Error, GenerationConfig, GenerationResult, LLMProvider, Result,
};
