//! Ollama integration for the Fable RAG system
//!
//! This crate provides the daemon-backed implementation of the GenerationBackend trait.

mod client;
mod config;


pub use client::{format_size, ModelDetails, ModelInfo, ModelSummary, OllamaClient};
pub use config::{OllamaConfig, DEFAULT_HOST, DEFAULT_TIMEOUT_SECS};

// Re-export core types for convenience
pub use fable_core::{ChatMessage, Error, Generation, GenerationBackend, GenerationFailure, Result};
