//! Core traits and types for the Fable RAG system
//!
//! This crate defines the fundamental traits and types used across the workspace.
//! It provides capability-facing interfaces for embedders, vector stores and
//! generation backends, making the system test-friendly and extensible.

pub mod embedder;
pub mod error;
pub mod llm;
pub mod provider;
pub mod rag;
pub mod vector_store;


pub use embedder::Embedder;
pub use error::{Error, Result, StatusClass};
pub use llm::{ChatMessage, Generation, GenerationBackend, GenerationFailure};
pub use provider::ProviderKind;
pub use rag::{GenerationRequest, GenerationResponse};
pub use vector_store::{
    CollectionInfo, Metric, Passage, PassageId, PassagePayload, SearchResult, VectorStore,
};
