//! Retrieval-augmented generation engine for fables
//!
//! This crate provides the embedders, vector stores, provider registry, RAG
//! engine and corpus indexer built on the `fable-core` traits.

pub mod embedder;
pub mod engine;
pub mod indexer;
pub mod local_vector_store;
pub mod registry;
pub mod vector_store;


#[cfg(feature = "fastembed")]
pub use embedder::FastEmbedder;
pub use embedder::{load_embedder, HashEmbedder, DEFAULT_MODEL};
pub use engine::{build_context, build_prompt, RagEngine, RagSettings, MAX_GENERATION_LIMIT, MAX_SEARCH_LIMIT};
pub use indexer::{CorpusStats, FableIndexer, FableMetadata, ProcessedFable, RawFable};
pub use local_vector_store::LocalVectorStore;
pub use registry::{BackendFactory, DefaultBackendFactory, ProviderRegistry};
pub use vector_store::{QdrantConfig, QdrantVectorStore};

// Re-export core types for convenience
pub use fable_core::{
    CollectionInfo, Embedder, Error, GenerationBackend, GenerationRequest, GenerationResponse,
    Metric, Passage, PassageId, ProviderKind, Result, SearchResult, VectorStore,
};
