//! Application context shared by every request handler

use std::sync::Arc;
use tracing::{info, warn};

use fable_core::{Error, Result, VectorStore};
use fable_rag::{
    load_embedder, DefaultBackendFactory, ProviderRegistry, QdrantVectorStore, RagEngine,
};

use crate::config::AppConfig;

/// Configuration plus the engine once startup has built it
pub struct AppContext {
    config: AppConfig,
    engine: Option<Arc<RagEngine>>,
}

impl AppContext {
    /// A context whose dependencies are not built yet
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            engine: None,
        }
    }

    pub fn with_engine(config: AppConfig, engine: RagEngine) -> Self {
        Self {
            config,
            engine: Some(Arc::new(engine)),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> Result<&Arc<RagEngine>> {
        self.engine
            .as_ref()
            .ok_or_else(|| Error::NotInitialized("dependencies are still loading".to_string()))
    }
}

/// Build the embedder, vector store and provider registry for `config`.
///
/// Generation backends are not constructed here; the registry builds each one
/// the first time a request names it.
pub async fn initialize(config: &AppConfig) -> Result<RagEngine> {
    info!(model = %config.embedding_model, "loading embedding model");
    let embedder = load_embedder(&config.embedding_model).await?;

    info!(url = %config.qdrant.url, "connecting to vector store");
    let store: Arc<dyn VectorStore> = Arc::new(QdrantVectorStore::connect(&config.qdrant)?);

    match store.get_info(&config.collection).await {
        Some(info) => info!(
            collection = %info.name,
            points = info.points_count,
            status = %info.status,
            "collection ready"
        ),
        None => warn!(
            collection = %config.collection,
            "collection does not exist, run `fable ingest` first"
        ),
    }

    let factory = DefaultBackendFactory::new(config.ollama.clone()).with_cli_timeout(config.cli_timeout);
    let registry = Arc::new(ProviderRegistry::new(Arc::new(factory)));

    let settings = config.rag_settings();
    info!(providers = %settings.provider_summary(), "generation providers");

    Ok(RagEngine::new(embedder, store, registry, settings))
}
