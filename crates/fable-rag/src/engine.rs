//! RAG engine: retrieval, prompt assembly and generation

use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use fable_core::{
    CollectionInfo, Embedder, Error, GenerationRequest, GenerationResponse, Passage, PassageId,
    ProviderKind, Result, SearchResult, VectorStore,
};

use crate::registry::ProviderRegistry;

/// Largest `limit` accepted by plain search
pub const MAX_SEARCH_LIMIT: usize = 20;

/// Largest number of passages used as generation context
pub const MAX_GENERATION_LIMIT: usize = 10;

/// Query-time settings of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct RagSettings {
    pub collection: String,
    /// Providers a request may name, in configured order
    pub providers: Vec<ProviderKind>,
    pub default_provider: ProviderKind,
    /// Allow-listed Ollama models; the first is the default
    pub ollama_models: Vec<String>,
}

impl RagSettings {
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn default_model(&self) -> Option<&str> {
        self.ollama_models.first().map(String::as_str)
    }

    /// `"ollama, codex (default: ollama)"`
    pub fn provider_summary(&self) -> String {
        format!(
            "{} (default: {})",
            self.provider_names().join(", "),
            self.default_provider
        )
    }
}

/// Answers questions from the fable collection
pub struct RagEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    registry: Arc<ProviderRegistry>,
    settings: RagSettings,
}

impl RagEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        registry: Arc<ProviderRegistry>,
        settings: RagSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            registry,
            settings,
        }
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Nearest passages to `query`, best first
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        check_limit(limit, MAX_SEARCH_LIMIT)?;
        let vector = self.embedder.encode(query).await?;
        let results = self
            .store
            .search(&self.settings.collection, &vector, limit, score_threshold)
            .await;
        debug!(query = %query, limit, hits = results.len(), "search");
        Ok(results)
    }

    /// Retrieve context for the request and have the selected backend answer it.
    ///
    /// Provider and model are checked against the allow-lists before any
    /// backend is looked up. Retrieval ignores score thresholds.
    pub async fn generate_answer(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        check_limit(request.top_k, MAX_GENERATION_LIMIT)?;
        let kind = self.resolve_provider(request.provider.as_deref())?;
        let model = self.resolve_model(kind, request.model.as_deref())?;

        let backend = self.registry.get_or_create(kind.name(), model).await?;

        let vector = self.embedder.encode(&request.query).await?;
        let sources = self
            .store
            .search(&self.settings.collection, &vector, request.top_k, None)
            .await;

        let context = build_context(&sources);
        let prompt = build_prompt(&request.query, &context);

        let provider = backend.describe();
        info!(provider = %provider, sources = sources.len(), "generating answer");
        let answer = backend
            .generate(&prompt)
            .await
            .map_err(|failure| Error::GenerationFailed(failure.to_string()))?;

        Ok(GenerationResponse {
            answer,
            sources,
            provider,
        })
    }

    /// Fetch one passage by id
    pub async fn get_passage(&self, id: &PassageId) -> Result<Passage> {
        let not_found = || Error::NotFound(format!("Fable with ID {} not found", id));

        if let PassageId::Uuid(raw) = id {
            if Uuid::parse_str(raw).is_err() {
                return Err(not_found());
            }
        }

        self.store
            .get(&self.settings.collection, id)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn collection_info(&self) -> Option<CollectionInfo> {
        self.store.get_info(&self.settings.collection).await
    }

    fn resolve_provider(&self, requested: Option<&str>) -> Result<ProviderKind> {
        let Some(name) = requested else {
            return Ok(self.settings.default_provider);
        };

        self.settings
            .providers
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| Error::ProviderUnavailable {
                provider: name.to_string(),
                available: self.settings.provider_names(),
            })
    }

    fn resolve_model<'a>(
        &'a self,
        kind: ProviderKind,
        requested: Option<&'a str>,
    ) -> Result<Option<&'a str>> {
        if !kind.has_model_axis() {
            return Ok(None);
        }

        match requested {
            Some(model) if self.settings.ollama_models.iter().any(|m| m == model) => Ok(Some(model)),
            Some(model) => Err(Error::ModelUnavailable {
                model: model.to_string(),
                available: self.settings.ollama_models.clone(),
            }),
            None => Ok(self.settings.default_model()),
        }
    }
}

fn check_limit(limit: usize, max: usize) -> Result<()> {
    if limit == 0 || limit > max {
        return Err(Error::InvalidArgument(format!(
            "limit must be between 1 and {}, got {}",
            max, limit
        )));
    }
    Ok(())
}

/// Render ranked passages as numbered blocks separated by blank lines
pub fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "Fable {}: {}\nContent: {}\nMoral: {}",
                i + 1,
                result.passage.title,
                result.passage.content,
                result.passage.moral
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Wrap context and question in the answering instructions
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "Based on the following fables, answer the user's question.\n\n\
         {context}\n\n\
         User's question: {query}\n\n\
         Please provide a helpful answer based on the fables above. \
         Reference specific fables when relevant."
    )
}
