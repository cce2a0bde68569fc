//! Lazily constructed, cached generation backends

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use fable_cli_llm::{spec_for, CliBackend, DEFAULT_TIMEOUT};
use fable_core::{Error, GenerationBackend, ProviderKind, Result};
use fable_ollama::{OllamaClient, OllamaConfig};

/// Builds a backend for a provider
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// `model` is only passed for providers with a model axis
    async fn create(
        &self,
        kind: ProviderKind,
        model: Option<&str>,
    ) -> Result<Arc<dyn GenerationBackend>>;
}

/// Factory for the real Ollama and CLI backends
#[derive(Debug, Clone)]
pub struct DefaultBackendFactory {
    ollama: OllamaConfig,
    cli_timeout: Duration,
}

impl DefaultBackendFactory {
    pub fn new(ollama: OllamaConfig) -> Self {
        Self {
            ollama,
            cli_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_cli_timeout(mut self, timeout: Duration) -> Self {
        self.cli_timeout = timeout;
        self
    }
}

#[async_trait]
impl BackendFactory for DefaultBackendFactory {
    async fn create(
        &self,
        kind: ProviderKind,
        model: Option<&str>,
    ) -> Result<Arc<dyn GenerationBackend>> {
        if kind == ProviderKind::Ollama {
            let client = OllamaClient::connect(self.ollama.clone(), model).await?;
            return Ok(Arc::new(client));
        }

        let spec = spec_for(kind)
            .ok_or_else(|| Error::InvalidArgument(format!("Unknown LLM provider: {}", kind)))?;
        let backend = CliBackend::new(spec)?.with_timeout(self.cli_timeout);
        Ok(Arc::new(backend))
    }
}

type Slot = Arc<OnceCell<Arc<dyn GenerationBackend>>>;

/// Process-lifetime cache of generation backends.
///
/// The cache key is the provider name, or `<provider>:<model>` for providers
/// with a model axis. The first request for a key constructs the backend while
/// later requests for the same key wait on it; other keys are unaffected.
/// A failed construction leaves the slot empty so the next request retries.
pub struct ProviderRegistry {
    factory: Arc<dyn BackendFactory>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl ProviderRegistry {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached backend for `provider` (and `model`), constructing it on first use
    pub async fn get_or_create(
        &self,
        provider: &str,
        model: Option<&str>,
    ) -> Result<Arc<dyn GenerationBackend>> {
        let kind: ProviderKind = provider.parse()?;
        let model = model.filter(|_| kind.has_model_axis());
        let key = kind.cache_key(model);

        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let backend = slot
            .get_or_try_init(|| async {
                info!(provider = %kind, key = %key, "initializing generation backend");
                self.factory.create(kind, model).await.map_err(|e| {
                    warn!(provider = %kind, key = %key, error = %e, "backend initialization failed");
                    Error::initialization(kind.name(), e)
                })
            })
            .await?;

        Ok(Arc::clone(backend))
    }

    /// Keys with a constructed backend, sorted
    pub fn cached_keys(&self) -> Vec<String> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        let mut keys: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}
