//! Text embedders

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::info;

use fable_core::{Embedder, Error, Result};

/// Model used when `EMBEDDING_MODEL` is not set
pub const DEFAULT_MODEL: &str = "paraphrase-multilingual-MiniLM-L12-v2";

/// Vector size of the hash embedder when none is given
pub const DEFAULT_HASH_DIMENSION: usize = 384;

/// Load the embedder named by configuration.
///
/// `hash` and `hash-<dim>` select [`HashEmbedder`]; every other name is a
/// sentence-embedding model served by fastembed.
pub async fn load_embedder(name: &str) -> Result<Arc<dyn Embedder>> {
    let name = name.trim();
    if let Some(dimension) = parse_hash_name(name)? {
        info!(dimension, "using hash embedder");
        return Ok(Arc::new(HashEmbedder::new(dimension)));
    }

    #[cfg(feature = "fastembed")]
    {
        let embedder = FastEmbedder::load(name).await?;
        info!(
            model = %embedder.model_name(),
            dimension = embedder.dimension(),
            "embedding model loaded"
        );
        Ok(Arc::new(embedder))
    }

    #[cfg(not(feature = "fastembed"))]
    {
        Err(Error::Configuration(format!(
            "Embedding model '{}' requires the `fastembed` feature; use EMBEDDING_MODEL=hash instead",
            name
        )))
    }
}

fn parse_hash_name(name: &str) -> Result<Option<usize>> {
    if name == "hash" {
        return Ok(Some(DEFAULT_HASH_DIMENSION));
    }
    let Some(raw) = name.strip_prefix("hash-") else {
        return Ok(None);
    };
    match raw.parse::<usize>() {
        Ok(dimension) if dimension > 0 => Ok(Some(dimension)),
        _ => Err(Error::Configuration(format!(
            "invalid hash embedder dimension in '{}'",
            name
        ))),
    }
}

/// Deterministic hashed bag-of-words embedder.
///
/// Each word adds a position-weighted count to a hashed slot (longer words a
/// second, lighter one), each bigram adds a fixed weight, and the result is
/// L2-normalized. Needs no model download, which makes it the embedder of
/// choice for tests and offline use.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    name: String,
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            name: format!("hash-{}", dimension),
            dimension,
        }
    }

    fn slot(&self, token: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        hasher.finish()
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let normalized: String = text
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect();
        let words: Vec<&str> = normalized.split_whitespace().collect();
        let dim = self.dimension;
        let mut vector = vec![0.0f32; dim];

        for (i, word) in words.iter().enumerate() {
            let hash = self.slot(word);
            let weight = 1.0 / (1.0 + i as f32 * 0.1);
            vector[(hash as usize) % dim] += weight;

            if word.len() > 3 {
                vector[((hash >> 16) as usize) % dim] += weight * 0.5;
            }
        }

        for pair in words.windows(2) {
            let hash = self.slot(&format!("{} {}", pair[0], pair[1]));
            vector[(hash as usize) % dim] += 0.3;
        }

        let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

#[cfg(feature = "fastembed")]
pub use local::FastEmbedder;

#[cfg(feature = "fastembed")]
mod local {
    use super::*;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Sentence-embedding model run locally through ONNX Runtime
    pub struct FastEmbedder {
        name: String,
        dimension: usize,
        model: Arc<Mutex<TextEmbedding>>,
    }

    impl FastEmbedder {
        /// Load (downloading on first use) the named model and measure its dimension
        pub async fn load(name: &str) -> Result<Self> {
            let kind = fastembed_model(name)?;
            let name = name.to_string();

            tokio::task::spawn_blocking(move || {
                let mut model = TextEmbedding::try_new(
                    InitOptions::new(kind).with_show_download_progress(false),
                )
                .map_err(|e| {
                    Error::Embedding(format!("failed to load embedding model '{}': {}", name, e))
                })?;

                let probe = model
                    .embed(vec!["dimension probe"], None)
                    .map_err(|e| Error::Embedding(e.to_string()))?;
                let dimension = probe
                    .first()
                    .map(Vec::len)
                    .ok_or_else(|| Error::Embedding("model returned no embedding".to_string()))?;

                Ok(Self {
                    name,
                    dimension,
                    model: Arc::new(Mutex::new(model)),
                })
            })
            .await
            .map_err(|e| Error::Embedding(format!("embedding task failed: {}", e)))?
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        fn model_name(&self) -> &str {
            &self.name
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            let mut vectors = self.encode_batch(&[text.to_string()]).await?;
            vectors
                .pop()
                .ok_or_else(|| Error::Embedding("model returned no embedding".to_string()))
        }

        async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();
            tokio::task::spawn_blocking(move || {
                let mut model = model
                    .lock()
                    .map_err(|_| Error::Embedding("embedding model lock poisoned".to_string()))?;
                model
                    .embed(texts, None)
                    .map_err(|e| Error::Embedding(e.to_string()))
            })
            .await
            .map_err(|e| Error::Embedding(format!("embedding task failed: {}", e)))?
        }
    }

    pub(super) fn fastembed_model(name: &str) -> Result<EmbeddingModel> {
        let lowered = name.trim().to_lowercase();
        let normalized = lowered
            .strip_prefix("sentence-transformers/")
            .unwrap_or(&lowered);

        match normalized {
            "paraphrase-multilingual-minilm-l12-v2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
            "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "multilingual-e5-small" => Ok(EmbeddingModel::MultilingualE5Small),
            _ => Err(Error::Configuration(format!(
                "Unknown embedding model: '{}'. Supported models: \
                 paraphrase-multilingual-MiniLM-L12-v2, all-MiniLM-L6-v2, \
                 bge-small-en-v1.5, multilingual-e5-small, hash, hash-<dim>",
                name
            ))),
        }
    }
}
