//! Embedder trait

use async_trait::async_trait;

use crate::Result;

/// Trait for text embedders
///
/// The dimension is fixed for the lifetime of an instance and encoding is
/// deterministic for a given model and input.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Name of the underlying model
    fn model_name(&self) -> &str;

    /// Size of every produced vector
    fn dimension(&self) -> usize;

    /// Encode a single text
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Encode many texts, preserving input order. Empty input yields empty output.
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
