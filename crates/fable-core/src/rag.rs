//! Retrieval-augmented generation request and response types

use serde::{Deserialize, Serialize};

use crate::SearchResult;

/// A request to answer a question from retrieved fables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub query: String,
    pub top_k: usize,
    pub provider: Option<String>,
    pub model: Option<String>,
}

impl GenerationRequest {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
            provider: None,
            model: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A grounded answer with the passages it was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub answer: String,
    pub sources: Vec<SearchResult>,
    pub provider: String,
}
