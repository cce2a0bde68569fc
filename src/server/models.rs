//! Request and response bodies of the HTTP API

use serde::{Deserialize, Serialize};

use fable_core::{PassageId, SearchResult};
use fable_rag::{MAX_GENERATION_LIMIT, MAX_SEARCH_LIMIT};

#[derive(Debug, Clone, Deserialize)]
pub struct SearchBody {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
    #[serde(default)]
    pub score_threshold: Option<f32>,
}

impl SearchBody {
    pub fn validate(&self) -> Result<(), String> {
        check_query(&self.query)?;
        check_limit(self.limit, MAX_SEARCH_LIMIT)?;
        if let Some(threshold) = self.score_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(format!(
                    "score_threshold must be between 0 and 1, got {}",
                    threshold
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateBody {
    pub query: String,
    #[serde(default = "default_generation_limit")]
    pub limit: usize,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub ollama_model: Option<String>,
}

impl GenerateBody {
    pub fn validate(&self) -> Result<(), String> {
        check_query(&self.query)?;
        check_limit(self.limit, MAX_GENERATION_LIMIT)
    }
}

fn default_search_limit() -> usize {
    5
}

fn default_generation_limit() -> usize {
    3
}

fn check_query(query: &str) -> Result<(), String> {
    if query.is_empty() {
        return Err("query must not be empty".to_string());
    }
    Ok(())
}

fn check_limit(limit: usize, max: usize) -> Result<(), String> {
    if limit == 0 || limit > max {
        return Err(format!("limit must be between 1 and {}, got {}", max, limit));
    }
    Ok(())
}

/// One retrieved fable with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FableResult {
    pub id: PassageId,
    pub title: String,
    pub content: String,
    pub moral: String,
    pub score: f32,
    pub language: String,
    pub word_count: u64,
}

impl From<SearchResult> for FableResult {
    fn from(result: SearchResult) -> Self {
        let passage = result.passage;
        Self {
            id: passage.id,
            title: passage.title,
            content: passage.content,
            moral: passage.moral,
            score: result.score,
            language: passage.language,
            word_count: passage.word_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<FableResult>,
    pub total_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub query: String,
    pub answer: String,
    pub sources: Vec<FableResult>,
    pub llm_provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub collection_name: String,
    pub total_fables: u64,
    pub llm_provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub providers: Vec<String>,
    pub default_provider: String,
    pub ollama_models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
    pub health: String,
}
