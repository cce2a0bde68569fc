//! Vector store trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Result;

/// Identifier of a stored point: a fable number or a generated UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PassageId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PassageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassageId::Num(n) => write!(f, "{}", n),
            PassageId::Uuid(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for PassageId {
    type Err = std::convert::Infallible;

    /// Digits become a numeric id, anything else is kept as an opaque string.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<u64>() {
            Ok(n) => PassageId::Num(n),
            Err(_) => PassageId::Uuid(s.to_string()),
        })
    }
}

impl From<u64> for PassageId {
    fn from(n: u64) -> Self {
        PassageId::Num(n)
    }
}

/// Metadata stored alongside each vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassagePayload {
    pub title: String,
    pub content: String,
    pub moral: String,
    pub language: String,
    #[serde(default)]
    pub number: String,
    pub word_count: u64,
}

/// A stored narrative unit as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub title: String,
    pub content: String,
    pub moral: String,
    pub language: String,
    pub word_count: u64,
}

impl Passage {
    pub fn from_payload(id: PassageId, payload: PassagePayload) -> Self {
        Self {
            id,
            title: payload.title,
            content: payload.content,
            moral: payload.moral,
            language: payload.language,
            word_count: payload.word_count,
        }
    }
}

/// A passage together with its cosine similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub passage: Passage,
    pub score: f32,
}

/// Summary of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub points_count: u64,
    pub status: String,
}

/// Distance metric of a collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

/// Trait for vector stores (e.g., Qdrant, in-memory)
///
/// Query-time code only calls `search`, `get` and `get_info`; the collection
/// lifecycle and `upsert` belong to the offline ingestion path.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection. Returns `false` without touching anything when it already exists.
    async fn create_collection(&self, name: &str, dimension: u64, metric: Metric) -> Result<bool>;

    /// Delete a collection. Faults are logged and reported as `false`.
    async fn delete_collection(&self, name: &str) -> bool;

    /// Insert or replace points. When `ids` is `None` a UUID is generated per record.
    async fn upsert(
        &self,
        collection: &str,
        vectors: Vec<Vec<f32>>,
        payloads: Vec<PassagePayload>,
        ids: Option<Vec<PassageId>>,
    ) -> Result<usize>;

    /// Nearest neighbours ordered by descending score. Faults yield an empty list.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Vec<SearchResult>;

    /// Fetch a single passage by id
    async fn get(&self, collection: &str, id: &PassageId) -> Result<Option<Passage>>;

    /// Collection metadata, or `None` when it is missing or unreachable
    async fn get_info(&self, collection: &str) -> Option<CollectionInfo>;
}
