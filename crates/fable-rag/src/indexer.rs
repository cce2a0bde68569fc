//! Offline ingestion of the fable corpus

use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use fable_core::{Embedder, Error, Metric, PassageId, PassagePayload, Result, SearchResult, VectorStore};

/// One story as found in the raw corpus file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFable {
    #[serde(default, deserialize_with = "number_as_string")]
    pub number: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub story: Vec<String>,
    #[serde(default)]
    pub moral: String,
    #[serde(default)]
    pub characters: Vec<String>,
}

#[derive(Deserialize)]
struct RawCorpus {
    #[serde(default)]
    stories: Vec<RawFable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FableMetadata {
    pub number: String,
    pub characters: Vec<String>,
    pub word_count: u64,
}

/// A fable ready to be embedded and stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedFable {
    pub id: String,
    pub title: String,
    pub content: String,
    pub moral: String,
    pub language: String,
    pub metadata: FableMetadata,
}

impl ProcessedFable {
    pub fn from_raw(raw: &RawFable) -> Self {
        let content = raw.story.join(" ");
        let number = if raw.number.is_empty() {
            "00"
        } else {
            raw.number.as_str()
        };

        Self {
            id: format!("fable_{}", number),
            title: raw.title.clone(),
            content: content.clone(),
            moral: raw.moral.clone(),
            language: "en".to_string(),
            metadata: FableMetadata {
                number: raw.number.clone(),
                characters: raw.characters.clone(),
                word_count: content.split_whitespace().count() as u64,
            },
        }
    }

    /// Text that is embedded for this fable
    pub fn embedding_text(&self) -> String {
        format!("{}. {} Moral: {}", self.title, self.content, self.moral)
    }

    /// Numeric point id taken from `fable_<n>`
    pub fn point_id(&self) -> Result<PassageId> {
        self.id
            .strip_prefix("fable_")
            .and_then(|n| n.parse::<u64>().ok())
            .map(PassageId::Num)
            .ok_or_else(|| Error::InvalidArgument(format!("fable id '{}' has no number", self.id)))
    }

    pub fn payload(&self) -> PassagePayload {
        PassagePayload {
            title: self.title.clone(),
            content: self.content.clone(),
            moral: self.moral.clone(),
            language: self.language.clone(),
            number: self.metadata.number.clone(),
            word_count: self.metadata.word_count,
        }
    }
}

/// Corpus size summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusStats {
    pub total_fables: usize,
    pub total_words: u64,
    pub average_words_per_fable: f64,
}

/// Read `{"stories": [...]}` from disk
pub fn load_raw(path: &Path) -> Result<Vec<RawFable>> {
    let raw = fs::read_to_string(path)?;
    let corpus: RawCorpus = serde_json::from_str(&raw)?;
    info!(path = %path.display(), count = corpus.stories.len(), "loaded raw fables");
    Ok(corpus.stories)
}

pub fn process(raw: &[RawFable]) -> Vec<ProcessedFable> {
    raw.iter().map(ProcessedFable::from_raw).collect()
}

/// Write processed fables as pretty JSON, creating parent directories
pub fn save_processed(path: &Path, fables: &[ProcessedFable]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(fables)?)?;
    info!(path = %path.display(), count = fables.len(), "saved processed fables");
    Ok(())
}

pub fn load_processed(path: &Path) -> Result<Vec<ProcessedFable>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn stats(fables: &[ProcessedFable]) -> CorpusStats {
    let total_words: u64 = fables.iter().map(|f| f.metadata.word_count).sum();
    let average = if fables.is_empty() {
        0.0
    } else {
        total_words as f64 / fables.len() as f64
    };

    CorpusStats {
        total_fables: fables.len(),
        total_words,
        average_words_per_fable: (average * 100.0).round() / 100.0,
    }
}

/// Loads processed fables into a fresh collection
pub struct FableIndexer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl FableIndexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
        }
    }

    /// Drop and recreate the collection, then embed and upsert every fable.
    ///
    /// Returns the number of points written.
    pub async fn index(&self, fables: &[ProcessedFable]) -> Result<usize> {
        let ids = fables
            .iter()
            .map(ProcessedFable::point_id)
            .collect::<Result<Vec<_>>>()?;

        self.store.delete_collection(&self.collection).await;
        self.store
            .create_collection(
                &self.collection,
                self.embedder.dimension() as u64,
                Metric::Cosine,
            )
            .await?;

        let texts: Vec<String> = fables.iter().map(ProcessedFable::embedding_text).collect();
        let vectors = self.embedder.encode_batch(&texts).await?;
        info!(
            count = vectors.len(),
            dimension = self.embedder.dimension(),
            "generated embeddings"
        );

        let payloads = fables.iter().map(ProcessedFable::payload).collect();
        self.store
            .upsert(&self.collection, vectors, payloads, Some(ids))
            .await
    }

    /// Run a search against the freshly indexed collection
    pub async fn verify(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let vector = self.embedder.encode(query).await?;
        Ok(self.store.search(&self.collection, &vector, limit, None).await)
    }
}

fn number_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Text(String),
        Int(u64),
    }

    Ok(match Number::deserialize(deserializer)? {
        Number::Text(s) => s,
        Number::Int(n) => n.to_string(),
    })
}
