//! In-memory vector store

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::{info, warn};

use fable_core::{
    CollectionInfo, Error, Metric, Passage, PassageId, PassagePayload, Result, SearchResult,
    VectorStore,
};

use crate::vector_store::resolve_ids;

struct LocalCollection {
    dimension: usize,
    metric: Metric,
    points: BTreeMap<PassageId, (Vec<f32>, PassagePayload)>,
}

/// Brute-force vector store kept in process memory.
///
/// Scores every stored point on each search. Equal scores are ordered by id,
/// so results are stable for a fixed store and query.
#[derive(Default)]
pub struct LocalVectorStore {
    collections: RwLock<HashMap<String, LocalCollection>>,
}

impl LocalVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cosine similarity; zero when either vector has no magnitude
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }

    fn score(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
        match metric {
            Metric::Cosine => Self::cosine_similarity(a, b),
            Metric::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            // Larger is closer, so distance maps into (0, 1].
            Metric::Euclid => {
                let distance = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + distance)
            }
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, LocalCollection>>> {
        self.collections
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, LocalCollection>>> {
        self.collections
            .write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn create_collection(&self, name: &str, dimension: u64, metric: Metric) -> Result<bool> {
        let mut collections = self.write()?;
        if collections.contains_key(name) {
            warn!(collection = %name, "collection already exists");
            return Ok(false);
        }

        collections.insert(
            name.to_string(),
            LocalCollection {
                dimension: dimension as usize,
                metric,
                points: BTreeMap::new(),
            },
        );
        info!(collection = %name, dimension, "created in-memory collection");
        Ok(true)
    }

    async fn delete_collection(&self, name: &str) -> bool {
        match self.write() {
            Ok(mut collections) => collections.remove(name).is_some(),
            Err(e) => {
                warn!(collection = %name, error = %e, "failed to delete collection");
                false
            }
        }
    }

    async fn upsert(
        &self,
        collection: &str,
        vectors: Vec<Vec<f32>>,
        payloads: Vec<PassagePayload>,
        ids: Option<Vec<PassageId>>,
    ) -> Result<usize> {
        let ids = resolve_ids(vectors.len(), payloads.len(), ids)?;
        let mut collections = self.write()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| Error::VectorStore(format!("Collection '{}' not found", collection)))?;

        if let Some(bad) = vectors.iter().find(|v| v.len() != target.dimension) {
            return Err(Error::InvalidArgument(format!(
                "expected vectors of dimension {}, got {}",
                target.dimension,
                bad.len()
            )));
        }

        let count = ids.len();
        for ((id, vector), payload) in ids.into_iter().zip(vectors).zip(payloads) {
            target.points.insert(id, (vector, payload));
        }
        Ok(count)
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Vec<SearchResult> {
        let collections = match self.read() {
            Ok(collections) => collections,
            Err(e) => {
                warn!(collection = %collection, error = %e, "search failed");
                return Vec::new();
            }
        };
        let Some(target) = collections.get(collection) else {
            warn!(collection = %collection, "search on missing collection");
            return Vec::new();
        };
        if vector.len() != target.dimension {
            warn!(
                collection = %collection,
                expected = target.dimension,
                got = vector.len(),
                "query vector has wrong dimension"
            );
            return Vec::new();
        }

        let mut scored: Vec<(f32, &PassageId, &PassagePayload)> = target
            .points
            .iter()
            .map(|(id, (stored, payload))| (Self::score(target.metric, vector, stored), id, payload))
            .filter(|(score, _, _)| score_threshold.is_none_or(|t| *score >= t))
            .collect();

        // BTreeMap iteration is id-ordered and the sort is stable, so ties keep id order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored
            .into_iter()
            .take(limit)
            .map(|(score, id, payload)| SearchResult {
                passage: Passage::from_payload(id.clone(), payload.clone()),
                score,
            })
            .collect()
    }

    async fn get(&self, collection: &str, id: &PassageId) -> Result<Option<Passage>> {
        let collections = self.read()?;
        let target = collections
            .get(collection)
            .ok_or_else(|| Error::VectorStore(format!("Collection '{}' not found", collection)))?;

        Ok(target
            .points
            .get(id)
            .map(|(_, payload)| Passage::from_payload(id.clone(), payload.clone())))
    }

    async fn get_info(&self, collection: &str) -> Option<CollectionInfo> {
        let collections = self.read().ok()?;
        collections.get(collection).map(|target| CollectionInfo {
            name: collection.to_string(),
            points_count: target.points.len() as u64,
            status: "green".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(title: &str) -> PassagePayload {
        PassagePayload {
            title: title.to_string(),
            content: format!("{} content", title),
            moral: String::new(),
            language: "en".to_string(),
            number: String::new(),
            word_count: 2,
        }
    }

    async fn store_with(points: &[(u64, [f32; 2])]) -> LocalVectorStore {
        let store = LocalVectorStore::new();
        store.create_collection("fables", 2, Metric::Cosine).await.unwrap();
        store
            .upsert(
                "fables",
                points.iter().map(|(_, v)| v.to_vec()).collect(),
                points.iter().map(|(n, _)| payload(&format!("f{}", n))).collect(),
                Some(points.iter().map(|(n, _)| PassageId::Num(*n)).collect()),
            )
            .await
            .unwrap();
        store
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((LocalVectorStore::cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(LocalVectorStore::cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(LocalVectorStore::cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(LocalVectorStore::cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_create_is_idempotent_refusal() {
        let store = LocalVectorStore::new();
        assert!(store.create_collection("fables", 4, Metric::Cosine).await.unwrap());
        assert!(!store.create_collection("fables", 4, Metric::Cosine).await.unwrap());
        assert!(store.delete_collection("fables").await);
        assert!(!store.delete_collection("fables").await);
    }

    #[tokio::test]
    async fn test_search_orders_and_limits() {
        let store = store_with(&[(1, [0.0, 1.0]), (2, [1.0, 0.0]), (3, [1.0, 1.0])]).await;
        let results = store.search("fables", &[1.0, 0.1], 2, None).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].passage.id, PassageId::Num(2));
        assert_eq!(results[1].passage.id, PassageId::Num(3));
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_threshold_filters() {
        let store = store_with(&[(1, [0.0, 1.0]), (2, [1.0, 0.0])]).await;
        let results = store.search("fables", &[1.0, 0.0], 5, Some(0.5)).await;
        assert_eq!(results.len(), 1);
        assert!(results.iter().all(|r| r.score >= 0.5));
    }

    #[tokio::test]
    async fn test_ties_break_by_id() {
        let store = store_with(&[(5, [1.0, 0.0]), (2, [1.0, 0.0]), (9, [1.0, 0.0])]).await;
        let ids: Vec<_> = store
            .search("fables", &[1.0, 0.0], 3, None)
            .await
            .into_iter()
            .map(|r| r.passage.id)
            .collect();
        assert_eq!(ids, vec![PassageId::Num(2), PassageId::Num(5), PassageId::Num(9)]);
    }

    #[tokio::test]
    async fn test_faults_soft_fail() {
        let store = store_with(&[(1, [1.0, 0.0])]).await;
        assert!(store.search("missing", &[1.0, 0.0], 3, None).await.is_empty());
        assert!(store.search("fables", &[1.0, 0.0, 0.0], 3, None).await.is_empty());
        assert!(store.get_info("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_generated_ids_and_get() {
        let store = LocalVectorStore::new();
        store.create_collection("fables", 2, Metric::Cosine).await.unwrap();
        let written = store
            .upsert("fables", vec![vec![1.0, 0.0]], vec![payload("gen")], None)
            .await
            .unwrap();
        assert_eq!(written, 1);

        let hit = &store.search("fables", &[1.0, 0.0], 1, None).await[0];
        assert!(matches!(hit.passage.id, PassageId::Uuid(_)));

        let fetched = store.get("fables", &hit.passage.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "gen");
        assert!(store.get("fables", &PassageId::Num(42)).await.unwrap().is_none());

        let info = store.get_info("fables").await.unwrap();
        assert_eq!(info.points_count, 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let store = LocalVectorStore::new();
        store.create_collection("fables", 2, Metric::Cosine).await.unwrap();
        let err = store
            .upsert("fables", vec![vec![1.0]], vec![payload("x")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
