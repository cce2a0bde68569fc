//! Qdrant vector store

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, GetPointsBuilder, PointId, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use fable_core::{
    CollectionInfo, Error, Metric, Passage, PassageId, PassagePayload, Result, SearchResult,
    VectorStore,
};

/// Default gRPC endpoint of a local Qdrant
pub const DEFAULT_URL: &str = "http://localhost:6334";

/// Connection settings for Qdrant
#[derive(Debug, Clone, PartialEq)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
}

impl QdrantConfig {
    /// Read `QDRANT_URL`, or `QDRANT_HOST` with `QDRANT_GRPC_PORT`, plus `QDRANT_API_KEY`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = match (lookup("QDRANT_URL"), lookup("QDRANT_HOST")) {
            (Some(url), _) => url,
            (None, Some(host)) => {
                let port = lookup("QDRANT_GRPC_PORT").unwrap_or_else(|| "6334".to_string());
                format!("http://{}:{}", host, port)
            }
            (None, None) => DEFAULT_URL.to_string(),
        };
        Url::parse(&url)
            .map_err(|e| Error::Configuration(format!("invalid Qdrant URL '{}': {}", url, e)))?;

        Ok(Self {
            url,
            api_key: lookup("QDRANT_API_KEY").filter(|key| !key.is_empty()),
        })
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            api_key: None,
        }
    }
}

/// Vector store backed by a Qdrant server
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Build the client. No request is made until the first operation.
    pub fn connect(config: &QdrantConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.url);
        if let Some(key) = &config.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| Error::VectorStore(format!("failed to create Qdrant client: {}", e)))?;

        info!(url = %config.url, "Qdrant client created");
        Ok(Self { client })
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn create_collection(&self, name: &str, dimension: u64, metric: Metric) -> Result<bool> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;
        if exists {
            warn!(collection = %name, "collection already exists");
            return Ok(false);
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimension, distance(metric))),
            )
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        info!(collection = %name, dimension, ?metric, "created collection");
        Ok(true)
    }

    async fn delete_collection(&self, name: &str) -> bool {
        match self.client.delete_collection(name).await {
            Ok(response) => {
                info!(collection = %name, "deleted collection");
                response.result
            }
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
        let count = ids.len();

        let points: Vec<PointStruct> = ids
            .iter()
            .zip(vectors)
            .zip(payloads)
            .map(|((id, vector), payload)| {
                PointStruct::new(point_id(id), vector, Payload::from(payload_fields(payload)))
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        info!(collection = %collection, count, "upserted points");
        Ok(count)
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Vec<SearchResult> {
        let mut request =
            SearchPointsBuilder::new(collection, vector.to_vec(), limit as u64).with_payload(true);
        if let Some(threshold) = score_threshold {
            request = request.score_threshold(threshold);
        }

        match self.client.search_points(request).await {
            Ok(response) => {
                let results: Vec<SearchResult> = response
                    .result
                    .into_iter()
                    .filter_map(|point| {
                        let id = passage_id(point.id)?;
                        Some(SearchResult {
                            passage: Passage::from_payload(id, from_payload(&point.payload)),
                            score: point.score,
                        })
                    })
                    .collect();
                debug!(collection = %collection, hits = results.len(), "search finished");
                results
            }
            Err(e) => {
                error!(collection = %collection, error = %e, "search failed");
                Vec::new()
            }
        }
    }

    async fn get(&self, collection: &str, id: &PassageId) -> Result<Option<Passage>> {
        let response = self
            .client
            .get_points(GetPointsBuilder::new(collection, vec![point_id(id)]).with_payload(true))
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        Ok(response.result.into_iter().next().map(|point| {
            let id = passage_id(point.id).unwrap_or_else(|| id.clone());
            Passage::from_payload(id, from_payload(&point.payload))
        }))
    }

    async fn get_info(&self, collection: &str) -> Option<CollectionInfo> {
        match self.client.collection_info(collection).await {
            Ok(response) => {
                let info = response.result?;
                Some(CollectionInfo {
                    name: collection.to_string(),
                    points_count: info.points_count.unwrap_or(0),
                    status: info.status().as_str_name().to_lowercase(),
                })
            }
            Err(e) => {
                warn!(collection = %collection, error = %e, "failed to get collection info");
                None
            }
        }
    }
}

/// Check record counts line up and fill in generated ids when none are given.
pub(crate) fn resolve_ids(
    vectors: usize,
    payloads: usize,
    ids: Option<Vec<PassageId>>,
) -> Result<Vec<PassageId>> {
    if vectors != payloads {
        return Err(Error::InvalidArgument(format!(
            "{} vectors but {} payloads",
            vectors, payloads
        )));
    }

    match ids {
        Some(ids) if ids.len() != vectors => Err(Error::InvalidArgument(format!(
            "{} vectors but {} ids",
            vectors,
            ids.len()
        ))),
        Some(ids) => Ok(ids),
        None => Ok((0..vectors)
            .map(|_| PassageId::Uuid(Uuid::new_v4().to_string()))
            .collect()),
    }
}

fn distance(metric: Metric) -> Distance {
    match metric {
        Metric::Cosine => Distance::Cosine,
        Metric::Dot => Distance::Dot,
        Metric::Euclid => Distance::Euclid,
    }
}

fn point_id(id: &PassageId) -> PointId {
    match id {
        PassageId::Num(n) => PointId::from(*n),
        PassageId::Uuid(s) => PointId::from(s.clone()),
    }
}

fn passage_id(id: Option<PointId>) -> Option<PassageId> {
    match id?.point_id_options? {
        PointIdOptions::Num(n) => Some(PassageId::Num(n)),
        PointIdOptions::Uuid(s) => Some(PassageId::Uuid(s)),
    }
}

fn payload_fields(payload: PassagePayload) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("title".to_string(), Value::from(payload.title));
    fields.insert("content".to_string(), Value::from(payload.content));
    fields.insert("moral".to_string(), Value::from(payload.moral));
    fields.insert("language".to_string(), Value::from(payload.language));
    fields.insert("number".to_string(), Value::from(payload.number));
    fields.insert(
        "word_count".to_string(),
        Value::from(payload.word_count as i64),
    );
    fields
}

fn from_payload(fields: &HashMap<String, Value>) -> PassagePayload {
    PassagePayload {
        title: string_field(fields, "title"),
        content: string_field(fields, "content"),
        moral: string_field(fields, "moral"),
        language: string_field(fields, "language"),
        number: string_field(fields, "number"),
        word_count: integer_field(fields, "word_count"),
    }
}

fn string_field(fields: &HashMap<String, Value>, key: &str) -> String {
    match fields.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => s.clone(),
        Some(Kind::IntegerValue(n)) => n.to_string(),
        Some(Kind::DoubleValue(d)) => d.to_string(),
        _ => String::new(),
    }
}

fn integer_field(fields: &HashMap<String, Value>, key: &str) -> u64 {
    match fields.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::IntegerValue(n)) => (*n).max(0) as u64,
        Some(Kind::DoubleValue(d)) if *d >= 0.0 => *d as u64,
        Some(Kind::StringValue(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_config_defaults_and_overrides() {
        assert_eq!(QdrantConfig::from_lookup(lookup(&[])).unwrap(), QdrantConfig::default());

        let config = QdrantConfig::from_lookup(lookup(&[
            ("QDRANT_HOST", "qdrant"),
            ("QDRANT_GRPC_PORT", "7334"),
            ("QDRANT_API_KEY", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.url, "http://qdrant:7334");
        assert_eq!(config.api_key.as_deref(), Some("secret"));

        let config = QdrantConfig::from_lookup(lookup(&[
            ("QDRANT_URL", "https://cloud.example:6334"),
            ("QDRANT_HOST", "ignored"),
        ]))
        .unwrap();
        assert_eq!(config.url, "https://cloud.example:6334");
    }

    #[test]
    fn test_config_rejects_bad_url() {
        let err = QdrantConfig::from_lookup(lookup(&[("QDRANT_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_payload_round_trip_through_qdrant_values() {
        let payload = PassagePayload {
            title: "The Lion and the Mouse".into(),
            content: "A lion spared a mouse.".into(),
            moral: "Kindness is never wasted.".into(),
            language: "en".into(),
            number: "7".into(),
            word_count: 5,
        };
        let fields = payload_fields(payload.clone());
        assert_eq!(from_payload(&fields), payload);
    }

    #[test]
    fn test_missing_payload_fields_default() {
        let mut fields = HashMap::new();
        fields.insert("title".to_string(), Value::from("Only a title".to_string()));
        fields.insert("word_count".to_string(), Value::from("12".to_string()));

        let payload = from_payload(&fields);
        assert_eq!(payload.title, "Only a title");
        assert_eq!(payload.content, "");
        assert_eq!(payload.word_count, 12);
    }

    #[test]
    fn test_point_ids() {
        assert_eq!(passage_id(Some(point_id(&PassageId::Num(3)))), Some(PassageId::Num(3)));
        let uuid = PassageId::Uuid("550e8400-e29b-41d4-a716-446655440000".into());
        assert_eq!(passage_id(Some(point_id(&uuid))), Some(uuid));
        assert_eq!(passage_id(None), None);
    }

    #[test]
    fn test_resolve_ids() {
        let generated = resolve_ids(2, 2, None).unwrap();
        assert_eq!(generated.len(), 2);
        assert_ne!(generated[0], generated[1]);

        assert!(resolve_ids(2, 1, None).is_err());
        assert!(resolve_ids(2, 2, Some(vec![PassageId::Num(1)])).is_err());
        assert_eq!(
            resolve_ids(1, 1, Some(vec![PassageId::Num(9)])).unwrap(),
            vec![PassageId::Num(9)]
        );
    }
}
