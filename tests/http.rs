//! End-to-end tests of the HTTP API over an in-memory fable collection

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use fable::{router, AppConfig, AppContext};
use fable_cli_llm::{CliBackend, CliSpec, PromptDelivery};
use fable_core::{Error, Generation, GenerationBackend, ProviderKind, Result};
use fable_rag::indexer::{self, RawFable};
use fable_rag::{
    BackendFactory, FableIndexer, HashEmbedder, LocalVectorStore, ProviderRegistry, RagEngine,
};

struct Canned {
    model: String,
}

#[async_trait]
impl GenerationBackend for Canned {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn describe(&self) -> String {
        format!("ollama ({})", self.model)
    }

    async fn generate(&self, _prompt: &str) -> Generation {
        Ok("Tell the truth, or nobody will believe you.".to_string())
    }
}

/// Ollama answers from a canned backend; Claude Code is a script that exits 1.
/// The first `fail_first` constructions fail as if the daemon were down.
#[derive(Default)]
struct MockFactory {
    calls: AtomicUsize,
    fail_first: usize,
}

impl MockFactory {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendFactory for MockFactory {
    async fn create(
        &self,
        kind: ProviderKind,
        model: Option<&str>,
    ) -> Result<Arc<dyn GenerationBackend>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(Error::Network("connection refused".to_string()));
        }
        match kind {
            ProviderKind::Ollama => Ok(Arc::new(Canned {
                model: model.unwrap_or_default().to_string(),
            })),
            _ => {
                let spec = CliSpec {
                    kind,
                    program: "sh".to_string(),
                    args: vec!["-c".to_string(), "echo Error >&2; exit 1".to_string()],
                    delivery: PromptDelivery::Stdin,
                    filter: None,
                    answer_pointers: vec!["/result".to_string()],
                };
                Ok(Arc::new(CliBackend::new(spec)?))
            }
        }
    }
}

fn raw_fables() -> Vec<RawFable> {
    let fable = |number: &str, title: &str, story: &str, moral: &str| RawFable {
        number: number.to_string(),
        title: title.to_string(),
        story: vec![story.to_string()],
        moral: moral.to_string(),
        characters: Vec::new(),
    };

    vec![
        fable(
            "1",
            "The Boy Who Cried Wolf",
            "A shepherd boy lied about a wolf so often that nobody believed him when it came.",
            "Liars are not believed even when they tell the truth.",
        ),
        fable(
            "2",
            "The Fox and the Grapes",
            "A fox who could not reach the grapes declared them sour.",
            "It is easy to despise what you cannot get.",
        ),
        fable(
            "3",
            "The Tortoise and the Hare",
            "The boastful hare slept while the tortoise plodded on to win the race.",
            "Slow and steady wins the race.",
        ),
        fable(
            "4",
            "The Lion and the Mouse",
            "A mouse the lion had spared gnawed through the net that trapped him.",
            "No act of kindness is ever wasted.",
        ),
        fable(
            "5",
            "The Ant and the Grasshopper",
            "The grasshopper sang all summer and starved in winter while the ant had stored food.",
            "Prepare today for the needs of tomorrow.",
        ),
    ]
}

fn config(vars: &[(&str, &str)]) -> AppConfig {
    let vars: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(move |key| {
        vars.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .unwrap()
}

fn default_config() -> AppConfig {
    config(&[
        ("LLM_PROVIDERS", "ollama,claude_code"),
        ("OLLAMA_MODELS", "llama3.1:8b,mistral:7b"),
    ])
}

async fn engine(config: &AppConfig, factory: Arc<MockFactory>) -> RagEngine {
    let embedder = Arc::new(HashEmbedder::default());
    let store = Arc::new(LocalVectorStore::new());

    let fables = indexer::process(&raw_fables());
    FableIndexer::new(embedder.clone(), store.clone(), "fables")
        .index(&fables)
        .await
        .unwrap();

    let registry = Arc::new(ProviderRegistry::new(factory));
    RagEngine::new(embedder, store, registry, config.rag_settings())
}

async fn spawn(ctx: AppContext) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(Arc::new(ctx))).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A running server over the five-fable fixture
async fn serve_fixture() -> (String, Arc<MockFactory>) {
    serve_with(MockFactory::default()).await
}

async fn serve_with(factory: MockFactory) -> (String, Arc<MockFactory>) {
    let config = default_config();
    let factory = Arc::new(factory);
    let engine = engine(&config, factory.clone()).await;
    let base = spawn(AppContext::with_engine(config, engine)).await;
    (base, factory)
}

async fn post(base: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let response = Client::new()
        .post(format!("{}{}", base, path))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

async fn get(base: &str, path: &str) -> (StatusCode, Value) {
    let response = reqwest::get(format!("{}{}", base, path)).await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

fn detail(body: &Value) -> &str {
    body["detail"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_root() {
    let (base, _) = serve_fixture().await;
    let (status, body) = get(&base, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"message": "Welcome to Fable RAG API", "health": "/health"})
    );
}

#[tokio::test]
async fn test_health() {
    let (base, _) = serve_fixture().await;
    let (status, body) = get(&base, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["message"], "System running normally");
    assert_eq!(body["collection_name"], "fables");
    assert_eq!(body["total_fables"], 5);
    assert_eq!(body["llm_provider"], "ollama, claude_code (default: ollama)");
}

#[tokio::test]
async fn test_health_before_initialization() {
    let base = spawn(AppContext::new(default_config())).await;
    let (status, body) = get(&base, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(detail(&body).starts_with("System not initialized yet"));
}

#[tokio::test]
async fn test_health_missing_collection() {
    let config = config(&[("QDRANT_COLLECTION_NAME", "elsewhere")]);
    let engine = engine(&config, Arc::new(MockFactory::default())).await;
    let base = spawn(AppContext::with_engine(config, engine)).await;

    let (status, body) = get(&base, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        detail(&body),
        "Collection 'elsewhere' does not exist, please run `fable ingest` first"
    );
}

#[tokio::test]
async fn test_models() {
    let (base, _) = serve_fixture().await;
    let (status, body) = get(&base, "/models").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "providers": ["ollama", "claude_code"],
            "default_provider": "ollama",
            "ollama_models": ["llama3.1:8b", "mistral:7b"],
        })
    );
}

#[tokio::test]
async fn test_models_without_ollama() {
    let config = config(&[
        ("LLM_PROVIDERS", "codex"),
        ("OLLAMA_MODELS", "llama3.1:8b"),
    ]);
    let base = spawn(AppContext::new(config)).await;
    let (status, body) = get(&base, "/models").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["default_provider"], "codex");
    assert_eq!(body["ollama_models"], json!([]));
}

#[tokio::test]
async fn test_search_ranked() {
    let (base, _) = serve_fixture().await;
    let (status, body) = post(
        &base,
        "/search",
        json!({"query": "a story about honesty and lying", "limit": 3}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "a story about honesty and lying");

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(body["total_results"], 3);

    let scores: Vec<f64> = results.iter().map(|r| r["score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));

    let first = results[0].as_object().unwrap();
    let keys: Vec<&str> = first.keys().map(String::as_str).collect();
    for key in ["id", "title", "content", "moral", "score", "language", "word_count"] {
        assert!(keys.contains(&key), "missing {}", key);
    }
}

#[tokio::test]
async fn test_search_threshold() {
    let (base, _) = serve_fixture().await;
    let (status, body) = post(
        &base,
        "/search",
        json!({"query": "the tortoise won the race", "limit": 5, "score_threshold": 0.2}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    for result in body["results"].as_array().unwrap() {
        assert!(result["score"].as_f64().unwrap() >= 0.2);
    }
}

#[tokio::test]
async fn test_search_validation() {
    let (base, factory) = serve_fixture().await;

    let (status, body) = post(&base, "/search", json!({"query": "wolf", "limit": 21})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(detail(&body), "limit must be between 1 and 20, got 21");

    let (status, _) = post(&base, "/search", json!({"limit": 3})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = post(&base, "/search", json!({"query": ""})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = post(&base, "/search", json!({"query": "wolf", "score_threshold": 2.0})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = Client::new()
        .post(format!("{}/search", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(factory.calls(), 0);
}

#[tokio::test]
async fn test_validation_precedes_initialization() {
    let base = spawn(AppContext::new(default_config())).await;

    let (status, _) = post(&base, "/search", json!({"query": "wolf", "limit": 21})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = post(&base, "/search", json!({"query": "wolf"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_generate_default_provider() {
    let (base, factory) = serve_fixture().await;

    let (status, body) = post(&base, "/generate", json!({"query": "Why should I not lie?"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "Why should I not lie?");
    assert_eq!(body["answer"], "Tell the truth, or nobody will believe you.");
    assert_eq!(body["llm_provider"], "ollama (llama3.1:8b)");
    assert_eq!(body["sources"].as_array().unwrap().len(), 3);

    let (status, _) = post(&base, "/generate", json!({"query": "And again?", "limit": 1})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(factory.calls(), 1);
}

#[tokio::test]
async fn test_generate_selected_model() {
    let (base, factory) = serve_fixture().await;

    let (status, body) = post(
        &base,
        "/generate",
        json!({"query": "What did the ant do?", "provider": "ollama", "ollama_model": "mistral:7b"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["llm_provider"], "ollama (mistral:7b)");
    assert_eq!(factory.calls(), 1);
}

#[tokio::test]
async fn test_generate_rejects_unlisted_provider() {
    let (base, factory) = serve_fixture().await;

    let (status, body) = post(
        &base,
        "/generate",
        json!({"query": "q", "provider": "gemini_cli"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(detail(&body).starts_with("Provider 'gemini_cli' not available"));

    let (status, _) = post(&base, "/generate", json!({"query": "q", "provider": "openai"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(factory.calls(), 0);
}

#[tokio::test]
async fn test_generate_rejects_unlisted_model() {
    let (base, factory) = serve_fixture().await;

    let (status, body) = post(
        &base,
        "/generate",
        json!({"query": "q", "provider": "ollama", "ollama_model": "phi3"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(detail(&body).starts_with("Model 'phi3' not available"));
    assert_eq!(factory.calls(), 0);
}

#[tokio::test]
async fn test_generate_cli_failure() {
    let (base, _) = serve_fixture().await;

    let (status, body) = post(
        &base,
        "/generate",
        json!({"query": "q", "provider": "claude_code"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(detail(&body).contains("failed"));
    assert!(detail(&body).contains("Error"));
}

#[tokio::test]
async fn test_generate_backend_initialization_failure() {
    let (base, factory) = serve_with(MockFactory {
        fail_first: 1,
        ..Default::default()
    })
    .await;

    let (status, body) = post(&base, "/generate", json!({"query": "Why not lie?"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        detail(&body),
        "Failed to initialize ollama: Network error: connection refused"
    );

    let (status, body) = post(&base, "/generate", json!({"query": "Why not lie?"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["llm_provider"], "ollama (llama3.1:8b)");
    assert_eq!(factory.calls(), 2);
}

#[tokio::test]
async fn test_generate_limit() {
    let (base, factory) = serve_fixture().await;
    let (status, _) = post(&base, "/generate", json!({"query": "q", "limit": 11})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(factory.calls(), 0);
}

#[tokio::test]
async fn test_get_fable() {
    let (base, _) = serve_fixture().await;

    let (status, body) = get(&base, "/fables/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    assert_eq!(body["title"], "The Boy Who Cried Wolf");
    assert_eq!(body["language"], "en");

    let (status, body) = get(&base, "/fables/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(detail(&body), "Fable with ID 99 not found");

    let (status, _) = get(&base, "/fables/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (base, _) = serve_fixture().await;

    let response = Client::new()
        .request(Method::OPTIONS, format!("{}/search", base))
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(headers.get("access-control-allow-credentials").unwrap(), "true");
}
