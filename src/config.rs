//! Application configuration from the environment

use std::path::PathBuf;
use std::time::Duration;

use fable_core::{Error, ProviderKind, Result};
use fable_ollama::OllamaConfig;
use fable_rag::{QdrantConfig, RagSettings, DEFAULT_MODEL};

pub const DEFAULT_COLLECTION: &str = "fables";
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";
pub const DEFAULT_RAW_DATA_PATH: &str = "data/aesop_fables_raw.json";
pub const DEFAULT_DATA_PATH: &str = "data/aesop_fables_processed.json";

/// Everything the service reads from its environment
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub qdrant: QdrantConfig,
    pub ollama: OllamaConfig,
    pub collection: String,
    pub embedding_model: String,
    pub providers: Vec<ProviderKind>,
    pub default_provider: ProviderKind,
    pub ollama_models: Vec<String>,
    pub cli_timeout: Duration,
    pub api_host: String,
    pub api_port: u16,
    pub cors_origins: Vec<String>,
    pub raw_data_path: PathBuf,
    pub data_path: PathBuf,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from a variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let providers = split_list(get("LLM_PROVIDERS").as_deref().unwrap_or("ollama"))
            .into_iter()
            .map(|name| {
                name.parse::<ProviderKind>()
                    .map_err(|e| Error::Configuration(format!("LLM_PROVIDERS: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;
        let first = *providers
            .first()
            .ok_or_else(|| Error::Configuration("LLM_PROVIDERS must name at least one provider".into()))?;

        let default_provider = match get("LLM_DEFAULT_PROVIDER") {
            Some(name) => {
                let kind = name
                    .parse::<ProviderKind>()
                    .map_err(|e| Error::Configuration(format!("LLM_DEFAULT_PROVIDER: {}", e)))?;
                if !providers.contains(&kind) {
                    return Err(Error::Configuration(format!(
                        "LLM_DEFAULT_PROVIDER '{}' is not listed in LLM_PROVIDERS",
                        kind
                    )));
                }
                kind
            }
            None => first,
        };

        let cli_timeout = match get("CLI_TIMEOUT_SECS") {
            Some(raw) => match parse_number(&raw, "CLI_TIMEOUT_SECS")? {
                0 => {
                    return Err(Error::Configuration(
                        "CLI_TIMEOUT_SECS must be greater than 0".to_string(),
                    ))
                }
                secs => Duration::from_secs(secs),
            },
            None => fable_cli_llm::DEFAULT_TIMEOUT,
        };

        let api_port = match get("API_PORT") {
            Some(raw) => parse_number(&raw, "API_PORT")?,
            None => 8000,
        };

        Ok(Self {
            qdrant: QdrantConfig::from_lookup(&lookup)?,
            ollama: OllamaConfig::from_lookup(&lookup)?,
            collection: get("QDRANT_COLLECTION_NAME").unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            embedding_model: get("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            providers,
            default_provider,
            ollama_models: get("OLLAMA_MODELS").map(|v| split_list(&v)).unwrap_or_default(),
            cli_timeout,
            api_host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port,
            cors_origins: split_list(get("CORS_ORIGINS").as_deref().unwrap_or(DEFAULT_CORS_ORIGINS)),
            raw_data_path: get("RAW_DATA_PATH")
                .unwrap_or_else(|| DEFAULT_RAW_DATA_PATH.to_string())
                .into(),
            data_path: get("DATA_PATH")
                .unwrap_or_else(|| DEFAULT_DATA_PATH.to_string())
                .into(),
        })
    }

    /// Settings handed to the RAG engine
    pub fn rag_settings(&self) -> RagSettings {
        RagSettings {
            collection: self.collection.clone(),
            providers: self.providers.clone(),
            default_provider: self.default_provider,
            ollama_models: self.ollama_models.clone(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Configuration(format!("{} must be a number, got '{}'", key, raw)))
}
